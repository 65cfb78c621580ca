//! Utility functions shared by the binaries and the tests.
//!

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use glob::glob;

/// The coordinator's default socket, `/var/tmp/minimr-<user>.sock`.
///
/// Derived from the invoking user so that several users on one machine
/// don't collide.
pub fn coordinator_sock() -> PathBuf {
    PathBuf::from(format!("/var/tmp/minimr-{}.sock", whoami::username()))
}

/// Expands each pattern with [`glob`], keeping argument order. Matches
/// within one pattern come out in the order `glob` yields them (sorted).
///
/// A pattern that matches nothing is an error, so a typo doesn't silently
/// produce an empty job.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let before = files.len();
        for entry in glob(pattern).with_context(|| format!("bad input pattern {pattern:?}"))? {
            let path = entry?;
            if path.is_file() {
                files.push(path.to_string_lossy().into_owned());
            }
        }
        if files.len() == before {
            bail!("no input file matches {pattern:?}");
        }
    }
    Ok(files)
}
