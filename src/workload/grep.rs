//! A MapReduce-compatible implementation of `grep`.
//!
//! Auxiliary arguments: `--term <TERM>`. Every line containing the term is
//! emitted under `<file>:<line number>`. Line numbers are zero-padded so the
//! reduce-side sort keeps them in file order.

use crate::*;
use anyhow::Result;
use clap::Parser;
use itertools::Itertools;

#[derive(Parser, Debug)]
#[clap(no_binary_name = true)]
struct Args {
    #[clap(short, long, value_parser)]
    term: String,
}

pub fn map(kv: KeyValue, aux: &[String]) -> MapOutput {
    let args = Args::try_parse_from(aux)?;
    let KeyValue {
        key: filename,
        value: contents,
    } = kv;

    let hits = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(&args.term))
        .map(|(i, line)| KeyValue::new(format!("{}:{:08}", filename, i + 1), line))
        .collect::<Vec<_>>();

    Ok(Box::new(hits.into_iter().map(Ok)))
}

/// Returns the matching line. A key only repeats if the same file was given
/// twice as input, in which case the copies are joined.
pub fn reduce(
    _key: &str,
    values: Box<dyn Iterator<Item = String> + '_>,
    _aux: &[String],
) -> Result<String> {
    Ok(values.dedup().join(" | "))
}
