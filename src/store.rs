//! On-disk layout of a job's data.
//!
//! Map task `m` writes one intermediate file per reduce bucket, `mr-{m}-{r}`.
//! Reduce task `r` reads `mr-0-{r}` through `mr-{M-1}-{r}` and writes
//! `mr-out-{r}`. Intermediate files hold one JSON-encoded [`KeyValue`] per
//! line. Output files hold one `"{key} {value}"` line per key.
//!
//! Every file is first written under a temporary name in the destination
//! directory and then renamed into place, so a reader never observes a
//! partially written file. A task that runs twice just replaces the file.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::KeyValue;

/// `mr-{map_id}-{bucket}`
pub fn intermediate_name(map_id: u32, bucket: u32) -> String {
    format!("mr-{map_id}-{bucket}")
}

/// `mr-out-{bucket}`
pub fn output_name(bucket: u32) -> String {
    format!("mr-out-{bucket}")
}

/// Writes `kvs` as the intermediate file for (`map_id`, `bucket`) in `dir`.
///
/// An empty slice still produces an (empty) file, since the reduce side
/// expects one file per map task.
pub fn write_intermediate(
    dir: &Path,
    map_id: u32,
    bucket: u32,
    kvs: &[KeyValue],
) -> Result<PathBuf> {
    let name = intermediate_name(map_id, bucket);
    write_atomically(dir, &name, |out| {
        for kv in kvs {
            serde_json::to_writer(&mut *out, kv)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    })
}

/// Reads back every record of an intermediate file.
///
/// A missing file is an error: it means the map phase did not actually
/// finish, which the scheduler should have made impossible.
pub fn read_intermediate(dir: &Path, map_id: u32, bucket: u32) -> Result<Vec<KeyValue>> {
    let path = dir.join(intermediate_name(map_id, bucket));
    let file = File::open(&path)
        .with_context(|| format!("failed to open intermediate file {}", path.display()))?;

    let mut kvs = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line).with_context(|| {
            format!("malformed record at {}:{}", path.display(), lineno + 1)
        })?;
        kvs.push(kv);
    }
    Ok(kvs)
}

/// Writes the final `(key, value)` lines of reduce `bucket` into `dir`.
pub fn write_output<I>(dir: &Path, bucket: u32, lines: I) -> Result<PathBuf>
where
    I: IntoIterator<Item = (String, String)>,
{
    write_atomically(dir, &output_name(bucket), |out| {
        for (key, value) in lines {
            writeln!(out, "{key} {value}")?;
        }
        Ok(())
    })
}

/// Runs `fill` against a temporary file in `dir`, then renames it to
/// `dir/name`, replacing any existing file.
fn write_atomically<F>(dir: &Path, name: &str, fill: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let target = dir.join(name);
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}-"))
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;

    {
        let mut out = BufWriter::new(&mut tmp);
        fill(&mut out).with_context(|| format!("failed to write {}", target.display()))?;
        out.flush()?;
    }

    tmp.persist(&target)
        .with_context(|| format!("failed to rename into {}", target.display()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn names_follow_the_job_layout() {
        assert_eq!(intermediate_name(0, 0), "mr-0-0");
        assert_eq!(intermediate_name(12, 3), "mr-12-3");
        assert_eq!(output_name(7), "mr-out-7");
    }

    #[test]
    fn intermediate_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let kvs = vec![
            KeyValue::new("x", "1"),
            KeyValue::new("with space", "1"),
            KeyValue::new("quote\"and\nnewline", "v"),
        ];

        let path = write_intermediate(dir.path(), 2, 1, &kvs).unwrap();
        assert_eq!(path, dir.path().join("mr-2-1"));
        assert_eq!(read_intermediate(dir.path(), 2, 1).unwrap(), kvs);
        // One record per line, even with an embedded newline in a key.
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[test]
    fn empty_bucket_still_creates_a_file() {
        let dir = tempfile::tempdir().unwrap();
        write_intermediate(dir.path(), 0, 4, &[]).unwrap();

        assert!(dir.path().join("mr-0-4").exists());
        assert!(read_intermediate(dir.path(), 0, 4).unwrap().is_empty());
    }

    #[test]
    fn missing_intermediate_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_intermediate(dir.path(), 3, 0).unwrap_err();
        assert!(format!("{err:#}").contains("mr-3-0"));
    }

    #[test]
    fn malformed_intermediate_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let text = "{\"key\":\"x\",\"value\":\"1\"}\nnot json\n";
        fs::write(dir.path().join("mr-0-0"), text).unwrap();

        let err = read_intermediate(dir.path(), 0, 0).unwrap_err();
        assert!(format!("{err:#}").contains("mr-0-0:2"));
    }

    #[test]
    fn rewrite_replaces_previous_attempt() {
        let dir = tempfile::tempdir().unwrap();
        write_intermediate(dir.path(), 0, 0, &[KeyValue::new("old", "1")]).unwrap();
        write_intermediate(dir.path(), 0, 0, &[KeyValue::new("new", "1")]).unwrap();

        assert_eq!(
            read_intermediate(dir.path(), 0, 0).unwrap(),
            vec![KeyValue::new("new", "1")]
        );
    }

    #[test]
    fn output_lines_are_key_space_value() {
        let dir = tempfile::tempdir().unwrap();
        let lines = vec![("x".to_string(), "2".to_string()), ("y".to_string(), "1".to_string())];

        let path = write_output(dir.path(), 0, lines).unwrap();
        assert_eq!(path, dir.path().join("mr-out-0"));
        assert_eq!(fs::read_to_string(path).unwrap(), "x 2\ny 1\n");
    }

    #[test]
    fn no_temporary_files_are_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        write_intermediate(dir.path(), 0, 0, &[KeyValue::new("a", "1")]).unwrap();
        write_output(dir.path(), 0, Vec::new()).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["mr-0-0", "mr-out-0"]);
    }
}
