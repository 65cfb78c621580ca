use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::worker::reduce_records;
use crate::*;

type Buckets = Vec<Vec<KeyValue>>;

/// Maps every input, partitioning records with [`bucket`] just like a map task.
pub fn perform_map(
    inputs: &[String],
    engine: &Workload,
    aux: &[String],
    n_reduce: u32,
) -> Result<Buckets> {
    let mut buckets: Buckets = vec![Vec::new(); n_reduce as usize];

    for input in inputs {
        let raw = fs::read(input).with_context(|| format!("failed to read input {input}"))?;
        let input_kv = KeyValue::new(input.as_str(), String::from_utf8_lossy(&raw));

        let mut emitted = 0usize;
        for item in (engine.map_fn)(input_kv, aux)? {
            let kv = item?;
            buckets[bucket(kv.key(), n_reduce) as usize].push(kv);
            emitted += 1;
        }
        debug!("mapped {} ({} records)", input, emitted);
    }

    Ok(buckets)
}

/// Reduces each bucket into `mr-out-<bucket>` under `output_dir`.
pub fn perform_reduce(
    engine: &Workload,
    aux: &[String],
    output_dir: &Path,
    buckets: Buckets,
) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::with_capacity(buckets.len());
    for (reduce_id, bkt) in buckets.into_iter().enumerate() {
        let lines = reduce_records(engine.reduce_fn, bkt, aux)?;
        outputs.push(store::write_output(output_dir, reduce_id as u32, lines)?);
    }
    Ok(outputs)
}

/// Runs the whole job and returns the output files, one per bucket.
pub fn run(
    inputs: &[String],
    engine: &Workload,
    aux: &[String],
    n_reduce: u32,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    if n_reduce == 0 {
        bail!("the number of reduce tasks must be at least 1");
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let buckets = perform_map(inputs, engine, aux, n_reduce)?;
    let outputs = perform_reduce(engine, aux, output_dir, buckets)?;
    info!(
        "sequential job done: {} input(s), {} output(s) in {}",
        inputs.len(),
        outputs.len(),
        output_dir.display()
    );
    Ok(outputs)
}
