//! The worker loop and the two task executors.
//!
//! A worker has no identity the coordinator cares about. It asks for a task,
//! runs it to completion, reports it, and asks again, until it is told to exit.
//! Any local failure ends the process without reporting, and the coordinator
//! hands the task to someone else once it stalls.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use tracing::{debug, info};

use crate::rpc;
use crate::rpc::proto::{MetadataRequest, TaskKind, TaskRequest};
use crate::{bucket, store, KeyValue, ReduceFn, Workload};

#[derive(Clone)]
pub struct WorkerConfig {
    pub socket: PathBuf,
    /// Where intermediate and output files are written.
    pub dir: PathBuf,
    pub wait: Duration,
    pub workload: Workload,
    pub aux: Vec<String>,
    /// Shows up in coordinator logs. Purely informational.
    pub name: String,
}

/// Runs tasks until the coordinator says the job is done.
pub async fn run(config: WorkerConfig) -> Result<()> {
    let mut client = rpc::connect(&config.socket).await?;

    let meta = client
        .get_metadata(MetadataRequest {})
        .await
        .context("GetMetadata failed")?
        .into_inner();
    let (n_map, n_reduce) = (meta.map_count, meta.reduce_count);
    info!(
        "{} joined a job with {} map and {} reduce tasks",
        config.name, n_map, n_reduce
    );

    loop {
        let task = client
            .get_task(TaskRequest {
                worker: config.name.clone(),
            })
            .await
            .context("GetTask failed")?
            .into_inner();

        match task.kind() {
            TaskKind::Map => {
                info!("map task {}: {}", task.task_id, task.payload);
                let (workload, aux, dir) =
                    (config.workload, config.aux.clone(), config.dir.clone());
                let (map_id, input) = (task.task_id, task.payload.clone());
                tokio::task::spawn_blocking(move || {
                    do_map(&workload, &aux, &dir, map_id, Path::new(&input), n_reduce)
                })
                .await??;
            }
            TaskKind::Reduce => {
                info!("reduce task {}", task.task_id);
                let (workload, aux, dir) =
                    (config.workload, config.aux.clone(), config.dir.clone());
                let bucket: u32 = task
                    .payload
                    .parse()
                    .with_context(|| format!("bad reduce payload {:?}", task.payload))?;
                tokio::task::spawn_blocking(move || {
                    do_reduce(&workload, &aux, &dir, bucket, n_map)
                })
                .await??;
            }
            TaskKind::Wait => {
                debug!("nothing to do, waiting {:?}", config.wait);
                tokio::time::sleep(config.wait).await;
                continue;
            }
            TaskKind::Exit => {
                info!("job done, {} exiting", config.name);
                return Ok(());
            }
            TaskKind::Unspecified => bail!("coordinator sent a task without a kind"),
        }

        let (kind, id) = (task.kind(), task.task_id);
        client
            .complete_task(task)
            .await
            .with_context(|| format!("CompleteTask failed for {} {}", kind.as_str_name(), id))?;
        debug!("reported {} {}", kind.as_str_name(), id);
    }
}

/// Runs map task `map_id` over `input` and writes one intermediate file per
/// reduce bucket into `dir`, including empty ones.
pub fn do_map(
    workload: &Workload,
    aux: &[String],
    dir: &Path,
    map_id: u32,
    input: &Path,
    n_reduce: u32,
) -> Result<()> {
    let raw = fs::read(input)
        .with_context(|| format!("failed to read input {}", input.display()))?;
    let kv = KeyValue::new(input.to_string_lossy(), String::from_utf8_lossy(&raw));

    let mut buckets: Vec<Vec<KeyValue>> = vec![Vec::new(); n_reduce as usize];
    for item in (workload.map_fn)(kv, aux)? {
        let kv = item?;
        buckets[bucket(kv.key(), n_reduce) as usize].push(kv);
    }

    for (b, kvs) in buckets.iter().enumerate() {
        store::write_intermediate(dir, map_id, b as u32, kvs)?;
    }
    Ok(())
}

/// Runs reduce task `bucket` over the output of all `n_map` map tasks and
/// writes `mr-out-{bucket}` into `dir`.
pub fn do_reduce(
    workload: &Workload,
    aux: &[String],
    dir: &Path,
    bucket: u32,
    n_map: u32,
) -> Result<PathBuf> {
    let mut kvs = Vec::new();
    for map_id in 0..n_map {
        kvs.extend(store::read_intermediate(dir, map_id, bucket)?);
    }

    let lines = reduce_records(workload.reduce_fn, kvs, aux)?;
    store::write_output(dir, bucket, lines)
}

/// Sorts `kvs` by key and calls `reduce_fn` once per distinct key.
///
/// Returns `(key, reduced value)` pairs in ascending key order. The sort is
/// stable, so values reach `reduce_fn` in the order they were read.
pub fn reduce_records(
    reduce_fn: ReduceFn,
    mut kvs: Vec<KeyValue>,
    aux: &[String],
) -> Result<Vec<(String, String)>> {
    kvs.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out = Vec::new();
    for (key, group) in &kvs.into_iter().chunk_by(|kv| kv.key.clone()) {
        let value = reduce_fn(&key, Box::new(group.map(KeyValue::into_value)), aux)?;
        out.push((key, value));
    }
    Ok(out)
}
