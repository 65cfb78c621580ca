//! A fault-tolerant MapReduce (lite) system for a single machine.
//!
//! One coordinator owns the job's task table and hands out map and reduce
//! tasks to anonymous workers over a local Unix-domain socket. Workers exchange
//! intermediate data through a shared directory. A task whose worker goes
//! silent for longer than the stall timeout is handed to somebody else.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};

pub mod cmd;
pub mod coordinator;
pub mod rpc;
pub mod scheduler;
pub mod standalone;
pub mod store;
pub mod utils;
pub mod worker;
pub mod workload;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes the input file as a key-value pair
/// (`filename`, `contents`) and auxiliary arguments.
///
/// It returns an iterator that yields intermediate key-value pairs.
pub type MapFn = fn(kv: KeyValue, aux: &[String]) -> MapOutput;

/// A reduce function takes in a key, an iterator over every value emitted
/// for that key, and the auxiliary arguments. It returns the value that is
/// written next to the key in the output file.
pub type ReduceFn = fn(
    key: &str,
    values: Box<dyn Iterator<Item = String> + '_>,
    aux: &[String],
) -> anyhow::Result<String>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct KeyValue {
    /// The key.
    pub key: String,
    /// The value.
    pub value: String,
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value of this key-value pair.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> String {
        self.value
    }
}

/////////////////////////////////////////////////////////////////////////////
// Partitioning
/////////////////////////////////////////////////////////////////////////////

/// Hashes an intermediate key into a non-negative 31-bit value.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key);
    (hasher.finish() & 0x7fffffff) as u32
}

/// The reduce bucket owning `key`, i.e. `ihash(key) % n_reduce`.
///
/// `n_reduce` must be non-zero.
#[inline]
pub fn bucket(key: &str, n_reduce: u32) -> u32 {
    ihash(key.as_bytes()) % n_reduce
}
