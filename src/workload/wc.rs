//! A MapReduce-compatible implementation of word count.
//!

use crate::*;
use anyhow::Result;

/// Emits `(word, "1")` for every maximal run of alphabetic characters.
pub fn map(kv: KeyValue, _aux: &[String]) -> MapOutput {
    let words = kv
        .value()
        .split(|c: char| !c.is_alphabetic())
        .filter(|s| !s.is_empty())
        .map(|word| word.to_string())
        .collect::<Vec<_>>();

    let iter = words.into_iter().map(|word| Ok(KeyValue::new(word, "1")));
    Ok(Box::new(iter))
}

/// The number of occurrences of `key`.
pub fn reduce(
    _key: &str,
    values: Box<dyn Iterator<Item = String> + '_>,
    _aux: &[String],
) -> Result<String> {
    Ok(values.count().to_string())
}
