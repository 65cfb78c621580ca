//! Vertex degree of an undirected graph given as an edge list.
//!
//! Each input line is `<u> <v>`. Blank lines and lines starting with `#` are
//! skipped. Self-loops count twice, as usual.

use crate::*;
use anyhow::{bail, Result};

pub fn map(kv: KeyValue, _aux: &[String]) -> MapOutput {
    let mut out = Vec::new();

    for (i, line) in kv.value().lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut ends = line.split_whitespace();
        match (ends.next(), ends.next(), ends.next()) {
            (Some(u), Some(v), None) => {
                out.push(KeyValue::new(u, "1"));
                out.push(KeyValue::new(v, "1"));
            }
            _ => bail!("{}:{}: expected `<u> <v>`, got {:?}", kv.key(), i + 1, line),
        }
    }

    Ok(Box::new(out.into_iter().map(Ok)))
}

pub fn reduce(
    _key: &str,
    values: Box<dyn Iterator<Item = String> + '_>,
    _aux: &[String],
) -> Result<String> {
    Ok(values.count().to_string())
}
