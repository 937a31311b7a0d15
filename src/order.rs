//! Key-order alignment between a baseline and a working manifest.
//!
//! This is presentation data: the composer draws the two orderings side by
//! side and connects keys that survive. It is computed independently of
//! [`diff`](crate::diff) and never feeds into `has_changes`.
//!
//! ```text
//! before      after
//! 0 a ─────── 0 a   same
//! 1 b ──┐     1 c   moved (from 2)
//! 2 c ──┼──── 2 b   moved (from 1)
//! 3 d   │           removed
//!       └──── 3 e   added
//! ```

use crate::types::Manifest;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Same,
    Moved,
    Added,
    Removed,
}

/// One key on either side of the alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderEntry {
    pub key: String,
    pub index: usize,
    pub status: OrderStatus,
    /// Index of the same key on the other side, if it exists there.
    pub matched: Option<usize>,
}

/// A kept key linking its baseline position to its working position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connector {
    pub key: String,
    pub from: usize,
    pub to: usize,
    /// Either [`OrderStatus::Same`] or [`OrderStatus::Moved`].
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    pub moved: usize,
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderDiff {
    pub before_entries: Vec<OrderEntry>,
    pub after_entries: Vec<OrderEntry>,
    pub connectors: Vec<Connector>,
    pub stats: OrderStats,
}

impl OrderDiff {
    pub fn is_unchanged(&self) -> bool {
        self.stats == OrderStats::default()
    }
}

/// Align the key order of `current` against `baseline`. Missing manifests
/// count as empty.
///
/// Takes no [`Kind`](crate::types::Kind): only keys are compared, and key
/// order means the same thing for index and tabs manifests.
pub fn order_diff(current: Option<&Manifest>, baseline: Option<&Manifest>) -> OrderDiff {
    let before: &[String] = baseline.map(|m| m.order.as_slice()).unwrap_or_default();
    let after: &[String] = current.map(|m| m.order.as_slice()).unwrap_or_default();

    let before_pos = positions(before);
    let after_pos = positions(after);

    let mut result = OrderDiff::default();

    for (i, key) in before.iter().enumerate() {
        let matched = after_pos.get(key.as_str()).copied();
        let status = match matched {
            None => OrderStatus::Removed,
            Some(j) if j == i => OrderStatus::Same,
            Some(_) => OrderStatus::Moved,
        };
        match (status, matched) {
            (OrderStatus::Removed, _) => result.stats.removed += 1,
            (_, Some(to)) => {
                if status == OrderStatus::Moved {
                    result.stats.moved += 1;
                }
                result.connectors.push(Connector {
                    key: key.clone(),
                    from: i,
                    to,
                    status,
                });
            }
            (_, None) => {}
        }
        result.before_entries.push(OrderEntry {
            key: key.clone(),
            index: i,
            status,
            matched,
        });
    }

    for (j, key) in after.iter().enumerate() {
        let matched = before_pos.get(key.as_str()).copied();
        let status = match matched {
            None => {
                result.stats.added += 1;
                OrderStatus::Added
            }
            Some(i) if i == j => OrderStatus::Same,
            Some(_) => OrderStatus::Moved,
        };
        result.after_entries.push(OrderEntry {
            key: key.clone(),
            index: j,
            status,
            matched,
        });
    }

    result
}

fn positions(keys: &[String]) -> HashMap<&str, usize> {
    let mut out = HashMap::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        out.entry(key.as_str()).or_insert(i);
    }
    out
}
