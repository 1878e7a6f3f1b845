//! Low-coverage path removal.
//!
//! Splits the graph at ambiguous vertices, walks every non-ambiguous
//! maximal path, and drops the whole path when its mean multiplicity falls
//! below the configured contig-coverage cutoff. Shared ambiguous endpoints
//! are never part of the path, so they survive; detaching the removed
//! vertices clears the edges into them.

use crate::assemble::CancelToken;
use crate::error::Result;
use crate::graph::{mark_ambiguous, remove_all};
use crate::store::KmerStore;
use crate::walk::trace_linear;

/// Remove every non-ambiguous maximal path with mean multiplicity below
/// `min_mean`. Returns the number of vertices removed. The caller re-runs
/// the eroder afterwards: removal can expose weak tips.
pub fn filter_low_coverage(
    store: &KmerStore,
    min_mean: f64,
    cancel: &CancelToken,
) -> Result<usize> {
    store.clear_marks();
    mark_ambiguous(store);

    let keys = store.sorted_live_keys();
    let mut doomed = Vec::new();
    for (i, &key) in keys.iter().enumerate() {
        if i % 4096 == 0 {
            cancel.checkpoint()?;
        }
        let skip = match store.get(key) {
            None => true,
            Some(v) => v.is_seen() || v.is_marked_any(),
        };
        if skip {
            continue;
        }
        let path = trace_linear(store, key);
        if path.is_empty() {
            continue;
        }
        let total: u64 = path
            .iter()
            .filter_map(|c| store.get(c.key))
            .map(|v| v.multiplicity() as u64)
            .sum();
        let mean = total as f64 / path.len() as f64;
        if mean < min_mean {
            doomed.extend(path.iter().map(|c| c.key));
        }
    }

    let removed = remove_all(store, &doomed);
    store.cleanup();
    store.clear_seen();
    store.clear_marks();
    Ok(removed)
}
