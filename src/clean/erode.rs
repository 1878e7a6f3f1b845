//! Tip erosion: iterated removal of low-coverage dead ends.

use crate::assemble::CancelToken;
use crate::error::Result;
use crate::graph::remove_all;
use crate::kmer::Dir;
use crate::store::{KmerStore, VertexData};

/// Remove every tip whose total coverage is below `min_coverage`; repeat
/// until a pass removes nothing. Returns the number of vertices removed.
///
/// At the fixed point an immediate second call removes zero; the driver
/// asserts that.
pub fn erode(store: &KmerStore, min_coverage: u32, cancel: &CancelToken) -> Result<usize> {
    erode_where(store, cancel, |v| v.multiplicity() < min_coverage)
}

/// Stranded variant: a tip dies when either strand counter alone falls
/// below `min_strand_coverage`.
pub fn erode_stranded(
    store: &KmerStore,
    min_strand_coverage: u32,
    cancel: &CancelToken,
) -> Result<usize> {
    erode_where(store, cancel, |v| {
        v.count(Dir::Sense) < min_strand_coverage || v.count(Dir::Antisense) < min_strand_coverage
    })
}

fn erode_where(
    store: &KmerStore,
    cancel: &CancelToken,
    noise: impl Fn(&VertexData) -> bool + Send + Sync,
) -> Result<usize> {
    let mut total = 0;
    loop {
        cancel.checkpoint()?;
        let doomed = store.par_collect_keys(|_, v| v.is_tip() && noise(v));
        if doomed.is_empty() {
            break;
        }
        // Removing a tip can expose its neighbor as the next tip; the
        // following pass picks those up.
        total += remove_all(store, &doomed);
    }
    store.cleanup();
    Ok(total)
}
