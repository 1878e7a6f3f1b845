//! Dead-end branch trimming.
//!
//! A tip that rejoins the main graph within a few vertices is a read-error
//! artifact; a long dead end is more likely real sequence truncated by
//! coverage. Walks start at tips and only mark paths that hit a junction
//! (a vertex with more than one predecessor in the walk direction) within
//! the length bound.

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::assemble::CancelToken;
use crate::error::Result;
use crate::graph::{Cursor, Step, predecessors, remove_all, step};
use crate::kmer::{Dir, Kmer};
use crate::store::KmerStore;

/// Remove dead-end branches of at most `max_branch_len` vertices; repeat
/// until a pass marks nothing. Returns the number of vertices removed.
///
/// The bound ramps up 1, 2, 4, ... so one-vertex spurs die before longer
/// walks run. A junction created by a short error spur would otherwise make
/// the true path beyond it look like a removable branch too.
pub fn trim(store: &KmerStore, max_branch_len: usize, cancel: &CancelToken) -> Result<usize> {
    let max_branch_len = max_branch_len.max(1);
    let mut total = 0;
    let mut bound = 1;
    loop {
        cancel.checkpoint()?;
        let removed = trim_pass(store, bound);
        total += removed;
        if bound >= max_branch_len {
            if removed == 0 {
                break;
            }
        } else {
            bound = (bound * 2).min(max_branch_len);
        }
    }
    Ok(total)
}

/// One scan-and-remove round at a fixed length bound.
fn trim_pass(store: &KmerStore, bound: usize) -> usize {
    let tips = store.par_collect_keys(|_, v| v.is_tip());
    let marked: Vec<Vec<Kmer>> = tips
        .par_iter()
        .filter_map(|&tip| branch_to_junction(store, tip, bound))
        .collect();

    // Two tips can walk into the same chain; dedupe before removal.
    let mut doomed: Vec<Kmer> = marked
        .into_iter()
        .flatten()
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();
    doomed.sort_unstable();

    let removed = remove_all(store, &doomed);
    store.cleanup();
    removed
}

/// Walk inward from a tip along the unique adjacency. Some(path) when a
/// junction is reached within the bound; the junction itself is excluded.
fn branch_to_junction(store: &KmerStore, tip: Kmer, max_branch_len: usize) -> Option<Vec<Kmer>> {
    let dir = {
        let v = store.get(tip)?;
        match (v.degree(Dir::Sense), v.degree(Dir::Antisense)) {
            (0, 0) => return None, // isolated island, not a branch
            (0, _) => Dir::Antisense,
            (_, 0) => Dir::Sense,
            _ => return None, // raced a concurrent update; no longer a tip
        }
    };

    let mut path = vec![tip];
    let mut cur = Cursor::new(tip, dir);
    loop {
        match step(store, cur) {
            // A chain that dead-ends again is an island, and a fork inside
            // the walk is not a tip's business; leave both alone.
            Step::DeadEnd | Step::Fork => return None,
            Step::Next(next, _) => {
                if predecessors(store, next) > 1 {
                    return Some(path);
                }
                if path.len() >= max_branch_len || path.contains(&next.key) {
                    return None;
                }
                path.push(next.key);
                cur = next;
            }
        }
    }
}
