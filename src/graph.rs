//! Adjacency over the vertex store.
//!
//! No vertex holds a reference to another: an edge bit only says "this base
//! extends to a vertex the store contains", and neighbor keys are rebuilt on
//! demand from the current word plus that base. A [`Cursor`] is an oriented
//! position in the graph; stepping it re-canonicalizes, so a walk may visit
//! the same stored vertex on either strand.

use crate::kmer::{Dir, Kmer, KmerCodec, complement};
use crate::store::KmerStore;

/// An oriented position: a canonical key plus the strand a walk is
/// extending along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub key: Kmer,
    pub dir: Dir,
}

impl Cursor {
    pub fn new(key: Kmer, dir: Dir) -> Cursor {
        Cursor { key, dir }
    }

    /// The same position on the opposite strand.
    pub fn flip(self) -> Cursor {
        Cursor {
            key: self.key,
            dir: self.dir.opposite(),
        }
    }
}

/// Follow one extension base from `cur`; the result is canonical again.
#[inline]
pub fn advance(codec: &KmerCodec, cur: Cursor, base: u8) -> Cursor {
    let word = codec.oriented(cur.key, cur.dir);
    let (key, dir) = codec.canonical(codec.shift_left(word, base));
    Cursor { key, dir }
}

/// The edge bit on the far vertex that points back across the same overlap.
///
/// For an edge leaving `cur` by `base`, the neighbor sees it in its opposite
/// strand, labeled with the complement of `cur`'s leftmost base.
#[inline]
pub fn reciprocal(codec: &KmerCodec, cur: Cursor, base: u8) -> (Cursor, Dir, u8) {
    let nbr = advance(codec, cur, base);
    let back_base = complement(codec.first_base(codec.oriented(cur.key, cur.dir)));
    (nbr, nbr.dir.opposite(), back_base)
}

/// Populate every present vertex's two edge bitsets by probing all eight
/// candidate neighbors (4 bases x 2 strands) against the store. Runs on the
/// rayon pool; bits are set with atomic ORs.
pub fn build_adjacency(store: &KmerStore) {
    let codec = store.codec();
    store.par_each(|key, v| {
        for dir in Dir::BOTH {
            let word = codec.oriented(key, dir);
            for base in 0..4u8 {
                let (candidate, _) = codec.canonical(codec.shift_left(word, base));
                if store.contains(candidate) {
                    v.set_edge(dir, base);
                }
            }
        }
    });
}

/// Clear every neighbor's reciprocal bit for `key`'s remaining edges.
/// Called immediately before tombstoning so no bit ever asserts a vertex
/// the store no longer contains.
pub fn detach(store: &KmerStore, key: Kmer) {
    let codec = store.codec();
    let Some(v) = store.get(key) else {
        return;
    };
    for dir in Dir::BOTH {
        let bits = v.edges(dir);
        for base in 0..4u8 {
            if bits & (1 << base) == 0 {
                continue;
            }
            let (nbr, back_dir, back_base) = reciprocal(&codec, Cursor::new(key, dir), base);
            if nbr.key == key {
                v.clear_edge(back_dir, back_base);
            } else if let Some(n) = store.get(nbr.key) {
                n.clear_edge(back_dir, back_base);
            }
        }
    }
}

/// Detach and tombstone every key in `doomed`; returns how many were
/// actually removed. Serial: runs after the parallel scan that produced the
/// set.
pub fn remove_all(store: &KmerStore, doomed: &[Kmer]) -> usize {
    let mut removed = 0;
    for &key in doomed {
        if store.contains(key) {
            detach(store, key);
            store.remove(key);
            removed += 1;
        }
    }
    removed
}

/// Set the per-direction mark flag on every vertex with more than one way
/// out in that direction. Walk phases read the marks instead of re-deriving
/// degrees.
pub fn mark_ambiguous(store: &KmerStore) {
    store.par_each(|_, v| {
        for dir in Dir::BOTH {
            if v.degree(dir) > 1 {
                v.mark(dir);
            }
        }
    });
}

/// Outcome of asking for the unique continuation of a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No extension in this direction.
    DeadEnd,
    /// More than one extension; the walk cannot choose.
    Fork,
    /// Exactly one extension.
    Next(Cursor, u8),
}

/// The unique successor of `cur`, if there is exactly one.
pub fn step(store: &KmerStore, cur: Cursor) -> Step {
    let Some(v) = store.get(cur.key) else {
        return Step::DeadEnd;
    };
    let bits = v.edges(cur.dir);
    match bits.count_ones() {
        0 => Step::DeadEnd,
        1 => {
            let base = bits.trailing_zeros() as u8;
            drop(v);
            let next = advance(&store.codec(), cur, base);
            assert!(
                store.contains(next.key),
                "edge bit {base} of {key} points at a vertex the store does not contain",
                key = cur.key,
            );
            Step::Next(next, base)
        }
        _ => Step::Fork,
    }
}

/// How many edges enter `cur` against its walk direction.
#[inline]
pub fn predecessors(store: &KmerStore, cur: Cursor) -> u32 {
    store
        .get(cur.key)
        .map(|v| v.degree(cur.dir.opposite()))
        .unwrap_or(0)
}
