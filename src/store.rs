//! Shared vertex store: canonical k-mer -> vertex record.
//!
//! The map is concurrent so the load and adjacency phases can hammer it from
//! rayon workers; per-record state (strand counters, edge bitsets, flags) is
//! atomic so distinct workers may touch the same record. Removal phases
//! tombstone records via a flag and compact them later with [`KmerStore::cleanup`],
//! which must not run concurrently with anything else.

use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::FxBuildHasher;

use crate::kmer::{Dir, Kmer, KmerCodec};

const SEEN: u8 = 0b0001;
const DELETED: u8 = 0b0010;
const MARK_SENSE: u8 = 0b0100;

/// Per-vertex record: one strand-observation counter pair, one 4-bit
/// adjacency set per direction, and a flag byte. Everything is atomic with
/// relaxed ordering; phases that need a consistent view put a join barrier
/// between the writes and the reads.
#[derive(Debug)]
pub struct VertexData {
    counts: [AtomicU32; 2],
    edges: [AtomicU8; 2],
    flags: AtomicU8,
}

impl Default for VertexData {
    fn default() -> Self {
        VertexData {
            counts: [AtomicU32::new(0), AtomicU32::new(0)],
            edges: [AtomicU8::new(0), AtomicU8::new(0)],
            flags: AtomicU8::new(0),
        }
    }
}

impl VertexData {
    /// Record one observation on `strand`, saturating at u32::MAX.
    pub fn observe(&self, strand: Dir) {
        let c = &self.counts[strand.index()];
        let mut cur = c.load(Ordering::Relaxed);
        while cur < u32::MAX {
            match c.compare_exchange_weak(cur, cur + 1, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(seen) => cur = seen,
            }
        }
    }

    #[inline]
    pub fn count(&self, strand: Dir) -> u32 {
        self.counts[strand.index()].load(Ordering::Relaxed)
    }

    /// Total observations over both strands (the vertex coverage).
    #[inline]
    pub fn multiplicity(&self) -> u32 {
        self.count(Dir::Sense).saturating_add(self.count(Dir::Antisense))
    }

    #[inline]
    pub fn edges(&self, dir: Dir) -> u8 {
        self.edges[dir.index()].load(Ordering::Relaxed) & 0x0f
    }

    #[inline]
    pub fn set_edge(&self, dir: Dir, base: u8) {
        self.edges[dir.index()].fetch_or(1 << (base & 3), Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_edge(&self, dir: Dir, base: u8) {
        self.edges[dir.index()].fetch_and(!(1 << (base & 3)), Ordering::Relaxed);
    }

    #[inline]
    pub fn has_edge(&self, dir: Dir, base: u8) -> bool {
        self.edges(dir) & (1 << (base & 3)) != 0
    }

    #[inline]
    pub fn degree(&self, dir: Dir) -> u32 {
        self.edges(dir).count_ones()
    }

    /// Dead end in at least one direction.
    #[inline]
    pub fn is_tip(&self) -> bool {
        self.degree(Dir::Sense) == 0 || self.degree(Dir::Antisense) == 0
    }

    /// More than one way out in at least one direction.
    #[inline]
    pub fn is_ambiguous(&self) -> bool {
        self.degree(Dir::Sense) > 1 || self.degree(Dir::Antisense) > 1
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & DELETED != 0
    }

    #[inline]
    pub fn delete(&self) {
        self.flags.fetch_or(DELETED, Ordering::Relaxed);
    }

    #[inline]
    pub fn mark(&self, dir: Dir) {
        self.flags.fetch_or(MARK_SENSE << dir.index(), Ordering::Relaxed);
    }

    #[inline]
    pub fn unmark(&self, dir: Dir) {
        self.flags.fetch_and(!(MARK_SENSE << dir.index()), Ordering::Relaxed);
    }

    #[inline]
    pub fn is_marked(&self, dir: Dir) -> bool {
        self.flags.load(Ordering::Relaxed) & (MARK_SENSE << dir.index()) != 0
    }

    #[inline]
    pub fn is_marked_any(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & (MARK_SENSE | (MARK_SENSE << 1)) != 0
    }

    pub fn clear_marks(&self) {
        self.flags
            .fetch_and(!(MARK_SENSE | (MARK_SENSE << 1)), Ordering::Relaxed);
    }

    /// Set SEEN; true if this call was the one that set it.
    #[inline]
    pub fn claim_seen(&self) -> bool {
        self.flags.fetch_or(SEEN, Ordering::Relaxed) & SEEN == 0
    }

    #[inline]
    pub fn is_seen(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & SEEN != 0
    }

    #[inline]
    pub fn clear_seen(&self) {
        self.flags.fetch_and(!SEEN, Ordering::Relaxed);
    }
}

/// The one shared mutable structure of an assembly. Owns every vertex
/// record; all other components borrow it for the duration of a phase.
pub struct KmerStore {
    codec: KmerCodec,
    map: DashMap<Kmer, VertexData, FxBuildHasher>,
}

impl KmerStore {
    pub fn new(k: usize) -> KmerStore {
        KmerStore {
            codec: KmerCodec::new(k),
            map: DashMap::with_hasher(FxBuildHasher),
        }
    }

    #[inline]
    pub fn codec(&self) -> KmerCodec {
        self.codec
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.codec.k()
    }

    /// Insert-or-increment the canonical form of an as-read word, crediting
    /// the strand it was observed on. Safe to call concurrently.
    pub fn add(&self, word: Kmer) {
        let (key, strand) = self.codec.canonical(word);
        self.map.entry(key).or_default().observe(strand);
    }

    /// Read handle for a vertex, tombstoned or not.
    pub fn get(&self, key: Kmer) -> Option<impl Deref<Target = VertexData> + '_> {
        self.map.get(&key)
    }

    /// True only for present (non-tombstoned) vertices.
    pub fn contains(&self, key: Kmer) -> bool {
        self.map.get(&key).is_some_and(|v| !v.is_deleted())
    }

    /// Tombstone a vertex. The slot is reclaimed by the next [`cleanup`].
    /// Callers detach the vertex from its neighbors first (see
    /// [`crate::graph::detach`]).
    ///
    /// [`cleanup`]: KmerStore::cleanup
    pub fn remove(&self, key: Kmer) {
        if let Some(v) = self.map.get(&key) {
            v.delete();
        }
    }

    /// Compact tombstones. Serial: invalidates iteration and must not race
    /// reads or writes.
    pub fn cleanup(&self) {
        self.map.retain(|_, v| !v.is_deleted());
    }

    /// Slot count, tombstones included until the next cleanup.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_len() == 0
    }

    /// Present-vertex count.
    pub fn live_len(&self) -> usize {
        self.map.par_iter().filter(|r| !r.value().is_deleted()).count()
    }

    pub fn live_keys(&self) -> Vec<Kmer> {
        self.map
            .par_iter()
            .filter(|r| !r.value().is_deleted())
            .map(|r| *r.key())
            .collect()
    }

    /// Live keys in ascending order; removal scans and the contig walker
    /// iterate in this order so runs are reproducible.
    pub fn sorted_live_keys(&self) -> Vec<Kmer> {
        let mut keys = self.live_keys();
        keys.sort_unstable();
        keys
    }

    /// Keys of present vertices satisfying `pred`, gathered in parallel and
    /// sorted so downstream removal order is reproducible.
    pub fn par_collect_keys(
        &self,
        pred: impl Fn(Kmer, &VertexData) -> bool + Send + Sync,
    ) -> Vec<Kmer> {
        let mut keys: Vec<Kmer> = self
            .map
            .par_iter()
            .filter(|r| !r.value().is_deleted() && pred(*r.key(), r.value()))
            .map(|r| *r.key())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Serial visit of every present vertex.
    pub fn each(&self, mut f: impl FnMut(Kmer, &VertexData)) {
        for r in self.map.iter() {
            if !r.value().is_deleted() {
                f(*r.key(), r.value());
            }
        }
    }

    /// Parallel visit of every present vertex.
    pub fn par_each(&self, f: impl Fn(Kmer, &VertexData) + Send + Sync) {
        self.map.par_iter().for_each(|r| {
            let v = r.value();
            if !v.is_deleted() {
                f(*r.key(), v);
            }
        });
    }

    /// Drop both mark flags everywhere; phases call this on entry.
    pub fn clear_marks(&self) {
        self.map.par_iter().for_each(|r| r.value().clear_marks());
    }

    /// Drop the SEEN flag everywhere; a walk calls this when done.
    pub fn clear_seen(&self) {
        self.map.par_iter().for_each(|r| r.value().clear_seen());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_from(k: usize, reads: &[&[u8]]) -> KmerStore {
        let store = KmerStore::new(k);
        for read in reads {
            for w in store.codec().windows(read) {
                store.add(w);
            }
        }
        store
    }

    #[test]
    fn add_is_orientation_free() {
        let store = KmerStore::new(3);
        let c = store.codec();
        store.add(c.encode(b"ACG").unwrap());
        store.add(c.encode(b"CGT").unwrap()); // reverse complement of ACG

        assert_eq!(store.len(), 1);
        let (key, _) = c.canonical(c.encode(b"ACG").unwrap());
        let v = store.get(key).unwrap();
        assert_eq!(v.count(Dir::Sense), 1);
        assert_eq!(v.count(Dir::Antisense), 1);
        assert_eq!(v.multiplicity(), 2);
    }

    #[test]
    fn palindrome_uses_one_slot() {
        let store = KmerStore::new(4);
        let c = store.codec();
        let w = c.encode(b"ACGT").unwrap();
        store.add(w);
        store.add(c.reverse_complement(w));

        assert_eq!(store.len(), 1);
        let v = store.get(w).unwrap();
        assert_eq!(v.count(Dir::Sense), 2);
        assert_eq!(v.count(Dir::Antisense), 0);
    }

    #[test]
    fn remove_then_cleanup_reclaims() {
        let store = store_from(3, &[b"AATCAGGC"]);
        let before = store.len();
        let key = store.sorted_live_keys()[0];
        store.remove(key);

        assert!(!store.contains(key));
        assert_eq!(store.len(), before); // tombstone still occupies a slot
        store.cleanup();
        assert_eq!(store.len(), before - 1);
        assert_eq!(store.live_len(), before - 1);
    }

    #[test]
    fn edge_bits_and_degrees() {
        let v = VertexData::default();
        v.set_edge(Dir::Sense, 0);
        v.set_edge(Dir::Sense, 3);
        v.set_edge(Dir::Antisense, 2);

        assert_eq!(v.degree(Dir::Sense), 2);
        assert_eq!(v.degree(Dir::Antisense), 1);
        assert!(v.has_edge(Dir::Sense, 3));
        assert!(v.is_ambiguous());
        assert!(!v.is_tip());

        v.clear_edge(Dir::Sense, 3);
        v.clear_edge(Dir::Antisense, 2);
        assert_eq!(v.degree(Dir::Sense), 1);
        assert!(v.is_tip());
    }

    #[test]
    fn marks_and_seen_are_independent() {
        let v = VertexData::default();
        v.mark(Dir::Antisense);
        assert!(v.is_marked(Dir::Antisense));
        assert!(!v.is_marked(Dir::Sense));
        assert!(v.is_marked_any());

        assert!(v.claim_seen());
        assert!(!v.claim_seen());
        v.clear_marks();
        assert!(v.is_seen());
        assert!(!v.is_marked_any());
        v.clear_seen();
        assert!(!v.is_seen());
    }

    #[test]
    fn observe_saturates() {
        let v = VertexData::default();
        v.counts[0].store(u32::MAX - 1, Ordering::Relaxed);
        v.observe(Dir::Sense);
        v.observe(Dir::Sense);
        assert_eq!(v.count(Dir::Sense), u32::MAX);
    }
}
