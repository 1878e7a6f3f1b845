//! Contig extraction: maximal non-branching paths through the cleaned graph.

use crate::assemble::CancelToken;
use crate::error::{Error, Result};
use crate::graph::{Cursor, Step, predecessors, step};
use crate::io::{ContigRecord, ContigSink};
use crate::kmer::{Dir, Kmer, code_to_base};
use crate::store::KmerStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkSummary {
    pub contigs: u64,
    pub bases: u64,
    /// Sum of vertex multiplicities over every emitted contig.
    pub coverage: u64,
}

/// Emit one contig per maximal unambiguous path.
///
/// Preconditions: adjacency is current and ambiguous vertices carry their
/// mark flags (see [`crate::graph::mark_ambiguous`]). Every present vertex
/// lands in exactly one contig; an ambiguous vertex bounds its neighbors'
/// contigs and seeds its own when its turn comes. Walk order is the sorted
/// key order, so contig ids are reproducible for a given surviving graph.
pub fn walk_contigs(
    store: &KmerStore,
    sink: &mut dyn ContigSink,
    cancel: &CancelToken,
) -> Result<WalkSummary> {
    let mut summary = WalkSummary::default();
    let keys = store.sorted_live_keys();
    for (i, &key) in keys.iter().enumerate() {
        if i % 4096 == 0 {
            cancel.checkpoint()?;
        }
        let path = trace_linear(store, key);
        if path.is_empty() {
            continue;
        }
        let seq = sequence_of(store, &path);
        let coverage: u64 = path
            .iter()
            .filter_map(|c| store.get(c.key))
            .map(|v| v.multiplicity() as u64)
            .sum();
        summary.contigs += 1;
        summary.bases += seq.len() as u64;
        summary.coverage += coverage;
        sink.write_contig(ContigRecord {
            id: summary.contigs,
            seq,
            coverage,
        })?;
    }
    store.clear_seen();
    if summary.contigs == 0 {
        return Err(Error::AssemblyEmpty);
    }
    Ok(summary)
}

/// The maximal unambiguous path through `seed`, oriented left to right with
/// the seed on its canonical strand. Every vertex on the path is claimed
/// via SEEN; an already-claimed or ambiguous vertex bounds the path.
/// Empty when `seed` is gone or already claimed.
pub(crate) fn trace_linear(store: &KmerStore, seed: Kmer) -> Vec<Cursor> {
    {
        let Some(v) = store.get(seed) else {
            return Vec::new();
        };
        if v.is_deleted() || !v.claim_seen() {
            return Vec::new();
        }
    }
    let right = extend(store, Cursor::new(seed, Dir::Sense));
    let left = extend(store, Cursor::new(seed, Dir::Antisense));

    // The left arm walked the opposite strand; flip it back and reverse so
    // the whole path reads in one direction.
    let mut path: Vec<Cursor> = left.into_iter().rev().map(Cursor::flip).collect();
    path.push(Cursor::new(seed, Dir::Sense));
    path.extend(right);
    path
}

fn extend(store: &KmerStore, mut cur: Cursor) -> Vec<Cursor> {
    let mut out = Vec::new();
    loop {
        match step(store, cur) {
            Step::Next(next, _) => {
                let stop = {
                    let Some(v) = store.get(next.key) else {
                        break;
                    };
                    // An ambiguous vertex is shared; the walk ends before
                    // consuming it. A merge point ends the walk the same way.
                    if v.is_marked_any() || predecessors(store, next) > 1 {
                        true
                    } else {
                        !v.claim_seen()
                    }
                };
                if stop {
                    break;
                }
                out.push(next);
                cur = next;
            }
            Step::DeadEnd | Step::Fork => break,
        }
    }
    out
}

/// Decode a path into its DNA string: the first oriented word, then one
/// appended base per following vertex.
pub(crate) fn sequence_of(store: &KmerStore, path: &[Cursor]) -> String {
    let codec = store.codec();
    let Some(first) = path.first() else {
        return String::new();
    };
    let mut seq = codec.decode(codec.oriented(first.key, first.dir));
    for c in &path[1..] {
        seq.push(code_to_base(codec.last_base(codec.oriented(c.key, c.dir))) as char);
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_adjacency, mark_ambiguous};
    use crate::io::MemoryContigSink;

    fn loaded(k: usize, reads: &[&[u8]]) -> KmerStore {
        let store = KmerStore::new(k);
        for read in reads {
            for w in store.codec().windows(read) {
                store.add(w);
            }
        }
        build_adjacency(&store);
        mark_ambiguous(&store);
        store
    }

    fn normalize(seq: &str) -> String {
        // a contig may be emitted on either strand
        let rc: String = seq
            .bytes()
            .rev()
            .map(|b| match b {
                b'A' => 'T',
                b'C' => 'G',
                b'G' => 'C',
                _ => 'A',
            })
            .collect();
        seq.to_string().min(rc)
    }

    #[test]
    fn linear_read_becomes_one_contig() {
        let store = loaded(3, &[b"AACCAGAT"]);
        let cancel = CancelToken::new();
        let mut sink = MemoryContigSink::default();
        let summary = walk_contigs(&store, &mut sink, &cancel).unwrap();

        assert_eq!(summary.contigs, 1);
        assert_eq!(summary.bases, 8);
        assert_eq!(normalize(&sink.contigs[0].seq), normalize("AACCAGAT"));
    }

    #[test]
    fn coverage_is_conserved() {
        let store = loaded(3, &[b"AATCAGGC", b"AATCAGGC", b"TTTGA"]);
        let cancel = CancelToken::new();
        let mut sink = MemoryContigSink::default();
        let summary = walk_contigs(&store, &mut sink, &cancel).unwrap();

        let mut surviving = 0u64;
        store.each(|_, v| surviving += v.multiplicity() as u64);
        assert_eq!(summary.coverage, surviving);
        assert_eq!(
            summary.coverage,
            sink.contigs.iter().map(|c| c.coverage).sum::<u64>()
        );
    }

    #[test]
    fn fork_splits_contigs() {
        // CAG extends to both AGA and AGG; the fork vertex bounds its
        // neighbors' contigs and seeds its own.
        let store = loaded(3, &[b"TCAGA", b"TCAGG"]);
        let cancel = CancelToken::new();
        let mut sink = MemoryContigSink::default();
        let summary = walk_contigs(&store, &mut sink, &cancel).unwrap();

        assert!(summary.contigs >= 3);
        let total_vertices: u64 = store.live_len() as u64;
        let emitted_vertices: u64 = sink
            .contigs
            .iter()
            .map(|c| (c.seq.len() - 2) as u64)
            .sum();
        assert_eq!(emitted_vertices, total_vertices);
    }

    #[test]
    fn all_ambiguous_graph_yields_singletons() {
        // Four reads that make every middle vertex branch both ways.
        let store = loaded(3, &[b"ACTA", b"ACTC", b"GCTA", b"GCTC"]);
        let cancel = CancelToken::new();
        let mut sink = MemoryContigSink::default();
        let summary = walk_contigs(&store, &mut sink, &cancel).unwrap();

        // ACT/GCT both feed CTA/CTC through CT; the shared middle vertices
        // emit alone rather than joining either side.
        assert_eq!(summary.contigs as usize, sink.contigs.len());
        let singletons = sink.contigs.iter().filter(|c| c.seq.len() == 3).count();
        assert!(singletons >= 2);
    }

    #[test]
    fn self_loop_stops_the_walk() {
        let store = loaded(4, &[b"AAAAAA"]);
        let cancel = CancelToken::new();
        let mut sink = MemoryContigSink::default();
        let summary = walk_contigs(&store, &mut sink, &cancel).unwrap();
        assert_eq!(summary.contigs, 1);
        assert_eq!(sink.contigs[0].seq, "AAAA");
    }

    #[test]
    fn empty_graph_is_fatal() {
        let store = KmerStore::new(3);
        let cancel = CancelToken::new();
        let mut sink = MemoryContigSink::default();
        assert!(matches!(
            walk_contigs(&store, &mut sink, &cancel),
            Err(Error::AssemblyEmpty)
        ));
    }
}
