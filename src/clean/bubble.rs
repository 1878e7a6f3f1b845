//! Bubble popping: collapsing short parallel paths between a split and a
//! merge.
//!
//! Sequencing error (or heterozygosity) turns one true path into two
//! near-identical ones sharing a source and a sink. The branch with the
//! higher mean multiplicity survives; the other branch's interior is
//! tombstoned. Ties break on the lexicographically smaller interior
//! sequence so runs are deterministic at any thread count.

use crate::assemble::CancelToken;
use crate::error::Result;
use crate::graph::{Cursor, Step, advance, predecessors, reciprocal, remove_all, step};
use crate::io::{BubbleRecord, BubbleSink};
use crate::kmer::{Dir, code_to_base};
use crate::store::KmerStore;

/// One candidate branch out of a source vertex.
struct Branch {
    /// Base taken out of the source.
    base: u8,
    /// Vertices strictly between source and sink.
    interior: Vec<Cursor>,
    /// Where the branch merged back.
    terminal: Cursor,
    /// Appended bases from source through the sink, oriented along the walk.
    bases: Vec<u8>,
}

impl Branch {
    /// Mean multiplicity over the interior; a direct source->sink edge has
    /// nothing to remove and always wins.
    fn mean(&self, store: &KmerStore) -> f64 {
        if self.interior.is_empty() {
            return f64::INFINITY;
        }
        let total: u64 = self
            .interior
            .iter()
            .filter_map(|c| store.get(c.key))
            .map(|v| v.multiplicity() as u64)
            .sum();
        total as f64 / self.interior.len() as f64
    }

    fn interior_seq(&self) -> String {
        self.bases[..self.interior.len()]
            .iter()
            .map(|&b| code_to_base(b) as char)
            .collect()
    }

    fn full_seq(&self, store: &KmerStore, source: Cursor) -> String {
        let codec = store.codec();
        let mut seq = codec.decode(codec.oriented(source.key, source.dir));
        seq.extend(self.bases.iter().map(|&b| code_to_base(b) as char));
        seq
    }
}

/// Pop every bubble whose branches are at most `max_branch_len` interior
/// vertices long. Emits one record per popped pair to `sink` and returns
/// the number of bubbles popped.
pub fn pop_bubbles(
    store: &KmerStore,
    max_branch_len: usize,
    mut sink: Option<&mut dyn BubbleSink>,
    cancel: &CancelToken,
) -> Result<usize> {
    let mut popped = 0u64;
    let keys = store.sorted_live_keys();
    for (i, &key) in keys.iter().enumerate() {
        if i % 1024 == 0 {
            cancel.checkpoint()?;
        }
        for dir in Dir::BOTH {
            let source = Cursor::new(key, dir);
            let bits = match store.get(key) {
                Some(v) if !v.is_deleted() && v.degree(dir) >= 2 => v.edges(dir),
                _ => continue,
            };

            let mut branches: Vec<Branch> = (0..4u8)
                .filter(|b| bits & (1 << b) != 0)
                .filter_map(|b| walk_branch(store, source, b, max_branch_len))
                .collect();
            if branches.len() < 2 {
                continue;
            }

            // Branches pair up when they meet at the same oriented sink.
            branches.sort_by(|a, b| {
                a.terminal
                    .key
                    .cmp(&b.terminal.key)
                    .then_with(|| a.terminal.dir.index().cmp(&b.terminal.dir.index()))
                    .then_with(|| {
                        b.mean(store)
                            .total_cmp(&a.mean(store))
                            .then_with(|| a.interior_seq().cmp(&b.interior_seq()))
                    })
            });

            let mut idx = 0;
            while idx < branches.len() {
                let group_end = branches[idx..]
                    .iter()
                    .take_while(|b| b.terminal == branches[idx].terminal)
                    .count()
                    + idx;
                let Some((winner, losers)) = branches[idx..group_end].split_first() else {
                    idx = group_end;
                    continue;
                };
                for loser in losers {
                    pop_one(store, source, loser);
                    popped += 1;
                    if let Some(s) = sink.as_deref_mut() {
                        s.record(&BubbleRecord {
                            id: popped,
                            kept: winner.full_seq(store, source),
                            kept_mean: winner.mean(store),
                            popped: loser.full_seq(store, source),
                            popped_mean: loser.mean(store),
                            len_diff: winner.interior.len().abs_diff(loser.interior.len()),
                        })?;
                    }
                }
                idx = group_end;
            }
        }
    }
    store.cleanup();
    Ok(popped as usize)
}

/// Walk one branch as a simple path until it merges (Some) or disqualifies
/// itself: re-entering the source or itself, forking, dead-ending, or
/// overrunning the bound.
fn walk_branch(
    store: &KmerStore,
    source: Cursor,
    base: u8,
    max_branch_len: usize,
) -> Option<Branch> {
    let codec = store.codec();
    let mut bases = vec![base];
    let mut interior = Vec::new();
    let mut cur = advance(&codec, source, base);
    loop {
        if cur.key == source.key || interior.iter().any(|c: &Cursor| c.key == cur.key) {
            return None;
        }
        if predecessors(store, cur) > 1 {
            return Some(Branch {
                base,
                interior,
                terminal: cur,
                bases,
            });
        }
        if interior.len() >= max_branch_len {
            return None;
        }
        match step(store, cur) {
            Step::Next(next, b) => {
                interior.push(cur);
                bases.push(b);
                cur = next;
            }
            Step::DeadEnd | Step::Fork => return None,
        }
    }
}

/// Tombstone a losing branch. Detaching the interior clears the source's
/// and sink's bits; a branch with no interior is a parallel edge whose two
/// end bits are cleared by hand.
fn pop_one(store: &KmerStore, source: Cursor, loser: &Branch) {
    if loser.interior.is_empty() {
        let codec = store.codec();
        if let Some(v) = store.get(source.key) {
            v.clear_edge(source.dir, loser.base);
        }
        let (nbr, back_dir, back_base) = reciprocal(&codec, source, loser.base);
        if let Some(n) = store.get(nbr.key) {
            n.clear_edge(back_dir, back_base);
        }
        return;
    }
    let doomed: Vec<_> = loser.interior.iter().map(|c| c.key).collect();
    remove_all(store, &doomed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_adjacency;
    use crate::io::MemoryBubbleSink;
    use crate::kmer::Kmer;

    fn loaded(k: usize, reads: &[(&[u8], usize)]) -> KmerStore {
        let store = KmerStore::new(k);
        for (read, copies) in reads {
            for _ in 0..*copies {
                for w in store.codec().windows(read) {
                    store.add(w);
                }
            }
        }
        build_adjacency(&store);
        store
    }

    fn key(store: &KmerStore, s: &[u8]) -> Kmer {
        store.codec().canonical(store.codec().encode(s).unwrap()).0
    }

    // Two paths between TAGC and GTCC differing in one middle base:
    // ...AGC[A]GTC... (strong) vs ...AGC[C]GTC... (weak).
    const STRONG: &[u8] = b"TTAGCAGTCC";
    const WEAK: &[u8] = b"TTAGCCGTCC";

    #[test]
    fn pops_the_weak_branch() {
        let store = loaded(4, &[(STRONG, 9), (WEAK, 3)]);
        let cancel = CancelToken::new();
        let mut sink = MemoryBubbleSink::default();

        let popped = pop_bubbles(&store, 12, Some(&mut sink), &cancel).unwrap();
        assert_eq!(popped, 1);
        assert_eq!(sink.bubbles.len(), 1);

        // weak interior gone, strong interior intact
        assert!(!store.contains(key(&store, b"GCCG")));
        assert!(store.contains(key(&store, b"GCAG")));
        assert!(store.contains(key(&store, b"TAGC")));
        assert!(store.contains(key(&store, b"GTCC")));

        let rec = &sink.bubbles[0];
        assert!(rec.kept_mean > rec.popped_mean);
        assert_eq!(rec.len_diff, 0);
    }

    #[test]
    fn popping_preserves_source_to_sink_reachability() {
        let store = loaded(4, &[(STRONG, 9), (WEAK, 3)]);
        let cancel = CancelToken::new();
        pop_bubbles(&store, 12, None, &cancel).unwrap();

        // the surviving graph still runs straight from one end to the other
        let (start, read_dir) = store.codec().canonical(store.codec().encode(b"TTAG").unwrap());
        let mut cur = Cursor::new(start, read_dir);
        let mut hops = 0;
        loop {
            match step(&store, cur) {
                Step::Next(next, _) => {
                    cur = next;
                    hops += 1;
                }
                Step::DeadEnd => break,
                Step::Fork => panic!("graph still forks after popping"),
            }
            assert!(hops < 32, "walk did not terminate");
        }
        assert_eq!(hops, 6); // TTAG through GTCC, one vertex per hop
    }

    #[test]
    fn tie_breaks_on_smaller_interior_sequence() {
        let store = loaded(4, &[(STRONG, 5), (WEAK, 5)]);
        let cancel = CancelToken::new();
        let mut sink = MemoryBubbleSink::default();

        let popped = pop_bubbles(&store, 12, Some(&mut sink), &cancel).unwrap();
        assert_eq!(popped, 1);
        // equal means: the branch whose interior decodes smaller survives
        let rec = &sink.bubbles[0];
        assert_eq!(rec.kept_mean, rec.popped_mean);
        assert!(rec.kept <= rec.popped);
    }

    #[test]
    fn oversized_bubble_is_left_alone() {
        let store = loaded(4, &[(STRONG, 9), (WEAK, 3)]);
        let cancel = CancelToken::new();
        let popped = pop_bubbles(&store, 1, None, &cancel).unwrap();
        assert_eq!(popped, 0);
        assert!(store.contains(key(&store, b"GCCG")));
    }

    #[test]
    fn plain_fork_is_not_a_bubble() {
        // two branches that never merge again
        let store = loaded(4, &[(b"TTAGCAGTCC", 3), (b"AGCAATGGAT", 3)]);
        let cancel = CancelToken::new();
        let popped = pop_bubbles(&store, 12, None, &cancel).unwrap();
        assert_eq!(popped, 0);
    }
}
