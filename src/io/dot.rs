//! DOT dump of the post-cleaning graph.

use std::io::{self, Write};

use crate::graph::{Cursor, advance};
use crate::kmer::{Dir, code_to_base};
use crate::store::KmerStore;

/// One node per stored vertex, one directed edge per adjacency bit. Edge
/// labels carry the strand ('+' sense, '-' antisense) and the extension
/// base.
pub fn write_dot(store: &KmerStore, w: &mut dyn Write) -> io::Result<()> {
    let codec = store.codec();
    writeln!(w, "digraph adj {{")?;
    for key in store.sorted_live_keys() {
        let Some(v) = store.get(key) else {
            continue;
        };
        let seq = codec.decode(key);
        writeln!(w, "  \"{}\" [label=\"{} x{}\"];", seq, seq, v.multiplicity())?;
        for dir in Dir::BOTH {
            let strand = match dir {
                Dir::Sense => '+',
                Dir::Antisense => '-',
            };
            for base in 0..4u8 {
                if !v.has_edge(dir, base) {
                    continue;
                }
                let nbr = advance(&codec, Cursor::new(key, dir), base);
                writeln!(
                    w,
                    "  \"{}\" -> \"{}\" [label=\"{}{}\"];",
                    seq,
                    codec.decode(nbr.key),
                    strand,
                    code_to_base(base) as char,
                )?;
            }
        }
    }
    writeln!(w, "}}")?;
    Ok(())
}
