//! Input and output seams around the assembly engine.
//!
//! The engine itself never parses or serializes anything: it pulls
//! [`SequenceRecord`]s from a [`SequenceSource`] and pushes results through
//! the sink traits here. The binary wires these to files; tests and the
//! multi-k sweep use the in-memory implementations.

pub mod dot;
pub mod fasta;
pub mod fastq;

pub use dot::write_dot;
pub use fasta::{FastaBubbleWriter, FastaContigWriter, FastaReader};
pub use fastq::FastqReader;

use std::collections::VecDeque;
use std::io;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

/// One input read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

/// Anything that yields reads.
pub trait SequenceSource {
    fn next_record(&mut self) -> io::Result<Option<SequenceRecord>>;
}

/// In-memory source, used by tests and by the multi-k sweep to feed one
/// iteration's contigs into the next.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: VecDeque<SequenceRecord>,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = SequenceRecord>) -> MemorySource {
        MemorySource {
            records: records.into_iter().collect(),
        }
    }

    /// Anonymous reads from raw sequences.
    pub fn from_seqs<S: AsRef<[u8]>>(seqs: &[S]) -> MemorySource {
        MemorySource::new(seqs.iter().enumerate().map(|(i, s)| SequenceRecord {
            id: format!("read{}", i + 1),
            seq: s.as_ref().to_vec(),
            qual: None,
        }))
    }
}

impl SequenceSource for MemorySource {
    fn next_record(&mut self) -> io::Result<Option<SequenceRecord>> {
        Ok(self.records.pop_front())
    }
}

/// Several sources drained back to back (one per input file).
#[derive(Default)]
pub struct ChainSource {
    sources: VecDeque<Box<dyn SequenceSource>>,
}

impl ChainSource {
    pub fn new(sources: impl IntoIterator<Item = Box<dyn SequenceSource>>) -> ChainSource {
        ChainSource {
            sources: sources.into_iter().collect(),
        }
    }
}

impl SequenceSource for ChainSource {
    fn next_record(&mut self) -> io::Result<Option<SequenceRecord>> {
        while let Some(front) = self.sources.front_mut() {
            if let Some(rec) = front.next_record()? {
                return Ok(Some(rec));
            }
            self.sources.pop_front();
        }
        Ok(None)
    }
}

/// One assembled contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigRecord {
    pub id: u64,
    pub seq: String,
    /// Sum of the multiplicities of the contig's vertices.
    pub coverage: u64,
}

pub trait ContigSink {
    fn write_contig(&mut self, record: ContigRecord) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryContigSink {
    pub contigs: Vec<ContigRecord>,
}

impl ContigSink for MemoryContigSink {
    fn write_contig(&mut self, record: ContigRecord) -> io::Result<()> {
        self.contigs.push(record);
        Ok(())
    }
}

/// A popped bubble: the two branch paths from the shared source through the
/// shared sink, winner first.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleRecord {
    pub id: u64,
    pub kept: String,
    pub kept_mean: f64,
    pub popped: String,
    pub popped_mean: f64,
    /// Interior length difference between the two branches.
    pub len_diff: usize,
}

pub trait BubbleSink {
    fn record(&mut self, record: &BubbleRecord) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryBubbleSink {
    pub bubbles: Vec<BubbleRecord>,
}

impl BubbleSink for MemoryBubbleSink {
    fn record(&mut self, record: &BubbleRecord) -> io::Result<()> {
        self.bubbles.push(record.clone());
        Ok(())
    }
}

/// Hands contigs to a dedicated writer thread over a bounded queue, so the
/// output file has a single owner and the walker never blocks on disk
/// longer than the queue depth.
pub struct SpooledContigSink {
    tx: Option<Sender<ContigRecord>>,
    handle: Option<JoinHandle<io::Result<()>>>,
}

impl SpooledContigSink {
    pub fn new<S: ContigSink + Send + 'static>(mut inner: S, depth: usize) -> SpooledContigSink {
        let (tx, rx) = crossbeam_channel::bounded::<ContigRecord>(depth);
        let handle = std::thread::spawn(move || {
            for record in rx {
                inner.write_contig(record)?;
            }
            Ok(())
        });
        SpooledContigSink {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Close the queue and wait for the writer; surfaces any write error.
    pub fn finish(mut self) -> io::Result<()> {
        self.tx.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| io::Error::other("contig writer thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl ContigSink for SpooledContigSink {
    fn write_contig(&mut self, record: ContigRecord) -> io::Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(io::Error::other("contig writer already finished"));
        };
        tx.send(record)
            .map_err(|_| io::Error::other("contig writer thread exited early"))
    }
}
