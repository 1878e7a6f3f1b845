//! FASTA input and output.

use std::io::{self, BufRead, Write};

use super::{BubbleRecord, BubbleSink, ContigRecord, ContigSink, SequenceRecord, SequenceSource};

const LINE_WIDTH: usize = 60;

/// Multi-line FASTA reader over any buffered input.
pub struct FastaReader<R: BufRead> {
    inner: R,
    line: String,
    /// Header of the record after the current one, already consumed from
    /// the stream.
    pending: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(inner: R) -> FastaReader<R> {
        FastaReader {
            inner,
            line: String::new(),
            pending: None,
        }
    }
}

impl<R: BufRead> SequenceSource for FastaReader<R> {
    fn next_record(&mut self) -> io::Result<Option<SequenceRecord>> {
        let header = loop {
            if let Some(h) = self.pending.take() {
                break h;
            }
            self.line.clear();
            if self.inner.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let t = self.line.trim_end();
            if let Some(h) = t.strip_prefix('>') {
                break h.to_string();
            }
            // junk before the first header is ignored
        };

        let mut seq = Vec::new();
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line)? == 0 {
                break;
            }
            let t = self.line.trim_end();
            if let Some(h) = t.strip_prefix('>') {
                self.pending = Some(h.to_string());
                break;
            }
            seq.extend_from_slice(t.as_bytes());
        }

        let id = header.split_whitespace().next().unwrap_or("").to_string();
        Ok(Some(SequenceRecord {
            id,
            seq,
            qual: None,
        }))
    }
}

/// Serializes contigs as FASTA: a `>id len coverage` header, then the
/// sequence wrapped at 60 columns.
pub struct FastaContigWriter<W: Write> {
    inner: W,
}

impl<W: Write> FastaContigWriter<W> {
    pub fn new(inner: W) -> FastaContigWriter<W> {
        FastaContigWriter { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ContigSink for FastaContigWriter<W> {
    fn write_contig(&mut self, record: ContigRecord) -> io::Result<()> {
        writeln!(
            self.inner,
            ">{} {} {}",
            record.id,
            record.seq.len(),
            record.coverage
        )?;
        for chunk in record.seq.as_bytes().chunks(LINE_WIDTH) {
            self.inner.write_all(chunk)?;
            self.inner.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Writes popped bubbles as FASTA pairs, kept branch first.
pub struct FastaBubbleWriter<W: Write> {
    inner: W,
}

impl<W: Write> FastaBubbleWriter<W> {
    pub fn new(inner: W) -> FastaBubbleWriter<W> {
        FastaBubbleWriter { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> BubbleSink for FastaBubbleWriter<W> {
    fn record(&mut self, b: &BubbleRecord) -> io::Result<()> {
        writeln!(
            self.inner,
            ">bubble{}/kept mean={:.1} len={}",
            b.id,
            b.kept_mean,
            b.kept.len()
        )?;
        writeln!(self.inner, "{}", b.kept)?;
        writeln!(
            self.inner,
            ">bubble{}/popped mean={:.1} len={} dlen={}",
            b.id,
            b.popped_mean,
            b.popped.len(),
            b.len_diff
        )?;
        writeln!(self.inner, "{}", b.popped)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(input: &str) -> Vec<SequenceRecord> {
        let mut reader = FastaReader::new(input.as_bytes());
        let mut out = Vec::new();
        while let Some(rec) = reader.next_record().unwrap() {
            out.push(rec);
        }
        out
    }

    #[test]
    fn parses_multi_line_records() {
        let recs = read_all(">r1 description here\nACGT\nACGT\n>r2\nTTTT\n");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].id, "r1");
        assert_eq!(recs[0].seq, b"ACGTACGT");
        assert_eq!(recs[1].id, "r2");
        assert_eq!(recs[1].seq, b"TTTT");
        assert_eq!(recs[1].qual, None);
    }

    #[test]
    fn tolerates_blank_lines_and_missing_trailing_newline() {
        let recs = read_all("\n>r1\nAC\nGT\n\n>r2\nGG");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].seq, b"ACGT");
        assert_eq!(recs[1].seq, b"GG");
    }

    #[test]
    fn empty_input_yields_no_records() {
        assert!(read_all("").is_empty());
    }

    #[test]
    fn contig_writer_wraps_and_labels() {
        let mut w = FastaContigWriter::new(Vec::new());
        let long = "A".repeat(70);
        w.write_contig(ContigRecord {
            id: 3,
            seq: long.clone(),
            coverage: 42,
        })
        .unwrap();
        let text = String::from_utf8(w.into_inner()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(">3 70 42"));
        assert_eq!(lines.next().map(str::len), Some(60));
        assert_eq!(lines.next().map(str::len), Some(10));
        assert_eq!(lines.next(), None);
    }
}
