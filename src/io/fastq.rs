//! Four-line FASTQ input.

use std::io::{self, BufRead};

use super::{SequenceRecord, SequenceSource};

pub struct FastqReader<R: BufRead> {
    inner: R,
    line: String,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(inner: R) -> FastqReader<R> {
        FastqReader {
            inner,
            line: String::new(),
        }
    }

    /// One line with the trailing newline removed; None at EOF.
    fn read_trimmed(&mut self) -> io::Result<Option<String>> {
        self.line.clear();
        if self.inner.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        Ok(Some(self.line.trim_end().to_string()))
    }
}

impl<R: BufRead> SequenceSource for FastqReader<R> {
    fn next_record(&mut self) -> io::Result<Option<SequenceRecord>> {
        let header = loop {
            match self.read_trimmed()? {
                None => return Ok(None),
                Some(l) if l.is_empty() => continue,
                Some(l) => break l,
            }
        };
        let Some(header) = header.strip_prefix('@') else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("FASTQ record header does not start with '@': {header:?}"),
            ));
        };
        let Some(seq) = self.read_trimmed()? else {
            return Err(truncated());
        };
        let Some(plus) = self.read_trimmed()? else {
            return Err(truncated());
        };
        if !plus.starts_with('+') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("FASTQ separator line does not start with '+': {plus:?}"),
            ));
        }
        let Some(qual) = self.read_trimmed()? else {
            return Err(truncated());
        };
        if qual.len() != seq.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "FASTQ quality length does not match sequence length",
            ));
        }

        let id = header.split_whitespace().next().unwrap_or("").to_string();
        Ok(Some(SequenceRecord {
            id,
            seq: seq.into_bytes(),
            qual: Some(qual.into_bytes()),
        }))
    }
}

fn truncated() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "truncated FASTQ record")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_with_qualities() {
        let input = "@r1 extra\nACGT\n+\nIIII\n@r2\nGG\n+r2\n##\n";
        let mut reader = FastqReader::new(input.as_bytes());

        let r1 = reader.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "r1");
        assert_eq!(r1.seq, b"ACGT");
        assert_eq!(r1.qual.as_deref(), Some(b"IIII".as_slice()));

        let r2 = reader.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "r2");
        assert_eq!(r2.qual.as_deref(), Some(b"##".as_slice()));

        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_records() {
        let mut bad_header = FastqReader::new("ACGT\nACGT\n+\nIIII\n".as_bytes());
        assert!(bad_header.next_record().is_err());

        let mut truncated = FastqReader::new("@r1\nACGT\n".as_bytes());
        assert!(truncated.next_record().is_err());

        let mut short_qual = FastqReader::new("@r1\nACGT\n+\nII\n".as_bytes());
        assert!(short_qual.next_record().is_err());
    }
}
