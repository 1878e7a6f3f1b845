//! K-mer multiplicity histogram and the coverage thresholds derived from it.

use crate::store::KmerStore;

/// Multiplicities above this clamp into the last bin; real coverage peaks
/// sit far below it.
const MAX_BIN: usize = 1 << 16;

/// Histogram of vertex multiplicities. Built once after load, read-only
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    bins: Vec<u64>,
}

impl Histogram {
    pub fn from_store(store: &KmerStore) -> Histogram {
        let mut h = Histogram::default();
        store.each(|_, v| h.record(v.multiplicity()));
        h
    }

    pub fn record(&mut self, multiplicity: u32) {
        let m = (multiplicity as usize).min(MAX_BIN);
        if self.bins.len() <= m {
            self.bins.resize(m + 1, 0);
        }
        self.bins[m] += 1;
    }

    pub fn bin(&self, multiplicity: u32) -> u64 {
        self.bins.get(multiplicity as usize).copied().unwrap_or(0)
    }

    /// Total vertices recorded.
    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// The multiplicity of the first valley to the right of the
    /// low-multiplicity noise mode: descend from 1 while counts fall, stop
    /// where they rise again. A monotone histogram has no valley (no error
    /// mode is separable) and yields None, which disables erosion.
    pub fn first_minimum(&self) -> Option<u32> {
        if self.bins.len() < 3 {
            return None;
        }
        let mut m = 1;
        while m + 1 < self.bins.len() && self.bins[m + 1] <= self.bins[m] {
            m += 1;
        }
        if m + 1 >= self.bins.len() {
            None
        } else {
            Some(m as u32)
        }
    }
}
