//! Fixed-length DNA words packed two bits per base into a `u64`.
//!
//! The first (leftmost) base of the word sits in the most significant
//! occupied bit pair, so comparing the packed integers is the same as
//! comparing the decoded strings lexicographically. All storage keys are
//! canonical: the smaller of a word and its reverse complement.

use std::fmt;

/// Smallest supported k-mer length.
pub const MIN_K: usize = 3;
/// Largest k-mer length that packs into a single 64-bit word.
pub const MAX_K: usize = 31;

/// Two-bit base codes: A=0, C=1, G=2, T=3.
pub const BASE_A: u8 = 0;
pub const BASE_C: u8 = 1;
pub const BASE_G: u8 = 2;
pub const BASE_T: u8 = 3;

const INVALID: u8 = 0xff;

/// ASCII -> 2-bit lookup; everything outside acgtACGT maps to INVALID.
static BASE_CODES: [u8; 256] = {
    let mut t = [INVALID; 256];
    t[b'A' as usize] = BASE_A;
    t[b'a' as usize] = BASE_A;
    t[b'C' as usize] = BASE_C;
    t[b'c' as usize] = BASE_C;
    t[b'G' as usize] = BASE_G;
    t[b'g' as usize] = BASE_G;
    t[b'T' as usize] = BASE_T;
    t[b't' as usize] = BASE_T;
    t
};

#[inline]
pub fn base_code(b: u8) -> Option<u8> {
    match BASE_CODES[b as usize] {
        INVALID => None,
        c => Some(c),
    }
}

#[inline]
pub fn code_to_base(c: u8) -> u8 {
    match c & 3 {
        BASE_A => b'A',
        BASE_C => b'C',
        BASE_G => b'G',
        _ => b'T',
    }
}

/// Complement of a 2-bit base code (A<->T, C<->G).
#[inline]
pub fn complement(c: u8) -> u8 {
    (!c) & 3
}

/// Strand of a stored word, doubling as an edge direction: `Sense` extends
/// the canonical word to the right, `Antisense` extends its reverse
/// complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dir {
    Sense,
    Antisense,
}

impl Dir {
    pub const BOTH: [Dir; 2] = [Dir::Sense, Dir::Antisense];

    #[inline]
    pub fn opposite(self) -> Dir {
        match self {
            Dir::Sense => Dir::Antisense,
            Dir::Antisense => Dir::Sense,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Dir::Sense => 0,
            Dir::Antisense => 1,
        }
    }
}

/// A packed k-mer. Meaningful only together with the [`KmerCodec`] that
/// produced it, which knows `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Kmer(pub u64);

impl fmt::Display for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Encoder/decoder for one fixed `k`. Copy-cheap; no state beyond `k` and
/// the derived mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerCodec {
    k: usize,
    mask: u64,
}

impl KmerCodec {
    /// Panics if `k` is outside [MIN_K, MAX_K]; callers validate first.
    pub fn new(k: usize) -> KmerCodec {
        assert!(
            (MIN_K..=MAX_K).contains(&k),
            "k = {k} outside supported range [{MIN_K}, {MAX_K}]"
        );
        KmerCodec {
            k,
            mask: (1u64 << (2 * k)) - 1,
        }
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Pack the first `k` bytes of `seq`; None if too short or any base is
    /// not ACGT.
    pub fn encode(&self, seq: &[u8]) -> Option<Kmer> {
        if seq.len() < self.k {
            return None;
        }
        let mut word = 0u64;
        for &b in &seq[..self.k] {
            word = (word << 2) | base_code(b)? as u64;
        }
        Some(Kmer(word))
    }

    pub fn decode(&self, kmer: Kmer) -> String {
        let mut out = String::with_capacity(self.k);
        for i in (0..self.k).rev() {
            out.push(code_to_base((kmer.0 >> (2 * i)) as u8) as char);
        }
        out
    }

    /// Drop the leftmost base, append `base` on the right.
    #[inline]
    pub fn shift_left(&self, kmer: Kmer, base: u8) -> Kmer {
        Kmer(((kmer.0 << 2) | (base & 3) as u64) & self.mask)
    }

    /// Drop the rightmost base, prepend `base` on the left.
    #[inline]
    pub fn shift_right(&self, kmer: Kmer, base: u8) -> Kmer {
        Kmer((kmer.0 >> 2) | (((base & 3) as u64) << (2 * (self.k - 1))))
    }

    #[inline]
    pub fn first_base(&self, kmer: Kmer) -> u8 {
        ((kmer.0 >> (2 * (self.k - 1))) & 3) as u8
    }

    #[inline]
    pub fn last_base(&self, kmer: Kmer) -> u8 {
        (kmer.0 & 3) as u8
    }

    pub fn reverse_complement(&self, kmer: Kmer) -> Kmer {
        // Complement every 2-bit group, reverse group order across the full
        // word, then align the k live groups back into the low bits.
        let mut x = !kmer.0;
        x = ((x >> 2) & 0x3333_3333_3333_3333) | ((x & 0x3333_3333_3333_3333) << 2);
        x = ((x >> 4) & 0x0f0f_0f0f_0f0f_0f0f) | ((x & 0x0f0f_0f0f_0f0f_0f0f) << 4);
        x = x.swap_bytes();
        Kmer(x >> (64 - 2 * self.k))
    }

    /// The lexicographically smaller of a word and its reverse complement,
    /// plus the strand the input sat on. Palindromic words report `Sense`.
    #[inline]
    pub fn canonical(&self, kmer: Kmer) -> (Kmer, Dir) {
        let rc = self.reverse_complement(kmer);
        if kmer <= rc { (kmer, Dir::Sense) } else { (rc, Dir::Antisense) }
    }

    #[inline]
    pub fn is_palindrome(&self, kmer: Kmer) -> bool {
        self.reverse_complement(kmer) == kmer
    }

    /// The word whose successors lie in direction `dir` from a canonical key.
    #[inline]
    pub fn oriented(&self, kmer: Kmer, dir: Dir) -> Kmer {
        match dir {
            Dir::Sense => kmer,
            Dir::Antisense => self.reverse_complement(kmer),
        }
    }

    /// The four single-base extensions of `kmer` in `dir`, uncanonicalized.
    pub fn neighbors(&self, kmer: Kmer, dir: Dir) -> [(u8, Kmer); 4] {
        let word = self.oriented(kmer, dir);
        [0, 1, 2, 3].map(|b| (b, self.shift_left(word, b)))
    }

    /// Iterator over every ACGT-only window of `seq` as a packed forward
    /// word. Windows touching an invalid base are skipped.
    pub fn windows<'a>(&self, seq: &'a [u8]) -> KmerWindows<'a> {
        KmerWindows {
            codec: *self,
            seq,
            pos: 0,
            word: 0,
            valid: 0,
        }
    }
}

/// Rolling scan over a read; yields one packed word per valid window.
pub struct KmerWindows<'a> {
    codec: KmerCodec,
    seq: &'a [u8],
    pos: usize,
    word: u64,
    valid: usize,
}

impl Iterator for KmerWindows<'_> {
    type Item = Kmer;

    fn next(&mut self) -> Option<Kmer> {
        while self.pos < self.seq.len() {
            let b = self.seq[self.pos];
            self.pos += 1;
            match base_code(b) {
                None => {
                    self.valid = 0;
                    self.word = 0;
                }
                Some(code) => {
                    self.word = ((self.word << 2) | code as u64) & self.codec.mask;
                    self.valid += 1;
                    if self.valid >= self.codec.k {
                        return Some(Kmer(self.word));
                    }
                }
            }
        }
        None
    }
}
