use anyhow::{Result, anyhow, bail};
use clap::Args;
use std::path::PathBuf;

use smelt::{AssemblyParams, ErodeSetting};
use smelt::kmer::{MAX_K, MIN_K};

pub(crate) trait DefaultAssemblyParams {
    const COVERAGE_CUTOFF: f64;
    const THREADS: usize;
    const CHANNEL_DEPTH: usize;
}

pub(crate) struct DefaultParams;

impl DefaultAssemblyParams for DefaultParams {
    const COVERAGE_CUTOFF: f64 = 0.0;
    const THREADS: usize = 16;
    const CHANNEL_DEPTH: usize = 1024;
}

fn klen_is_good(s: &str) -> Result<usize> {
    let k: usize = s
        .parse()
        .map_err(|_| anyhow!("`{s}` can't be parsed as a number"))?;
    if !(MIN_K..=MAX_K).contains(&k) {
        bail!("klen = {k} must be between {MIN_K} and {MAX_K}");
    }
    Ok(k)
}

#[derive(Args, Clone, Debug)]
#[command(arg_required_else_help = true)]
pub(crate) struct AssembleOpts {
    /// ',' separated list of input read files (.fa/.fasta/.fna or .fq/.fastq)
    #[arg(
        short = 'i',
        long,
        help_heading = "Input",
        value_delimiter = ',',
        required = true
    )]
    pub inputs: Vec<PathBuf>,

    /// length of k-mer to use; must be between 3 and 31
    #[arg(short, long, help_heading = "Assembly Parameters", value_parser = klen_is_good)]
    pub klen: usize,

    /// erosion coverage threshold: a number, `auto` (derive it from the
    /// multiplicity histogram), or `off`
    #[arg(long, help_heading = "Assembly Parameters", default_value = "auto")]
    pub erode: ErodeSetting,

    /// per-strand erosion threshold (skipped when absent)
    #[arg(long, help_heading = "Assembly Parameters")]
    pub erode_strand: Option<u32>,

    /// mean-coverage cutoff below which whole paths are removed; <= 0
    /// disables the filter
    #[arg(short, long, help_heading = "Assembly Parameters", default_value_t = DefaultParams::COVERAGE_CUTOFF)]
    pub coverage: f64,

    /// dead-end branch length bound (default: klen)
    #[arg(long, help_heading = "Assembly Parameters")]
    pub trim_len: Option<usize>,

    /// bubble branch length bound (default: 3 * klen); 0 disables popping
    #[arg(long, help_heading = "Assembly Parameters")]
    pub bubble_len: Option<usize>,

    /// number of threads to use
    #[arg(short, long, default_value_t = DefaultParams::THREADS)]
    pub threads: usize,

    /// contigs output path (FASTA)
    #[arg(short, long, help_heading = "Output")]
    pub output: PathBuf,

    /// popped-bubble output path (FASTA pairs)
    #[arg(long, help_heading = "Output")]
    pub bubbles: Option<PathBuf>,

    /// DOT dump of the cleaned graph
    #[arg(long, help_heading = "Output")]
    pub graph: Option<PathBuf>,

    /// machine-readable JSON run report
    #[arg(long, help_heading = "Output")]
    pub report: Option<PathBuf>,
}

impl AssembleOpts {
    pub(crate) fn params(&self) -> AssemblyParams {
        AssemblyParams {
            k: self.klen,
            erode: self.erode,
            erode_strand: self.erode_strand,
            coverage: self.coverage,
            trim_len: self.trim_len,
            bubble_len: self.bubble_len,
        }
    }
}

#[derive(Args, Clone, Debug)]
#[command(arg_required_else_help = true)]
pub(crate) struct SweepOpts {
    /// ',' separated list of input read files (.fa/.fasta/.fna or .fq/.fastq)
    #[arg(
        short = 'i',
        long,
        help_heading = "Input",
        value_delimiter = ',',
        required = true
    )]
    pub inputs: Vec<PathBuf>,

    /// ',' separated ladder of k-mer lengths, assembled in the given order
    #[arg(
        short,
        long,
        help_heading = "Assembly Parameters",
        value_delimiter = ',',
        value_parser = klen_is_good,
        required = true
    )]
    pub klens: Vec<usize>,

    /// erosion coverage threshold: a number, `auto`, or `off`
    #[arg(long, help_heading = "Assembly Parameters", default_value = "auto")]
    pub erode: ErodeSetting,

    /// per-strand erosion threshold (skipped when absent)
    #[arg(long, help_heading = "Assembly Parameters")]
    pub erode_strand: Option<u32>,

    /// mean-coverage cutoff below which whole paths are removed; <= 0
    /// disables the filter
    #[arg(short, long, help_heading = "Assembly Parameters", default_value_t = DefaultParams::COVERAGE_CUTOFF)]
    pub coverage: f64,

    /// dead-end branch length bound (default: the iteration's klen)
    #[arg(long, help_heading = "Assembly Parameters")]
    pub trim_len: Option<usize>,

    /// bubble branch length bound (default: 3 * klen); 0 disables popping
    #[arg(long, help_heading = "Assembly Parameters")]
    pub bubble_len: Option<usize>,

    /// number of threads to use
    #[arg(short, long, default_value_t = DefaultParams::THREADS)]
    pub threads: usize,

    /// contigs output path for the final iteration (FASTA)
    #[arg(short, long, help_heading = "Output")]
    pub output: PathBuf,

    /// machine-readable JSON report covering every iteration
    #[arg(long, help_heading = "Output")]
    pub report: Option<PathBuf>,
}

impl SweepOpts {
    /// Base parameters; the sweep substitutes each k in turn.
    pub(crate) fn params(&self) -> AssemblyParams {
        AssemblyParams {
            k: self.klens[0],
            erode: self.erode,
            erode_strand: self.erode_strand,
            coverage: self.coverage,
            trim_len: self.trim_len,
            bubble_len: self.bubble_len,
        }
    }
}
