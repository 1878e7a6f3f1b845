use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info};

use smelt::io::{
    BubbleSink, ChainSource, FastaBubbleWriter, FastaContigWriter, FastaReader, FastqReader,
    SequenceRecord, SequenceSource, SpooledContigSink,
};
use smelt::{AssemblyContext, AssemblySinks, assemble, sweep};

mod smelt_commands;
use smelt_commands::*;

/// Assembling short DNA reads into contigs over a de Bruijn graph
#[derive(Debug, Parser)]
#[command(author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// be quiet (warnings and errors only)
    #[arg(short, long)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Assemble reads at a single k
    #[command(arg_required_else_help = true)]
    Assemble(AssembleOpts),

    /// Assemble over a ladder of k values, feeding contigs forward
    #[command(arg_required_else_help = true)]
    Sweep(SweepOpts),
}

fn main() -> Result<(), anyhow::Error> {
    let cli_args = Cli::parse();

    let quiet = cli_args.quiet;
    if quiet {
        tracing_subscriber::fmt()
            .with_max_level(Level::WARN)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_writer(io::stderr)
            .init();
    }

    let ncpus = num_cpus::get();

    match cli_args.command {
        Commands::Assemble(opts) => {
            check_threads(opts.threads, ncpus)?;
            rayon::ThreadPoolBuilder::new()
                .num_threads(opts.threads)
                .build_global()?;
            info!("starting smelt assemble");

            let params = opts.params();
            let mut source = open_sources(&opts.inputs)?;

            let mut contig_writer = SpooledContigSink::new(
                FastaContigWriter::new(BufWriter::new(create_output(&opts.output)?)),
                DefaultParams::CHANNEL_DEPTH,
            );
            let mut bubble_writer = match &opts.bubbles {
                Some(path) => Some(FastaBubbleWriter::new(BufWriter::new(create_output(
                    path,
                )?))),
                None => None,
            };
            let mut graph_writer = match &opts.graph {
                Some(path) => Some(BufWriter::new(create_output(path)?)),
                None => None,
            };

            let ctx = AssemblyContext::default();
            let report = assemble(
                &params,
                &mut source,
                AssemblySinks {
                    contigs: &mut contig_writer,
                    bubbles: bubble_writer
                        .as_mut()
                        .map(|b| b as &mut dyn BubbleSink),
                    graph: graph_writer.as_mut().map(|g| g as &mut dyn io::Write),
                },
                &ctx,
            )?;
            contig_writer
                .finish()
                .map_err(|source| smelt::Error::OutputUnwritable {
                    path: opts.output.clone(),
                    source,
                })?;
            if let Some(mut b) = bubble_writer.map(FastaBubbleWriter::into_inner) {
                b.flush().context("flushing bubble output")?;
            }
            if let Some(mut g) = graph_writer {
                g.flush().context("flushing graph output")?;
            }

            if let Some(path) = &opts.report {
                write_json(path, &report)?;
            }
            info!("smelt assemble finished");
        }

        Commands::Sweep(opts) => {
            check_threads(opts.threads, ncpus)?;
            rayon::ThreadPoolBuilder::new()
                .num_threads(opts.threads)
                .build_global()?;
            info!(klens = ?opts.klens, "starting smelt sweep");

            // The sweep replays the read set once per k, so it is held in
            // memory for the duration.
            let mut source = open_sources(&opts.inputs)?;
            let mut reads: Vec<SequenceRecord> = Vec::new();
            while let Some(rec) = source.next_record()? {
                reads.push(rec);
            }

            let mut contig_writer = SpooledContigSink::new(
                FastaContigWriter::new(BufWriter::new(create_output(&opts.output)?)),
                DefaultParams::CHANNEL_DEPTH,
            );
            let ctx = AssemblyContext::default();
            let reports = sweep(
                &opts.klens,
                &opts.params(),
                reads,
                AssemblySinks {
                    contigs: &mut contig_writer,
                    bubbles: None,
                    graph: None,
                },
                &ctx,
            )?;
            contig_writer
                .finish()
                .map_err(|source| smelt::Error::OutputUnwritable {
                    path: opts.output.clone(),
                    source,
                })?;

            if let Some(path) = &opts.report {
                write_json(path, &reports)?;
            }
            info!("smelt sweep finished");
        }
    }
    Ok(())
}

fn check_threads(threads: usize, ncpus: usize) -> Result<()> {
    if threads == 0 {
        bail!(
            "the number of provided threads ({}) must be greater than 0.",
            threads
        );
    }
    if threads > ncpus {
        bail!(
            "the number of provided threads ({}) should be <= the number of logical CPUs ({}).",
            threads,
            ncpus
        );
    }
    Ok(())
}

fn open_sources(inputs: &[PathBuf]) -> Result<ChainSource> {
    let mut sources: Vec<Box<dyn SequenceSource>> = Vec::new();
    for path in inputs {
        sources.push(open_reader(path)?);
    }
    Ok(ChainSource::new(sources))
}

fn open_reader(path: &Path) -> Result<Box<dyn SequenceSource>> {
    let file = File::open(path)
        .with_context(|| format!("cannot open input file {}", path.display()))?;
    let reader = BufReader::new(file);
    match path.extension().and_then(|e| e.to_str()) {
        Some("fa") | Some("fasta") | Some("fna") => Ok(Box::new(FastaReader::new(reader))),
        Some("fq") | Some("fastq") => Ok(Box::new(FastqReader::new(reader))),
        _ => bail!(
            "cannot tell the format of {} from its extension (expected .fa/.fasta/.fna or .fq/.fastq)",
            path.display()
        ),
    }
}

fn create_output(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("cannot create output directory {}", parent.display())
            })?;
            info!(
                "directory {} did not already exist; creating it.",
                parent.display()
            );
        }
    }
    File::create(path).with_context(|| format!("cannot create output file {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut w = BufWriter::new(create_output(path)?);
    serde_json::to_writer_pretty(&mut w, value)
        .with_context(|| format!("cannot write report to {}", path.display()))?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}
