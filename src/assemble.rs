//! The phase scheduler: one assembly pass at a fixed k, plus the multi-k
//! sweep that chains passes together.
//!
//! Control flow per pass: load -> compact -> histogram -> build adjacency ->
//! erode -> trim -> [low-coverage filter, then re-erode] -> pop bubbles ->
//! walk contigs. Configuration and thresholds are resolved up front and
//! read-only afterwards; the vertex store is the only shared mutable state.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::clean::{erode, erode_stranded, filter_low_coverage, pop_bubbles, trim};
use crate::coverage::Histogram;
use crate::error::{Error, Result};
use crate::graph::{build_adjacency, mark_ambiguous};
use crate::io::{
    BubbleSink, ContigSink, MemoryContigSink, MemorySource, SequenceRecord, SequenceSource,
    write_dot,
};
use crate::kmer::{MAX_K, MIN_K};
use crate::store::KmerStore;
use crate::walk::walk_contigs;

/// Cooperative cancellation, checked between phases and between scans
/// within a phase. Cancelling mid-phase leaves the store consistent but
/// partially processed; the caller must discard it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How the erosion threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErodeSetting {
    /// Derive it from the multiplicity histogram's first valley.
    #[default]
    Auto,
    /// Never erode.
    Off,
    /// Fixed coverage threshold.
    Coverage(u32),
}

impl FromStr for ErodeSetting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<ErodeSetting, String> {
        match s {
            "auto" => Ok(ErodeSetting::Auto),
            "off" | "inf" | "∞" => Ok(ErodeSetting::Off),
            _ => s
                .parse::<u32>()
                .map(ErodeSetting::Coverage)
                .map_err(|_| format!("`{s}` is not a coverage threshold, `auto`, or `off`")),
        }
    }
}

/// Knobs for one assembly pass. Fixed for the duration of the pass.
#[derive(Debug, Clone)]
pub struct AssemblyParams {
    /// K-mer length, in [MIN_K, MAX_K].
    pub k: usize,
    pub erode: ErodeSetting,
    /// Per-strand erosion threshold; None skips the stranded pass.
    pub erode_strand: Option<u32>,
    /// Mean-coverage cutoff for whole-path removal; zero or negative
    /// disables the filter.
    pub coverage: f64,
    /// Dead-end branch bound; defaults to k.
    pub trim_len: Option<usize>,
    /// Bubble branch bound; defaults to 3k, zero disables popping.
    pub bubble_len: Option<usize>,
}

impl AssemblyParams {
    pub fn new(k: usize) -> AssemblyParams {
        AssemblyParams {
            k,
            erode: ErodeSetting::Auto,
            erode_strand: None,
            coverage: 0.0,
            trim_len: None,
            bubble_len: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_K..=MAX_K).contains(&self.k) {
            return Err(Error::ConfigInvalid(format!(
                "k = {} must be between {MIN_K} and {MAX_K}",
                self.k
            )));
        }
        if !self.coverage.is_finite() {
            return Err(Error::ConfigInvalid(
                "coverage cutoff must be finite".to_string(),
            ));
        }
        if self.trim_len == Some(0) {
            return Err(Error::ConfigInvalid(
                "trim length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn trim_len(&self) -> usize {
        self.trim_len.unwrap_or(self.k)
    }

    fn bubble_len(&self) -> usize {
        self.bubble_len.unwrap_or(3 * self.k)
    }
}

/// Per-phase observer. Replaces the source-era statistics database with a
/// seam the caller can point anywhere.
pub trait TelemetrySink: Send + Sync {
    fn phase_done(&self, phase: &str, removed: u64, remaining: u64);
}

/// Default telemetry: one tracing line per phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn phase_done(&self, phase: &str, removed: u64, remaining: u64) {
        info!(phase, removed, remaining, "phase complete");
    }
}

/// Run-wide state threaded through every phase.
#[derive(Clone)]
pub struct AssemblyContext {
    pub cancel: CancelToken,
    pub telemetry: Arc<dyn TelemetrySink>,
}

impl Default for AssemblyContext {
    fn default() -> AssemblyContext {
        AssemblyContext {
            cancel: CancelToken::new(),
            telemetry: Arc::new(LogTelemetry),
        }
    }
}

/// Output seams for one pass.
pub struct AssemblySinks<'a> {
    pub contigs: &'a mut dyn ContigSink,
    pub bubbles: Option<&'a mut dyn BubbleSink>,
    /// Optional DOT dump of the graph as it stands before the contig walk.
    pub graph: Option<&'a mut dyn std::io::Write>,
}

/// Machine-readable summary of one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssemblyReport {
    pub k: usize,
    pub reads: u64,
    pub kmers_loaded: u64,
    pub kmers_skipped: u64,
    /// Distinct vertices right after load.
    pub vertices: u64,
    pub erosion_threshold: Option<u32>,
    pub eroded: u64,
    pub trimmed: u64,
    pub filtered: u64,
    pub bubbles_popped: u64,
    pub contigs: u64,
    pub contig_bases: u64,
    pub surviving: u64,
    pub removed: u64,
    /// 10*log10(surviving/removed); None when nothing was removed.
    pub snr_db: Option<f64>,
}

/// One complete assembly pass.
pub fn assemble(
    params: &AssemblyParams,
    source: &mut dyn SequenceSource,
    sinks: AssemblySinks<'_>,
    ctx: &AssemblyContext,
) -> Result<AssemblyReport> {
    params.validate()?;
    let mut report = AssemblyReport {
        k: params.k,
        ..AssemblyReport::default()
    };
    let store = KmerStore::new(params.k);

    load(&store, source, ctx, &mut report)?;
    if store.is_empty() {
        return Err(Error::InputUnusable);
    }
    store.cleanup();
    report.vertices = store.live_len() as u64;
    info!(
        reads = report.reads,
        kmers = report.kmers_loaded,
        skipped = report.kmers_skipped,
        vertices = report.vertices,
        "loaded input"
    );
    ctx.telemetry.phase_done("load", 0, report.vertices);

    let histogram = Histogram::from_store(&store);
    report.erosion_threshold = match params.erode {
        ErodeSetting::Off => None,
        ErodeSetting::Coverage(c) => Some(c),
        ErodeSetting::Auto => histogram.first_minimum(),
    };

    build_adjacency(&store);
    ctx.cancel.checkpoint()?;

    if let Some(threshold) = report.erosion_threshold {
        report.eroded = erode(&store, threshold, &ctx.cancel)? as u64;
        // The eroder must be at its fixed point here; anything else is a
        // convergence bug, not a recoverable condition.
        let again = erode(&store, threshold, &ctx.cancel)?;
        assert_eq!(again, 0, "eroder removed {again} vertices after reaching its fixed point");
    }
    if let Some(strand) = params.erode_strand {
        report.eroded += erode_stranded(&store, strand, &ctx.cancel)? as u64;
    }
    ctx.telemetry
        .phase_done("erode", report.eroded, store.live_len() as u64);

    report.trimmed = trim(&store, params.trim_len(), &ctx.cancel)? as u64;
    ctx.telemetry
        .phase_done("trim", report.trimmed, store.live_len() as u64);

    if params.coverage > 0.0 {
        report.filtered = filter_low_coverage(&store, params.coverage, &ctx.cancel)? as u64;
        // Path removal exposes fresh weak tips; erosion re-enters once.
        if let Some(threshold) = report.erosion_threshold {
            report.eroded += erode(&store, threshold, &ctx.cancel)? as u64;
        }
        ctx.telemetry
            .phase_done("filter", report.filtered, store.live_len() as u64);
    }

    if params.bubble_len() > 0 {
        report.bubbles_popped =
            pop_bubbles(&store, params.bubble_len(), sinks.bubbles, &ctx.cancel)? as u64;
        ctx.telemetry
            .phase_done("bubble", report.bubbles_popped, store.live_len() as u64);
    }

    store.clear_marks();
    mark_ambiguous(&store);
    if let Some(w) = sinks.graph {
        write_dot(&store, w)?;
    }
    ctx.cancel.checkpoint()?;

    let summary = walk_contigs(&store, sinks.contigs, &ctx.cancel)?;
    report.contigs = summary.contigs;
    report.contig_bases = summary.bases;
    report.surviving = store.live_len() as u64;
    report.removed = report.vertices - report.surviving;
    report.snr_db = if report.removed > 0 && report.surviving > 0 {
        Some(10.0 * (report.surviving as f64 / report.removed as f64).log10())
    } else {
        None
    };
    ctx.telemetry.phase_done("walk", 0, report.contigs);
    info!(
        contigs = report.contigs,
        bases = report.contig_bases,
        snr_db = report.snr_db,
        "assembly complete"
    );
    Ok(report)
}

const LOAD_BATCH: usize = 1024;

/// Pull reads in batches and chop them into the store from the rayon pool.
fn load(
    store: &KmerStore,
    source: &mut dyn SequenceSource,
    ctx: &AssemblyContext,
    report: &mut AssemblyReport,
) -> Result<()> {
    let codec = store.codec();
    let loaded = AtomicU64::new(0);
    let skipped = AtomicU64::new(0);
    loop {
        ctx.cancel.checkpoint()?;
        let mut batch = Vec::with_capacity(LOAD_BATCH);
        while batch.len() < LOAD_BATCH {
            match source.next_record()? {
                Some(rec) => batch.push(rec),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }
        report.reads += batch.len() as u64;
        batch.par_iter().for_each(|rec| {
            let mut added = 0u64;
            for w in codec.windows(&rec.seq) {
                store.add(w);
                added += 1;
            }
            let windows = (rec.seq.len() + 1).saturating_sub(codec.k()) as u64;
            loaded.fetch_add(added, Ordering::Relaxed);
            skipped.fetch_add(windows - added, Ordering::Relaxed);
        });
        if batch.len() < LOAD_BATCH {
            break;
        }
    }
    report.kmers_loaded = loaded.load(Ordering::Relaxed);
    report.kmers_skipped = skipped.load(Ordering::Relaxed);
    Ok(())
}

/// Multi-k sweep: run the whole pass at each k in turn, feeding every
/// iteration's contigs forward as additional reads. Only the final
/// iteration writes to the caller's sinks. The engine itself is stateless
/// between iterations.
pub fn sweep(
    ks: &[usize],
    base: &AssemblyParams,
    reads: Vec<SequenceRecord>,
    sinks: AssemblySinks<'_>,
    ctx: &AssemblyContext,
) -> Result<Vec<AssemblyReport>> {
    let Some((&final_k, ramp)) = ks.split_last() else {
        return Err(Error::ConfigInvalid(
            "sweep needs at least one k value".to_string(),
        ));
    };

    let mut reports = Vec::with_capacity(ks.len());
    let mut carried: Vec<SequenceRecord> = Vec::new();
    for &k in ramp {
        let mut params = base.clone();
        params.k = k;
        let mut source = MemorySource::new(reads.iter().chain(carried.iter()).cloned());
        let mut mem = MemoryContigSink::default();
        let report = assemble(
            &params,
            &mut source,
            AssemblySinks {
                contigs: &mut mem,
                bubbles: None,
                graph: None,
            },
            ctx,
        )?;
        info!(k, contigs = report.contigs, "sweep iteration complete");
        carried = mem
            .contigs
            .into_iter()
            .map(|c| SequenceRecord {
                id: format!("k{}_contig{}", k, c.id),
                seq: c.seq.into_bytes(),
                qual: None,
            })
            .collect();
        reports.push(report);
    }

    let mut params = base.clone();
    params.k = final_k;
    let mut source = MemorySource::new(reads.iter().chain(carried.iter()).cloned());
    reports.push(assemble(&params, &mut source, sinks, ctx)?);
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryContigSink;

    #[test]
    fn params_validation() {
        assert!(AssemblyParams::new(3).validate().is_ok());
        assert!(AssemblyParams::new(31).validate().is_ok());
        assert!(matches!(
            AssemblyParams::new(2).validate(),
            Err(Error::ConfigInvalid(_))
        ));
        assert!(matches!(
            AssemblyParams::new(32).validate(),
            Err(Error::ConfigInvalid(_))
        ));

        let mut p = AssemblyParams::new(21);
        p.trim_len = Some(0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn erode_setting_parses() {
        assert_eq!("auto".parse::<ErodeSetting>(), Ok(ErodeSetting::Auto));
        assert_eq!("off".parse::<ErodeSetting>(), Ok(ErodeSetting::Off));
        assert_eq!("inf".parse::<ErodeSetting>(), Ok(ErodeSetting::Off));
        assert_eq!("∞".parse::<ErodeSetting>(), Ok(ErodeSetting::Off));
        assert_eq!("4".parse::<ErodeSetting>(), Ok(ErodeSetting::Coverage(4)));
        assert!("nope".parse::<ErodeSetting>().is_err());
    }

    #[test]
    fn empty_input_is_unusable() {
        let params = AssemblyParams::new(3);
        let mut source = MemorySource::default();
        let mut sink = MemoryContigSink::default();
        let ctx = AssemblyContext::default();
        let got = assemble(
            &params,
            &mut source,
            AssemblySinks {
                contigs: &mut sink,
                bubbles: None,
                graph: None,
            },
            &ctx,
        );
        assert!(matches!(got, Err(Error::InputUnusable)));
    }

    #[test]
    fn cancellation_surfaces() {
        let params = AssemblyParams::new(3);
        let mut source = MemorySource::from_seqs(&[b"AATCAGGC"]);
        let mut sink = MemoryContigSink::default();
        let ctx = AssemblyContext::default();
        ctx.cancel.cancel();
        let got = assemble(
            &params,
            &mut source,
            AssemblySinks {
                contigs: &mut sink,
                bubbles: None,
                graph: None,
            },
            &ctx,
        );
        assert!(matches!(got, Err(Error::Cancelled)));
    }
}
