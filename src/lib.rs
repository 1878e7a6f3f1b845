pub mod assemble;
pub mod clean;
pub mod coverage;
pub mod error;
pub mod graph;
pub mod io;
pub mod kmer;
pub mod store;
pub mod walk;

// Re-exports for convenience
pub use assemble::{
    AssemblyContext, AssemblyParams, AssemblyReport, AssemblySinks, CancelToken, ErodeSetting,
    LogTelemetry, TelemetrySink, assemble, sweep,
};
pub use coverage::Histogram;
pub use error::{Error, Result};
pub use graph::{Cursor, advance, build_adjacency, mark_ambiguous};
pub use kmer::{Dir, Kmer, KmerCodec, KmerWindows, MAX_K, MIN_K};
pub use store::{KmerStore, VertexData};
pub use walk::{WalkSummary, walk_contigs};
