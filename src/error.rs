use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of an assembly run.
///
/// I/O errors abort the phase that hit them; everything else is decided at a
/// phase boundary. Internal graph inconsistencies are not represented here at
/// all: those are programming errors and panic with a diagnostic.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The vertex store was empty after loading every input read.
    #[error("no usable sequence in input")]
    InputUnusable,

    /// The contig walker finished without emitting a single contig.
    #[error("assembly produced no contigs")]
    AssemblyEmpty,

    #[error("assembly cancelled")]
    Cancelled,

    #[error("cannot write {path}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
