//! Graph-cleaning transformations that make the de Bruijn graph tolerate
//! sequencing error: tip erosion, dead-end trimming, low-coverage path
//! removal, and bubble popping.
//!
//! Every pass follows the same discipline: read-only scans (parallel where
//! the work is wide enough) decide what dies, then removal and store
//! compaction run serially. Each pass converges and reports how many
//! vertices it took out.

pub mod bubble;
pub mod erode;
pub mod filter;
pub mod trim;

pub use bubble::pop_bubbles;
pub use erode::{erode, erode_stranded};
pub use filter::filter_low_coverage;
pub use trim::trim;
