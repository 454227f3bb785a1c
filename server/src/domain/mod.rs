//! Core analysis domain: graph reconstruction, issue detection, reasoning

pub mod analysis;
pub mod graph;
pub mod ingest;
pub mod issues;
pub mod reasoning;

pub use analysis::{AnalysisError, AnalysisService};
pub use ingest::{EnqueueError, IngestPipeline};
