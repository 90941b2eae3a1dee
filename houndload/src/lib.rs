#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Streaming ingestion of `SharpHound` and `AzureHound` exports into a property graph.
//!
//! An export file is sniffed for its type and version, its records are streamed and mapped into
//! upload units, and the units are written in bounded, independently committed chunks. Once every
//! file is loaded, a fixed list of idempotent post-processing steps derives the relationships the
//! collectors cannot observe directly.
//!
//! # Example
//!
//! ```no_run
//! # use houndload::{ingest::{IngestConfig, Pipeline}, integrations::neo4j::Neo4j, postprocess::PostProcessor};
//! # async fn run() -> anyhow::Result<()> {
//! let neo4j = Neo4j::try_from_env()?;
//!
//! Pipeline::from_path("20240101_users.json", &IngestConfig::default())?
//!     .then_store_with(neo4j.clone())
//!     .run()
//!     .await?;
//!
//! PostProcessor::new(neo4j).run().await?;
//! # Ok(())
//! # }
//! ```

mod command;

pub use command::{Command, Outcome, run};

/// Shared types and the graph store seam
pub mod core {
    #[doc(inline)]
    pub use houndload_core::*;
}

/// Sniffing, streaming, mapping and uploading export files
pub mod ingest {
    #[doc(inline)]
    pub use houndload_ingest::*;
}

/// Deriving relationships after every file is loaded
pub mod postprocess {
    #[doc(inline)]
    pub use houndload_postprocess::*;
}

/// Graph store integrations
pub mod integrations {
    #[doc(inline)]
    pub use houndload_integrations::*;
}
