#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Streaming ingestion of collector export files into a graph store.
//!
//! A file is sniffed for its metadata, its records are streamed in batches, every batch is mapped
//! into upload units, and the units are written in bounded chunks. See [`Pipeline`].
//!
//! # Example
//!
//! ```no_run
//! # use houndload_core::test_utils::RecordingGraph;
//! # use houndload_ingest::{IngestConfig, Pipeline};
//! # async fn run() -> anyhow::Result<()> {
//! Pipeline::from_path("20240101_computers.json", &IngestConfig::default())?
//!     .with_chunk_size(500)
//!     .then_store_with(RecordingGraph::new())
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod mappers;
mod pipeline;
pub mod schema;
pub mod sniffer;
pub mod source;
pub mod uploader;

pub use config::{IngestConfig, IngestConfigBuilder};
pub use pipeline::{IngestReport, Pipeline};
pub use schema::{Schema, SchemaReport};
pub use sniffer::{FormatSniffer, SniffError, SniffedMeta};
pub use source::{RecordSource, RecordStream, SourceError};
pub use uploader::{BatchUploader, UploadOutcome};
