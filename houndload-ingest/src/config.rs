//! Tunables for ingesting a single export file
use derive_builder::Builder;

/// Rows per write chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Records handed from the parser to the coordinator at a time
pub const DEFAULT_RECORD_BATCH_SIZE: usize = 200;
/// Bytes inspected at either end of a file for its metadata
pub const DEFAULT_SNIFF_WINDOW: u64 = 300;
/// Oldest export format version that is accepted
pub const DEFAULT_MIN_VERSION: u64 = 4;

/// Configuration for ingesting an export file.
///
/// ```
/// # use houndload_ingest::IngestConfig;
/// let config = IngestConfig::builder().chunk_size(500_usize).build().unwrap();
///
/// assert_eq!(config.chunk_size, 500);
/// assert_eq!(config.record_batch_size, 200);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Builder)]
#[builder(pattern = "owned", setter(into), build_fn(error = "anyhow::Error"))]
pub struct IngestConfig {
    /// Maximum rows per write chunk. Zero is treated as one.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Maximum records per parsed batch. Zero is treated as one.
    #[builder(default = "DEFAULT_RECORD_BATCH_SIZE")]
    pub record_batch_size: usize,

    #[builder(default = "DEFAULT_SNIFF_WINDOW")]
    pub sniff_window: u64,

    #[builder(default = "DEFAULT_MIN_VERSION")]
    pub min_version: u64,
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            record_batch_size: DEFAULT_RECORD_BATCH_SIZE,
            sniff_window: DEFAULT_SNIFF_WINDOW,
            min_version: DEFAULT_MIN_VERSION,
        }
    }
}
