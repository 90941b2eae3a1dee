//! Writes upload units to the graph in bounded chunks
use std::ops::AddAssign;

use houndload_core::{
    GraphSession, Params, UploadUnit,
    util::{debug_long_utf8, single_line},
};

use crate::config::DEFAULT_CHUNK_SIZE;

/// What happened to the chunks of one or more units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    pub chunks_written: usize,
    pub chunks_failed: usize,
    pub rows_written: usize,
}

impl AddAssign for UploadOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.chunks_written += rhs.chunks_written;
        self.chunks_failed += rhs.chunks_failed;
        self.rows_written += rhs.rows_written;
    }
}

/// Uploads units chunk by chunk, strictly one chunk at a time.
///
/// A failing chunk is logged and skipped. It never stops later chunks or later units.
#[derive(Clone, Copy, Debug)]
pub struct BatchUploader {
    chunk_size: usize,
}

impl Default for BatchUploader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl BatchUploader {
    /// A `chunk_size` of zero is treated as one
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[tracing::instrument(skip_all, fields(unit = name, rows = unit.len()))]
    pub async fn upload(
        &self,
        session: &dyn GraphSession,
        name: &str,
        unit: UploadUnit,
    ) -> UploadOutcome {
        let mut outcome = UploadOutcome::default();
        if unit.is_empty() {
            return outcome;
        }

        let statement = unit.statement.clone();
        for (index, chunk) in unit.into_chunks(self.chunk_size).enumerate() {
            let rows = chunk.len();
            match session.run(&statement, &Params::props(chunk)).await {
                Ok(result) => {
                    outcome.chunks_written += 1;
                    outcome.rows_written += rows;
                    tracing::debug!(
                        chunk = index,
                        rows,
                        properties_set = result.counters.properties_set,
                        "Uploaded chunk"
                    );
                }
                Err(err) => {
                    outcome.chunks_failed += 1;
                    tracing::error!(
                        chunk = index,
                        rows,
                        statement = %debug_long_utf8(single_line(&statement), 200),
                        error = %err,
                        "Failed to upload chunk"
                    );
                }
            }
        }

        outcome
    }
}
