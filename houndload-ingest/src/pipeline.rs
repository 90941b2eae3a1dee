use std::{path::Path, sync::Arc};

use anyhow::{Context as _, Result};
use futures_util::StreamExt as _;
use houndload_core::{FileMetadata, GraphSession, GraphStore, RecordMapper, SourceFile};

use crate::{
    BatchUploader, FormatSniffer, IngestConfig, RecordSource, SniffError, UploadOutcome,
    mappers::BloodHoundMapper,
};

/// Totals for a single file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub records: usize,
    pub batches: usize,
    /// Non-empty units handed to the uploader
    pub units: usize,
    pub chunks_written: usize,
    pub chunks_failed: usize,
    pub rows_written: usize,
}

impl IngestReport {
    pub fn has_failures(&self) -> bool {
        self.chunks_failed > 0
    }

    fn record_upload(&mut self, outcome: UploadOutcome) {
        self.chunks_written += outcome.chunks_written;
        self.chunks_failed += outcome.chunks_failed;
        self.rows_written += outcome.rows_written;
    }
}

/// Ingests one validated export file into a graph store.
///
/// Records are read in batches, each batch is mapped into upload units, and every unit is written
/// chunk by chunk before the next batch is read. One session is used for the whole file and is
/// always released, whatever the outcome.
#[derive(Debug)]
pub struct Pipeline {
    file: SourceFile,
    metadata: FileMetadata,
    storage: Option<Arc<dyn GraphStore>>,
    mapper: Arc<dyn RecordMapper>,
    config: IngestConfig,
}

impl Pipeline {
    /// Creates a pipeline for a file whose metadata is already known
    pub fn from_file(file: SourceFile, metadata: FileMetadata) -> Self {
        Self {
            file,
            metadata,
            storage: None,
            mapper: Arc::new(BloodHoundMapper),
            config: IngestConfig::default(),
        }
    }

    /// Stats, sniffs and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// Errors if the file cannot be read or is not a supported export.
    pub fn from_path(path: impl AsRef<Path>, config: &IngestConfig) -> Result<Self, SniffError> {
        let file = SourceFile::open(path)?;
        let metadata = FormatSniffer::from_config(config).check(&file)?;

        Ok(Self::from_file(file, metadata).with_config(*config))
    }

    #[must_use]
    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_record_batch_size(mut self, batch_size: usize) -> Self {
        self.config.record_batch_size = batch_size;
        self
    }

    /// Replaces the default [`BloodHoundMapper`]
    #[must_use]
    pub fn with_mapper(mut self, mapper: impl RecordMapper + 'static) -> Self {
        self.mapper = Arc::new(mapper);
        self
    }

    /// Sets the graph store the file is ingested into
    #[must_use]
    pub fn then_store_with(mut self, storage: impl GraphStore + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Runs the pipeline to completion.
    ///
    /// Write failures are logged and counted in the report. They never fail the run.
    ///
    /// # Errors
    ///
    /// Errors if no store is configured, no session can be opened, or the file cannot be parsed.
    /// Chunks written before a parse error stay written.
    #[tracing::instrument(skip_all, fields(path = %self.file.path.display(), record_type = %self.metadata.record_type), name = "ingest_pipeline.run")]
    pub async fn run(self) -> Result<IngestReport> {
        let Some(storage) = self.storage.clone() else {
            anyhow::bail!("No storage configured for ingest pipeline");
        };

        tracing::info!(
            "Processing {} with {} {} entries",
            self.file.path.display(),
            self.metadata.count,
            self.metadata.record_type
        );
        let now = std::time::Instant::now();

        let mut session = storage
            .session()
            .await
            .context("Failed to open graph session")?;

        let result = self.drive(session.as_ref()).await;

        if let Err(err) = session.close().await {
            tracing::warn!(error = %err, "Failed to close graph session");
        }

        let report = result?;
        let elapsed_in_seconds = now.elapsed().as_secs();
        if report.has_failures() {
            tracing::warn!(
                elapsed_in_seconds,
                chunks_failed = report.chunks_failed,
                chunks_written = report.chunks_written,
                "Processed {} records with {} failed chunks",
                report.records,
                report.chunks_failed
            );
        } else {
            tracing::info!(
                elapsed_in_seconds,
                chunks_written = report.chunks_written,
                "Processed {} records",
                report.records
            );
        }

        Ok(report)
    }

    async fn drive(&self, session: &dyn GraphSession) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let uploader = BatchUploader::new(self.config.chunk_size);
        let mut records = std::pin::pin!(
            RecordSource::new(&self.file.path)
                .with_batch_size(self.config.record_batch_size)
                .into_stream()
                .into_batches()
        );

        while let Some(batch) = records.next().await {
            let batch = batch.with_context(|| {
                format!("Failed to read records from {}", self.file.path.display())
            })?;

            report.batches += 1;
            report.records += batch.len();
            tracing::info!(
                "Processed {} of {} {} records",
                report.records,
                self.metadata.count,
                self.metadata.record_type
            );

            let mapped = self.mapper.map(self.metadata.record_type, batch);
            for (group, units) in mapped.into_groups() {
                tracing::debug!(%group, units = units.len(), "Uploading unit group");
                for (name, unit) in units {
                    if unit.is_empty() {
                        continue;
                    }
                    report.units += 1;
                    report.record_upload(uploader.upload(session, &name, unit).await);
                }
            }
        }

        Ok(report)
    }
}
