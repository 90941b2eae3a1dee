//! The three operating modes of the `houndload` binary
use std::{path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{Context as _, Result};
use houndload_core::GraphStore;
use houndload_ingest::{IngestConfig, IngestReport, Pipeline, Schema, SchemaReport};
use houndload_postprocess::{PostProcessReport, PostProcessor};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create the unique constraints ingestion relies on
    Preprocess,
    /// Derive relationships over everything ingested so far
    Postprocess,
    /// Ingest a single export file
    Ingest(PathBuf),
}

impl FromStr for Command {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "preprocess" => Ok(Self::Preprocess),
            "postprocess" => Ok(Self::Postprocess),
            path if std::path::Path::new(path).is_file() => Ok(Self::Ingest(PathBuf::from(path))),
            other => Err(format!(
                "expected `preprocess`, `postprocess` or an export file, `{other}` is none of them"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Schema(SchemaReport),
    Ingest(IngestReport),
    PostProcess(PostProcessReport),
}

/// Runs `command` against `store`.
///
/// # Errors
///
/// Errors if the export file is invalid or cannot be parsed, or if the store cannot be reached.
/// Failed writes and failed post-processing steps are reported in the [`Outcome`] instead.
pub async fn run(
    command: &Command,
    store: Arc<dyn GraphStore>,
    config: &IngestConfig,
) -> Result<Outcome> {
    match command {
        Command::Preprocess => {
            tracing::info!("Setting schema");
            Ok(Outcome::Schema(Schema::default().apply(&store).await?))
        }
        Command::Postprocess => Ok(Outcome::PostProcess(PostProcessor::new(store).run().await?)),
        Command::Ingest(path) => {
            let pipeline = Pipeline::from_path(path, config)
                .with_context(|| format!("Invalid file {}", path.display()))?;

            Ok(Outcome::Ingest(pipeline.then_store_with(store).run().await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use houndload_core::test_utils::RecordingGraph;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("preprocess".parse::<Command>(), Ok(Command::Preprocess));
        assert_eq!("postprocess".parse::<Command>(), Ok(Command::Postprocess));
        assert!("/does/not/exist.json".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_existing_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("users.json");
        std::fs::write(&file, "{}").unwrap();

        assert_eq!(
            file.to_str().unwrap().parse::<Command>(),
            Ok(Command::Ingest(file.clone()))
        );
        assert!(dir.path().to_str().unwrap().parse::<Command>().is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_preprocess_sets_constraints() {
        let graph = RecordingGraph::new();

        let outcome = run(
            &Command::Preprocess,
            Arc::new(graph.clone()),
            &IngestConfig::default(),
        )
        .await
        .unwrap();

        let Outcome::Schema(report) = outcome else {
            panic!("expected a schema report, got {outcome:?}");
        };
        assert_eq!(report.failed, 0);
        assert!(graph.statements().iter().all(|s| s.starts_with("CREATE CONSTRAINT")));
        graph.assert_sessions_released();
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_file_fails_without_writes() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("old.json");
        std::fs::write(
            &file,
            r#"{"data":[],"meta":{"type":"users","count":0,"version":3}}"#,
        )
        .unwrap();
        let graph = RecordingGraph::new();

        let err = run(
            &Command::Ingest(file),
            Arc::new(graph.clone()),
            &IngestConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("Invalid file"), "{err:#}");
        assert!(graph.runs().is_empty());
        assert_eq!(graph.sessions_opened(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_ingest_valid_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("users.json");
        std::fs::write(
            &file,
            r#"{"data":[{"ObjectIdentifier":"S-1-5-21-1-1104","Properties":{"name":"ALICE@CORP.LOCAL"}},{"ObjectIdentifier":"S-1-5-21-1-1105","Properties":{"name":"BOB@CORP.LOCAL"}}],"meta":{"type":"users","count":2,"version":5}}"#,
        )
        .unwrap();
        let graph = RecordingGraph::new();

        let outcome = run(
            &Command::Ingest(file),
            Arc::new(graph.clone()),
            &IngestConfig::default(),
        )
        .await
        .unwrap();

        let Outcome::Ingest(report) = outcome else {
            panic!("expected an ingest report, got {outcome:?}");
        };
        assert_eq!(report.records, 2);
        assert_eq!(report.chunks_written, 1);
        assert_eq!(graph.runs()[0].params.rows().len(), 2);
    }
}
