#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Post-processing of an ingested graph.
//!
//! After every export file is loaded, a fixed list of idempotent steps derives the relationships
//! collectors cannot see directly, like replication rights or cloud role abuse. Cloud steps run
//! first, then directory steps, all in one session.
//!
//! # Example
//!
//! ```no_run
//! # use houndload_core::test_utils::RecordingGraph;
//! # use houndload_postprocess::PostProcessor;
//! # async fn run() -> anyhow::Result<()> {
//! let report = PostProcessor::new(RecordingGraph::new()).run().await?;
//! println!("{} steps failed", report.steps_failed);
//! # Ok(())
//! # }
//! ```

pub mod ad;
pub mod azure;
mod executor;
pub mod role_templates;
mod step;

pub use executor::{PostProcessReport, PostProcessor, execute_steps};
pub use step::{CallbackOutcome, PostProcessCallback, PostProcessStep, StepKind, SuccessLog};

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;

    /// Every statement the step lists can write with
    fn write_statements() -> Vec<(&'static str, String)> {
        azure::steps()
            .into_iter()
            .chain(ad::steps())
            .filter_map(|step| match step.kind {
                StepKind::Query { statement, .. } => Some((step.name, statement.as_str().to_string())),
                StepKind::Callback(_) => None,
            })
            .chain([
                ("postDCSync", ad::DC_SYNC_EDGES.to_string()),
                ("postDCSync", ad::SYNC_LAPS_PASSWORD_EDGES.to_string()),
            ])
            .collect()
    }

    #[test]
    fn test_every_write_is_an_upsert() {
        let create = Regex::new(r"\bCREATE\b").unwrap();
        let upsert = Regex::new(r"\b(MERGE|SET|DELETE|REMOVE)\b").unwrap();

        let statements = write_statements();
        assert_eq!(statements.len(), azure::steps().len() + 3 + 2);

        for (name, statement) in statements {
            assert!(!create.is_match(&statement), "{name} creates instead of merging: {statement}");
            assert!(upsert.is_match(&statement), "{name} writes nothing: {statement}");
        }
    }
}
