//! Runs post-processing steps strictly in order, isolating failures per step.
use std::{ops::AddAssign, sync::Arc};

use anyhow::{Context as _, Result};
use houndload_core::{GraphSession, GraphStore};

use crate::{PostProcessStep, StepKind, ad, azure};

/// Totals for one or more post-processing passes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PostProcessReport {
    pub steps_run: usize,
    pub steps_failed: usize,
    pub formatter_failures: usize,
}

impl PostProcessReport {
    pub fn has_failures(&self) -> bool {
        self.steps_failed > 0 || self.formatter_failures > 0
    }
}

impl AddAssign for PostProcessReport {
    fn add_assign(&mut self, rhs: Self) {
        self.steps_run += rhs.steps_run;
        self.steps_failed += rhs.steps_failed;
        self.formatter_failures += rhs.formatter_failures;
    }
}

/// Executes `steps` in order on `session`.
///
/// A failing step is logged and counted, then the next step runs. Nothing is retried or rolled
/// back; every step is an idempotent upsert, so re-running the whole list is the recovery path.
pub async fn execute_steps(
    steps: &[PostProcessStep],
    session: &dyn GraphSession,
) -> PostProcessReport {
    let mut report = PostProcessReport::default();

    for step in steps {
        tracing::info!("At {} - {}", step.name, step.kind.name());
        if let Some(description) = step.description {
            tracing::debug!(step = step.name, description);
        }
        report.steps_run += 1;

        match &step.kind {
            StepKind::Query {
                statement,
                params,
                log,
            } => match session.run(statement, params).await {
                Ok(result) => {
                    let Some(formatter) = log else {
                        continue;
                    };
                    match formatter(&result) {
                        Ok(line) => tracing::info!(step = step.name, "{line}"),
                        Err(err) => {
                            report.formatter_failures += 1;
                            tracing::error!(step = step.name, error = %err, "Failed to format step result");
                        }
                    }
                }
                Err(err) => {
                    report.steps_failed += 1;
                    tracing::error!(step = step.name, error = %err, "Post-processing step failed");
                }
            },
            StepKind::Callback(callback) => {
                let outcome = callback.run(session).await;
                if outcome.statements_failed > 0 {
                    report.steps_failed += 1;
                    tracing::error!(
                        step = step.name,
                        statements_run = outcome.statements_run,
                        statements_failed = outcome.statements_failed,
                        "Post-processing callback had failures"
                    );
                }
            }
        }
    }

    report
}

/// Runs the cloud steps and then the directory steps in one session
#[derive(Debug, Clone)]
pub struct PostProcessor {
    store: Arc<dyn GraphStore>,
    cloud_steps: Vec<PostProcessStep>,
    directory_steps: Vec<PostProcessStep>,
}

impl PostProcessor {
    /// A post-processor with the built-in step lists
    pub fn new(store: impl GraphStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
            cloud_steps: azure::steps(),
            directory_steps: ad::steps(),
        }
    }

    #[must_use]
    pub fn with_cloud_steps(mut self, steps: Vec<PostProcessStep>) -> Self {
        self.cloud_steps = steps;
        self
    }

    #[must_use]
    pub fn with_directory_steps(mut self, steps: Vec<PostProcessStep>) -> Self {
        self.directory_steps = steps;
        self
    }

    /// Runs both step lists. The session is released however the steps fare.
    ///
    /// # Errors
    ///
    /// Errors only if no session can be opened. Step failures are logged and counted.
    #[tracing::instrument(skip_all, name = "post_processor.run")]
    pub async fn run(&self) -> Result<PostProcessReport> {
        let mut session = self
            .store
            .session()
            .await
            .context("Failed to open graph session")?;

        tracing::info!("Running Azure post-import steps");
        let mut report = execute_steps(&self.cloud_steps, session.as_ref()).await;
        tracing::info!("Running AD post-import steps");
        report += execute_steps(&self.directory_steps, session.as_ref()).await;

        if let Err(err) = session.close().await {
            tracing::warn!(error = %err, "Failed to close graph session");
        }

        if report.has_failures() {
            tracing::warn!(
                steps_run = report.steps_run,
                steps_failed = report.steps_failed,
                formatter_failures = report.formatter_failures,
                "Post-processing finished with failures"
            );
        } else {
            tracing::info!(steps_run = report.steps_run, "Post-processing finished");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use houndload_core::{
        GraphStore as _, MockGraphSession, Params, QueryCounters, QueryResult, Statement,
        test_utils::RecordingGraph,
    };
    use mockall::{Sequence, predicate::function};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::CallbackOutcome;

    fn step(name: &'static str, statement: &'static str) -> PostProcessStep {
        PostProcessStep::query(name, Statement::from_static(statement))
    }

    #[test_log::test(tokio::test)]
    async fn test_steps_run_in_declared_order() {
        let mut session = MockGraphSession::new();
        let mut seq = Sequence::new();

        for statement in ["RETURN 1", "RETURN 2", "RETURN 3"] {
            session
                .expect_run()
                .with(
                    function(move |s: &Statement| s.as_str() == statement),
                    mockall::predicate::always(),
                )
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(QueryResult::default()));
        }

        let report = execute_steps(
            &[
                step("one", "RETURN 1"),
                step("two", "RETURN 2"),
                step("three", "RETURN 3"),
            ],
            &session,
        )
        .await;

        assert_eq!(report.steps_run, 3);
        assert!(!report.has_failures());
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_step_does_not_stop_later_steps() {
        let graph = RecordingGraph::new();
        graph.fail_statements_containing("RETURN 2");
        let session = graph.session().await.unwrap();

        let report = execute_steps(
            &[
                step("one", "RETURN 1"),
                step("two", "RETURN 2"),
                step("three", "RETURN 3"),
            ],
            session.as_ref(),
        )
        .await;

        assert_eq!(
            report,
            PostProcessReport {
                steps_run: 3,
                steps_failed: 1,
                formatter_failures: 0
            }
        );
        assert_eq!(graph.statements(), vec!["RETURN 1", "RETURN 2", "RETURN 3"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_formatter_failure_is_not_fatal() {
        let graph = RecordingGraph::new();
        graph.respond_to(
            "DELETE",
            QueryResult {
                counters: QueryCounters {
                    relationships_deleted: 4,
                    ..QueryCounters::default()
                },
                ..QueryResult::default()
            },
        );
        let session = graph.session().await.unwrap();

        let steps = [
            step("clear", "MATCH ()-[r:AZAddSecret]->() DELETE r")
                .with_log(|result| Ok(format!("Deleted {} rels", result.counters.relationships_deleted))),
            step("broken", "RETURN 1").with_log(|_| anyhow::bail!("no counters")),
            step("after", "RETURN 2"),
        ];

        let report = execute_steps(&steps, session.as_ref()).await;

        assert_eq!(report.formatter_failures, 1);
        assert_eq!(report.steps_failed, 0);
        assert_eq!(graph.runs().len(), 3);
    }

    #[derive(Debug)]
    struct CountingCallback;

    #[async_trait]
    impl crate::PostProcessCallback for CountingCallback {
        async fn run(&self, session: &dyn GraphSession) -> CallbackOutcome {
            let mut outcome = CallbackOutcome::default();
            for statement in ["RETURN 'a'", "RETURN 'b'"] {
                match session
                    .run(&Statement::from_static(statement), &Params::new())
                    .await
                {
                    Ok(_) => outcome.succeeded(),
                    Err(_) => outcome.failed(),
                }
            }
            outcome
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_callback_failures_count_as_one_failed_step() {
        let graph = RecordingGraph::new();
        graph.fail_statements_containing("'b'");
        let session = graph.session().await.unwrap();

        let report = execute_steps(
            &[
                PostProcessStep::callback("callback", CountingCallback),
                step("after", "RETURN 1"),
            ],
            session.as_ref(),
        )
        .await;

        assert_eq!(report.steps_run, 2);
        assert_eq!(report.steps_failed, 1);
        assert_eq!(graph.statements().last().unwrap(), "RETURN 1");
    }

    #[test_log::test(tokio::test)]
    async fn test_params_are_bound() {
        let graph = RecordingGraph::new();
        let session = graph.session().await.unwrap();

        execute_steps(
            &[step("bound", "UNWIND $sids AS sid RETURN sid")
                .with_params(Params::new().with("sids", json!(["S-1-1-0"])))],
            session.as_ref(),
        )
        .await;

        assert_eq!(graph.runs()[0].params.get("sids"), Some(&json!(["S-1-1-0"])));
    }

    #[test_log::test(tokio::test)]
    async fn test_cloud_steps_run_before_directory_steps_in_one_session() {
        let graph = RecordingGraph::new();

        let report = PostProcessor::new(graph.clone())
            .with_cloud_steps(vec![step("cloud", "RETURN 'cloud'")])
            .with_directory_steps(vec![step("directory", "RETURN 'directory'")])
            .run()
            .await
            .unwrap();

        assert_eq!(report.steps_run, 2);
        assert_eq!(graph.statements(), vec!["RETURN 'cloud'", "RETURN 'directory'"]);
        assert!(graph.runs().iter().all(|run| run.session == 1));
        graph.assert_sessions_released();
    }

    #[test_log::test(tokio::test)]
    async fn test_session_is_released_when_every_step_fails() {
        let graph = RecordingGraph::new();
        graph.fail_statements_containing("RETURN");

        let report = PostProcessor::new(graph.clone())
            .with_cloud_steps(vec![step("cloud", "RETURN 'cloud'")])
            .with_directory_steps(vec![step("directory", "RETURN 'directory'")])
            .run()
            .await
            .unwrap();

        assert_eq!(report.steps_failed, 2);
        graph.assert_sessions_released();
    }
}
