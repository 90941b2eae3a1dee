//! Post-processing steps: a named query or a named multi-statement routine.
use std::{fmt, sync::Arc};

use async_trait::async_trait;
use houndload_core::{GraphSession, Params, QueryResult, Statement};

/// Turns a successful query result into a log line
pub type SuccessLog = fn(&QueryResult) -> anyhow::Result<String>;

/// What a callback step did, as reported by the callback itself
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub statements_run: usize,
    pub statements_failed: usize,
}

impl CallbackOutcome {
    pub fn succeeded(&mut self) {
        self.statements_run += 1;
    }

    pub fn failed(&mut self) {
        self.statements_run += 1;
        self.statements_failed += 1;
    }
}

/// A routine that needs more than one statement, usually because it derives statement parameters
/// from the results of earlier reads.
///
/// Callbacks handle their own errors. They log failures and report them in the outcome instead of
/// returning them.
#[async_trait]
pub trait PostProcessCallback: fmt::Debug + Send + Sync {
    async fn run(&self, session: &dyn GraphSession) -> CallbackOutcome;
}

#[derive(Clone, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum StepKind {
    Query {
        statement: Statement,
        params: Params,
        log: Option<SuccessLog>,
    },
    Callback(Arc<dyn PostProcessCallback>),
}

impl StepKind {
    /// `query` or `callback`
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Debug for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Query {
                statement,
                params,
                log,
            } => f
                .debug_struct("Query")
                .field("statement", statement)
                .field("params", params)
                .field("log", &log.is_some())
                .finish(),
            StepKind::Callback(callback) => f.debug_tuple("Callback").field(callback).finish(),
        }
    }
}

/// One step of a post-processing pass. Steps are declared up front and never change.
#[derive(Clone, Debug)]
pub struct PostProcessStep {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub kind: StepKind,
}

impl PostProcessStep {
    /// A query step without parameters
    pub fn query(name: &'static str, statement: Statement) -> Self {
        Self {
            name,
            description: None,
            kind: StepKind::Query {
                statement,
                params: Params::new(),
                log: None,
            },
        }
    }

    pub fn callback(name: &'static str, callback: impl PostProcessCallback + 'static) -> Self {
        Self {
            name,
            description: None,
            kind: StepKind::Callback(Arc::new(callback)),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Binds parameters. Has no effect on callback steps.
    #[must_use]
    pub fn with_params(mut self, new_params: Params) -> Self {
        if let StepKind::Query { params, .. } = &mut self.kind {
            *params = new_params;
        }
        self
    }

    /// Logs a line derived from the result after the query succeeds. Has no effect on callback
    /// steps.
    #[must_use]
    pub fn with_log(mut self, formatter: SuccessLog) -> Self {
        if let StepKind::Query { log, .. } = &mut self.kind {
            *log = Some(formatter);
        }
        self
    }
}
