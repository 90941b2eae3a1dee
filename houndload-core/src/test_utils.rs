#![allow(clippy::missing_panics_doc)]
//! An in-memory graph store that records every statement it is asked to run.
//!
//! Great for testing pipelines and post-processing without a database. Failures can be scripted
//! by call index or by a marker contained in the statement text.
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use crate::{GraphError, GraphSession, GraphStore, Params, QueryResult, Statement};

/// A single `run` as seen by the [`RecordingGraph`]
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRun {
    pub session: usize,
    pub statement: Statement,
    pub params: Params,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct State {
    runs: Vec<RecordedRun>,
    failing_calls: HashSet<usize>,
    failing_markers: Vec<String>,
    responses: Vec<(String, QueryResult)>,
    sessions_opened: usize,
    sessions_closed: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RecordingGraph {
    state: Arc<Mutex<State>>,
}

impl RecordingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `n`-th call to `run` (zero indexed, counted across all sessions)
    pub fn fail_call(&self, n: usize) -> &Self {
        self.state.lock().unwrap().failing_calls.insert(n);
        self
    }

    /// Fails every statement containing `marker`
    pub fn fail_statements_containing(&self, marker: impl Into<String>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .failing_markers
            .push(marker.into());
        self
    }

    /// Answers statements containing `marker` with `result`. First registered marker wins.
    pub fn respond_to(&self, marker: impl Into<String>, result: QueryResult) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push((marker.into(), result));
        self
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.runs()
            .into_iter()
            .map(|run| run.statement.as_str().to_string())
            .collect()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().unwrap().sessions_opened
    }

    /// Asserts every opened session was closed again
    pub fn assert_sessions_released(&self) {
        let state = self.state.lock().unwrap();
        assert_eq!(state.sessions_opened, state.sessions_closed);
    }
}

#[async_trait]
impl GraphStore for RecordingGraph {
    async fn session(&self) -> Result<Box<dyn GraphSession>, GraphError> {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.sessions_opened += 1;
            state.sessions_opened
        };

        Ok(Box::new(RecordingSession {
            graph: self.clone(),
            id,
            closed: false,
        }))
    }
}

struct RecordingSession {
    graph: RecordingGraph,
    id: usize,
    closed: bool,
}

#[async_trait]
impl GraphSession for RecordingSession {
    async fn run(&self, statement: &Statement, params: &Params) -> Result<QueryResult, GraphError> {
        if self.closed {
            return Err(GraphError::SessionClosed);
        }

        let mut state = self.graph.state.lock().unwrap();
        let call = state.runs.len();
        let failed = state.failing_calls.contains(&call)
            || state
                .failing_markers
                .iter()
                .any(|marker| statement.as_str().contains(marker.as_str()));

        state.runs.push(RecordedRun {
            session: self.id,
            statement: statement.clone(),
            params: params.clone(),
            succeeded: !failed,
        });

        if failed {
            return Err(GraphError::Server {
                code: "Neo.ClientError.Test.ScriptedFailure".to_string(),
                message: format!("scripted failure for call {call}"),
            });
        }

        Ok(state
            .responses
            .iter()
            .find(|(marker, _)| statement.as_str().contains(marker.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), GraphError> {
        if !self.closed {
            self.closed = true;
            self.graph.state.lock().unwrap().sessions_closed += 1;
        }
        Ok(())
    }
}
