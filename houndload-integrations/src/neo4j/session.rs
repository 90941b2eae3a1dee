use std::sync::Mutex;

use anyhow::Context as _;
use async_trait::async_trait;
use houndload_core::{
    GraphError, GraphSession, Params, QueryResult, Statement,
    util::{debug_long_utf8, single_line},
};
use secrecy::ExposeSecret as _;

use super::{
    Neo4jConfig,
    wire::{QueryRequest, QueryResponse},
};

/// A session against a Neo4j database.
///
/// Holds no server side state besides the latest bookmarks. Closing it only stops further use.
#[derive(Debug)]
pub struct Neo4jSession {
    client: reqwest::Client,
    config: Neo4jConfig,
    endpoint: String,
    bookmarks: Mutex<Vec<String>>,
    closed: bool,
}

impl Neo4jSession {
    pub(super) fn new(client: reqwest::Client, config: Neo4jConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint(),
            config,
            bookmarks: Mutex::new(Vec::new()),
            closed: false,
        }
    }

    fn bookmarks(&self) -> Vec<String> {
        self.bookmarks
            .lock()
            .map(|bookmarks| bookmarks.clone())
            .unwrap_or_default()
    }

    fn remember(&self, bookmarks: Vec<String>) {
        if bookmarks.is_empty() {
            return;
        }
        if let Ok(mut current) = self.bookmarks.lock() {
            *current = bookmarks;
        }
    }

    async fn send(&self, statement: &Statement, params: &Params) -> Result<QueryResponse, GraphError> {
        let bookmarks = self.bookmarks();
        let request = QueryRequest {
            statement: statement.as_str(),
            parameters: params,
            include_counters: true,
            bookmarks: &bookmarks,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.config.user, Some(self.config.password.expose_secret()))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send statement")
            .map_err(GraphError::Transport)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("Failed to read response body")
            .map_err(GraphError::Transport)?;

        match serde_json::from_slice::<QueryResponse>(&body) {
            Ok(response) if !response.errors.is_empty() => {
                let code = response.errors[0].code.clone();
                let message = response
                    .errors
                    .iter()
                    .map(|error| error.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(GraphError::Server { code, message })
            }
            Ok(response) if status.is_success() => Ok(response),
            Ok(_) => Err(GraphError::Transport(anyhow::anyhow!(
                "Unexpected status {status} without errors"
            ))),
            Err(err) if status.is_success() => Err(GraphError::Decode(err)),
            Err(_) => Err(GraphError::Transport(anyhow::anyhow!(
                "Unexpected status {status}: {}",
                debug_long_utf8(String::from_utf8_lossy(&body), 200)
            ))),
        }
    }
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run(&self, statement: &Statement, params: &Params) -> Result<QueryResult, GraphError> {
        if self.closed {
            return Err(GraphError::SessionClosed);
        }

        tracing::trace!(
            statement = %debug_long_utf8(single_line(statement.as_str()), 200),
            "Running statement"
        );

        let response = self.send(statement, params).await?;
        self.remember(response.bookmarks.clone());

        Ok(response.into_result())
    }

    async fn close(&mut self) -> Result<(), GraphError> {
        self.closed = true;
        Ok(())
    }
}
