//! Neo4j over the HTTP query API.
//!
//! Every `run` is a single request to `/db/{database}/query/v2` and therefore a single implicit,
//! auto-committed transaction. That is what lets statements use `CALL { ... } IN TRANSACTIONS`.
//! A session threads the bookmarks returned by one request into the next, so every statement sees
//! the writes of the statements before it even in a cluster.
//!
//! # Example
//!
//! ```no_run
//! # use houndload_core::{GraphStore as _, Params, Statement};
//! # use houndload_integrations::neo4j::Neo4j;
//! # async fn run() -> anyhow::Result<()> {
//! let neo4j = Neo4j::try_from_env()?;
//! let mut session = neo4j.session().await?;
//! let result = session
//!     .run(&Statement::from_static("MATCH (n:Domain) RETURN n.name AS name"), &Params::new())
//!     .await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```
use anyhow::Result;
use async_trait::async_trait;
use houndload_core::{GraphError, GraphSession, GraphStore};

mod config;
mod session;
mod wire;

pub use config::{DEFAULT_DATABASE, DEFAULT_URL, DEFAULT_USER, Neo4jConfig, Neo4jConfigBuilder};
pub use session::Neo4jSession;

/// A Neo4j graph store. Cheap to clone, the underlying client is shared.
#[derive(Clone, Debug)]
pub struct Neo4j {
    client: reqwest::Client,
    config: Neo4jConfig,
}

impl Neo4j {
    pub fn new(config: Neo4jConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Uses the given client instead of a default one
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Configures the store from `NEOURL`, `NEOUSER`, `NEOPWD` and `NEODB`.
    ///
    /// # Errors
    ///
    /// Errors if `NEOPWD` is missing or empty.
    pub fn try_from_env() -> Result<Self> {
        Ok(Self::new(Neo4jConfig::from_env()?))
    }

    pub fn config(&self) -> &Neo4jConfig {
        &self.config
    }
}

#[async_trait]
impl GraphStore for Neo4j {
    async fn session(&self) -> Result<Box<dyn GraphSession>, GraphError> {
        tracing::debug!(endpoint = %self.config.endpoint(), "Opening Neo4j session");
        Ok(Box::new(Neo4jSession::new(
            self.client.clone(),
            self.config.clone(),
        )))
    }
}
