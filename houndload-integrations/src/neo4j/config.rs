use anyhow::{Context as _, Result};
use derive_builder::Builder;
use secrecy::{ExposeSecret as _, SecretString};

pub const DEFAULT_URL: &str = "http://localhost:7474";
pub const DEFAULT_USER: &str = "neo4j";
pub const DEFAULT_DATABASE: &str = "neo4j";

/// Where and as whom to connect.
///
/// ```
/// # use houndload_integrations::neo4j::Neo4jConfig;
/// let config = Neo4jConfig::builder()
///     .password("hunter2")
///     .url("http://graph.internal:7474/")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.endpoint(), "http://graph.internal:7474/db/neo4j/query/v2");
/// ```
#[derive(Clone, Debug, Builder)]
#[builder(
    pattern = "owned",
    setter(into),
    build_fn(error = "anyhow::Error", validate = "Self::validate")
)]
pub struct Neo4jConfig {
    /// Base url of the HTTP endpoint
    #[builder(default = "DEFAULT_URL.to_string()")]
    pub url: String,

    #[builder(default = "DEFAULT_USER.to_string()")]
    pub user: String,

    /// Must not be empty
    pub password: SecretString,

    #[builder(default = "DEFAULT_DATABASE.to_string()")]
    pub database: String,
}

impl Neo4jConfigBuilder {
    fn validate(&self) -> Result<()> {
        if self
            .password
            .as_ref()
            .is_some_and(|password| password.expose_secret().is_empty())
        {
            anyhow::bail!("Neo4j password must not be empty");
        }
        Ok(())
    }
}

impl Neo4jConfig {
    pub fn builder() -> Neo4jConfigBuilder {
        Neo4jConfigBuilder::default()
    }

    /// Reads `NEOURL`, `NEOUSER`, `NEOPWD` and `NEODB` from the environment.
    ///
    /// # Errors
    ///
    /// Errors if `NEOPWD` is missing or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Neo4jConfig::from_env`], reading variables through `lookup`
    ///
    /// # Errors
    ///
    /// Errors if `NEOPWD` is missing or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let password = lookup("NEOPWD").context("NEOPWD is not set")?;

        let mut builder = Self::builder().password(password);
        if let Some(url) = lookup("NEOURL") {
            builder = builder.url(url);
        }
        if let Some(user) = lookup("NEOUSER") {
            builder = builder.user(user);
        }
        if let Some(database) = lookup("NEODB") {
            builder = builder.database(database);
        }

        builder.build()
    }

    /// The query endpoint of the configured database
    pub fn endpoint(&self) -> String {
        format!(
            "{}/db/{}/query/v2",
            self.url.trim_end_matches('/'),
            self.database
        )
    }
}
