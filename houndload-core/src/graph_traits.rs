//! The graph store seam.
//!
//! Components never hold a process-wide driver. They receive a [`GraphStore`] and open one
//! [`GraphSession`] per pass, passing the session explicitly to whatever needs store access.
use std::fmt::Debug;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[cfg(feature = "test-utils")]
#[doc(hidden)]
use mockall::automock;

use crate::{GraphError, Params, Statement};

#[async_trait]
/// Hands out sessions against a graph store
pub trait GraphStore: Debug + Send + Sync {
    async fn session(&self) -> Result<Box<dyn GraphSession>, GraphError>;
}

#[async_trait]
impl<T: GraphStore + ?Sized> GraphStore for std::sync::Arc<T> {
    async fn session(&self) -> Result<Box<dyn GraphSession>, GraphError> {
        (**self).session().await
    }
}

#[cfg_attr(feature = "test-utils", automock)]
#[async_trait]
/// A transactional context against the graph store.
///
/// Every `run` is one isolated, auto-committed transaction. Its writes are visible to every
/// subsequent `run` on the same session.
pub trait GraphSession: Send + Sync {
    async fn run(&self, statement: &Statement, params: &Params) -> Result<QueryResult, GraphError>;

    /// Releases the session. Running statements afterwards is an error.
    async fn close(&mut self) -> Result<(), GraphError>;
}

/// Update counters reported by the store for a single statement
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryCounters {
    pub contains_updates: bool,
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
    pub constraints_added: u64,
}

/// Rows and counters returned for a statement
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub counters: QueryCounters,
}

impl QueryResult {
    /// Values of the named column, in row order. Empty if the column does not exist.
    pub fn column(&self, name: &str) -> Vec<&Value> {
        let Some(index) = self.columns.iter().position(|c| c == name) else {
            return Vec::new();
        };

        self.rows.iter().filter_map(|row| row.get(index)).collect()
    }

    /// String values of the named column, skipping anything that is not a string
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.column(name)
            .into_iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_column_values() {
        let result = QueryResult {
            columns: vec!["domainid".into(), "name".into()],
            rows: vec![
                vec![json!("S-1-5-21-1"), json!("CORP.LOCAL")],
                vec![json!(null), json!("EMPTY")],
                vec![json!("S-1-5-21-2"), json!("LAB.LOCAL")],
            ],
            counters: QueryCounters::default(),
        };

        assert_eq!(result.strings("domainid"), vec!["S-1-5-21-1", "S-1-5-21-2"]);
        assert_eq!(result.column("name").len(), 3);
        assert!(result.column("missing").is_empty());
    }

    #[test]
    fn test_counters_from_store_stats() {
        let counters: QueryCounters = serde_json::from_value(json!({
            "containsUpdates": true,
            "relationshipsCreated": 4,
            "relationshipsDeleted": 1,
            "indexesAdded": 0
        }))
        .unwrap();

        assert!(counters.contains_updates);
        assert_eq!(counters.relationships_created, 4);
        assert_eq!(counters.relationships_deleted, 1);
        assert_eq!(counters.nodes_created, 0);
    }
}
