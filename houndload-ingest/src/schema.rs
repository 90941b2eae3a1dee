//! Unique `objectid` constraints for every label the mappers write.
//!
//! Uploads merge on `objectid`, so without these constraints every merge is a label scan.
use anyhow::{Context as _, Result};
use houndload_core::{Fragment, GraphSession, GraphStore, Params, Statement};
use strum::IntoEnumIterator as _;

use crate::mappers::NodeLabel;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub applied: usize,
    pub failed: usize,
}

#[derive(Clone, Debug)]
pub struct Schema {
    labels: Vec<NodeLabel>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            labels: NodeLabel::iter().collect(),
        }
    }
}

impl Schema {
    pub fn statements(&self) -> Vec<Statement> {
        self.labels
            .iter()
            .map(|label| {
                let label = label.identifier();
                Statement::compose(&[
                    Fragment::Text("CREATE CONSTRAINT "),
                    Fragment::Ident(&label),
                    Fragment::Text("_objectid IF NOT EXISTS FOR (n:"),
                    Fragment::Ident(&label),
                    Fragment::Text(") REQUIRE n.objectid IS UNIQUE"),
                ])
            })
            .collect()
    }

    /// Creates all constraints. Existing constraints are left alone, so this is safe to repeat.
    ///
    /// # Errors
    ///
    /// Errors if no session can be opened. Individual constraint failures are logged and counted.
    #[tracing::instrument(skip_all, name = "schema.apply")]
    pub async fn apply(&self, store: &dyn GraphStore) -> Result<SchemaReport> {
        let mut session = store
            .session()
            .await
            .context("Failed to open graph session")?;

        let report = self.apply_with(session.as_ref()).await;

        if let Err(err) = session.close().await {
            tracing::warn!(error = %err, "Failed to close graph session");
        }

        tracing::info!(
            applied = report.applied,
            failed = report.failed,
            "Schema constraints applied"
        );
        Ok(report)
    }

    async fn apply_with(&self, session: &dyn GraphSession) -> SchemaReport {
        let mut report = SchemaReport::default();
        let params = Params::new();

        for statement in self.statements() {
            match session.run(&statement, &params).await {
                Ok(_) => report.applied += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::error!(statement = %statement, error = %err, "Failed to create constraint");
                }
            }
        }

        report
    }
}
