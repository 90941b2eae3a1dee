//! Upload units produced by record mappers and consumed by the uploader.
use std::collections::BTreeMap;

use serde_json::Value;

use crate::Statement;

/// One homogeneous set of graph mutations: a statement and the rows it is applied to.
///
/// Every row is independently applicable through the same statement.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadUnit {
    pub statement: Statement,
    pub props: Vec<Value>,
}

impl UploadUnit {
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            props: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Value) {
        self.props.push(row);
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Splits the rows into contiguous chunks of at most `chunk_size` rows, in order.
    ///
    /// A `chunk_size` of zero is treated as one.
    pub fn into_chunks(self, chunk_size: usize) -> impl Iterator<Item = Vec<Value>> {
        let chunk_size = chunk_size.max(1);
        let mut rows = self.props.into_iter().peekable();

        std::iter::from_fn(move || {
            rows.peek()?;
            Some(rows.by_ref().take(chunk_size).collect())
        })
    }
}

/// Upload units keyed by name. Iterates in name order.
pub type UnitMap = BTreeMap<String, UploadUnit>;

/// Named groups of units, in upload order
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnitGroup {
    Flat,
    Cloud,
    OnPrem,
    Relationships,
}

/// Units produced by the cloud mapper
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CloudUnits {
    /// Cloud-resident objects
    pub cloud: UnitMap,
    /// On-premises objects linked from cloud objects
    pub on_prem: UnitMap,
    pub relationships: UnitMap,
}

/// What a record mapper returns for one batch of records
#[derive(Clone, Debug, PartialEq)]
pub enum MappingResult {
    Flat(UnitMap),
    Cloud(CloudUnits),
}

impl MappingResult {
    /// Consumes the result into its groups in upload order.
    ///
    /// Cloud results always yield cloud objects, then on-premises objects, then relationships.
    pub fn into_groups(self) -> Vec<(UnitGroup, UnitMap)> {
        match self {
            MappingResult::Flat(units) => vec![(UnitGroup::Flat, units)],
            MappingResult::Cloud(CloudUnits {
                cloud,
                on_prem,
                relationships,
            }) => vec![
                (UnitGroup::Cloud, cloud),
                (UnitGroup::OnPrem, on_prem),
                (UnitGroup::Relationships, relationships),
            ],
        }
    }
}
