#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Graph store integrations.
//!
//! Every store sits behind a feature flag and implements [`houndload_core::GraphStore`].

#[cfg(feature = "neo4j")]
pub mod neo4j;
