#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Core types and traits shared by the ingestion pipeline, the post-processing executor and the
//! graph store integrations.

mod errors;
mod export;
pub mod graph_traits;
pub mod ingest_traits;
mod statement;
mod upload;

pub use crate::errors::*;
pub use crate::export::*;
/// All traits are available from the root
pub use crate::graph_traits::*;
pub use crate::ingest_traits::*;
pub use crate::statement::*;
pub use crate::upload::*;

/// Re-export of commonly used dependencies.
pub mod prelude;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub mod util;
