pub use anyhow::{Context as _, Result};
pub use async_trait::async_trait;
pub use std::sync::Arc;

pub use crate::{
    FileMetadata, GraphSession, GraphStore, MappingResult, Params, RecordBatch, RecordMapper,
    RecordType, SourceFile, Statement, UploadUnit,
};
