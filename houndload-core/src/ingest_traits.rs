//! Traits for turning raw export records into upload units
use std::fmt::Debug;

use serde_json::Value;

use crate::{MappingResult, RecordType};

/// A batch of raw records as read from the bulk data array
pub type RecordBatch = Vec<Value>;

/// Maps a batch of raw records of one type into upload units.
///
/// Mapping is pure: the same records always yield the same units, and nothing touches the store.
pub trait RecordMapper: Debug + Send + Sync {
    fn map(&self, record_type: RecordType, records: RecordBatch) -> MappingResult;
}

impl<T: RecordMapper + ?Sized> RecordMapper for Box<T> {
    fn map(&self, record_type: RecordType, records: RecordBatch) -> MappingResult {
        (**self).map(record_type, records)
    }
}

impl<T: RecordMapper + ?Sized> RecordMapper for std::sync::Arc<T> {
    fn map(&self, record_type: RecordType, records: RecordBatch) -> MappingResult {
        (**self).map(record_type, records)
    }
}
