//! Export files and the metadata sniffed from them.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The record types an export file can declare in its metadata.
///
/// Every type is bound to a mapper routine; anything else is rejected before ingestion starts.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordType {
    Computers,
    Groups,
    Users,
    Domains,
    Ous,
    Gpos,
    Containers,
    Azure,
}

impl RecordType {
    /// Cloud exports map into three unit groups instead of one flat mapping
    pub fn is_cloud(self) -> bool {
        matches!(self, RecordType::Azure)
    }
}

/// An export file on disk. Never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub size: u64,
}

impl SourceFile {
    /// Stats the file at `path`.
    ///
    /// # Errors
    ///
    /// Errors if the file does not exist or cannot be read.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let size = fs_err::metadata(path)?.len();

        Ok(Self {
            path: path.to_path_buf(),
            size,
        })
    }
}

/// Validated metadata of an export file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub version: u64,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use strum::IntoEnumIterator as _;
    use test_case::test_case;

    use super::*;

    #[test_case("computers", RecordType::Computers; "computers")]
    #[test_case("ous", RecordType::Ous; "ous")]
    #[test_case("gpos", RecordType::Gpos; "gpos")]
    #[test_case("azure", RecordType::Azure; "azure")]
    fn test_record_type_from_name(name: &str, expected: RecordType) {
        assert_eq!(RecordType::from_str(name).unwrap(), expected);
        assert_eq!(expected.to_string(), name);
    }

    #[test]
    fn test_unknown_record_type() {
        assert!(RecordType::from_str("sessions").is_err());
        assert!(RecordType::from_str("Users").is_err());
    }

    #[test]
    fn test_only_azure_is_cloud() {
        let cloud = RecordType::iter().filter(|t| t.is_cloud()).collect::<Vec<_>>();
        assert_eq!(cloud, vec![RecordType::Azure]);
        assert_eq!(RecordType::iter().count(), 8);
    }
}
