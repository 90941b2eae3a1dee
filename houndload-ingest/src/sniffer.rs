//! Determines what an export file contains without parsing it.
//!
//! Collectors write a `meta` object next to the `data` array. It usually trails the array, so the
//! end of the file is inspected first and the start of the file second. Only a small window at
//! either end is ever read.
use std::{
    io::{Read as _, Seek as _, SeekFrom},
    str::FromStr as _,
    sync::OnceLock,
};

use houndload_core::{FileMetadata, RecordType, SourceFile};
use regex::Regex;
use thiserror::Error;

use crate::IngestConfig;

#[derive(Error, Debug)]
pub enum SniffError {
    #[error("Failed to read export file {0}")]
    Io(#[from] std::io::Error),

    #[error("No type and count found in the file metadata")]
    Unrecognized,

    #[error("Missing version or wrong version in meta: found {found:?}, need at least {minimum}")]
    UnsupportedVersion { found: Option<u64>, minimum: u64 },

    #[error("Invalid meta type: {0}")]
    UnknownType(String),
}

/// Raw metadata as found in a window, before validation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SniffedMeta {
    pub record_type: Option<String>,
    pub version: Option<u64>,
    pub count: Option<u64>,
}

impl SniffedMeta {
    fn has_type_and_count(&self) -> bool {
        self.record_type.is_some() && self.count.is_some()
    }
}

struct MetaPatterns {
    record_type: Regex,
    count: Regex,
    version: Regex,
}

// The trailing meta is anchored on the quoted key; the leading window is searched more loosely.
fn footer_patterns() -> &'static MetaPatterns {
    static PATTERNS: OnceLock<MetaPatterns> = OnceLock::new();

    PATTERNS.get_or_init(|| MetaPatterns {
        record_type: Regex::new(r#""type.?:\s*"(\w*)""#).unwrap(),
        count: Regex::new(r#""count.?:\s*(\d+)"#).unwrap(),
        version: Regex::new(r#""version.?:\s*(\d+)"#).unwrap(),
    })
}

fn header_patterns() -> &'static MetaPatterns {
    static PATTERNS: OnceLock<MetaPatterns> = OnceLock::new();

    PATTERNS.get_or_init(|| MetaPatterns {
        record_type: Regex::new(r#"type.?:\s*"(\w*)""#).unwrap(),
        count: Regex::new(r"count.?:\s*(\d+)").unwrap(),
        version: Regex::new(r"version.?:\s*(\d+)").unwrap(),
    })
}

/// Scans the trailing window. The last occurrence of every key wins.
fn scan_footer(window: &str) -> SniffedMeta {
    let patterns = footer_patterns();
    let last = |re: &Regex| {
        re.captures_iter(window)
            .last()
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    };

    SniffedMeta {
        record_type: last(&patterns.record_type),
        version: last(&patterns.version).and_then(|v| v.parse().ok()),
        count: last(&patterns.count).and_then(|v| v.parse().ok()),
    }
}

/// Scans the leading window. The first occurrence of every key wins.
fn scan_header(window: &str) -> SniffedMeta {
    let patterns = header_patterns();
    let first = |re: &Regex| {
        re.captures(window)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    };

    SniffedMeta {
        record_type: first(&patterns.record_type),
        version: first(&patterns.version).and_then(|v| v.parse().ok()),
        count: first(&patterns.count).and_then(|v| v.parse().ok()),
    }
}

/// Reads up to `len` bytes at `start`, lossily decoded. A window may split a multi-byte character.
fn read_window(file: &SourceFile, start: u64, len: u64) -> std::io::Result<String> {
    let mut handle = fs_err::File::open(&file.path)?;
    handle.seek(SeekFrom::Start(start))?;

    let mut buffer = Vec::new();
    handle.take(len).read_to_end(&mut buffer)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Sniffs and validates export file metadata
#[derive(Clone, Copy, Debug)]
pub struct FormatSniffer {
    window: u64,
    min_version: u64,
}

impl Default for FormatSniffer {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

impl FormatSniffer {
    pub fn new(window: u64, min_version: u64) -> Self {
        Self {
            window: window.max(1),
            min_version,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.sniff_window, config.min_version)
    }

    /// Finds type, version and count in the trailing window, falling back to the leading window
    /// when the trailing window lacks a type or count.
    ///
    /// # Errors
    ///
    /// Errors if the file cannot be read.
    pub fn sniff(&self, file: &SourceFile) -> Result<SniffedMeta, SniffError> {
        let start = file.size.saturating_sub(self.window);
        let meta = scan_footer(&read_window(file, start, self.window)?);
        if meta.has_type_and_count() {
            return Ok(meta);
        }

        tracing::debug!(path = %file.path.display(), "No metadata at the end of the file, trying the start");
        Ok(scan_header(&read_window(file, 0, self.window)?))
    }

    /// Validates sniffed metadata.
    ///
    /// # Errors
    ///
    /// Errors if type or count are missing, the version is missing or too old, or the type is not
    /// a known record type.
    pub fn validate(&self, meta: SniffedMeta) -> Result<FileMetadata, SniffError> {
        let (Some(record_type), Some(count)) = (meta.record_type, meta.count) else {
            return Err(SniffError::Unrecognized);
        };

        let version = match meta.version {
            Some(version) if version >= self.min_version => version,
            found => {
                return Err(SniffError::UnsupportedVersion {
                    found,
                    minimum: self.min_version,
                });
            }
        };

        let record_type =
            RecordType::from_str(&record_type).map_err(|_| SniffError::UnknownType(record_type))?;

        Ok(FileMetadata {
            record_type,
            version,
            count,
        })
    }

    /// Sniffs and validates in one go
    ///
    /// # Errors
    ///
    /// See [`FormatSniffer::sniff`] and [`FormatSniffer::validate`].
    pub fn check(&self, file: &SourceFile) -> Result<FileMetadata, SniffError> {
        let metadata = self.validate(self.sniff(file)?)?;
        tracing::debug!(
            path = %file.path.display(),
            record_type = %metadata.record_type,
            version = metadata.version,
            count = metadata.count,
            "Recognized export file"
        );

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;
    use test_case::test_case;

    use super::*;

    fn export_file(dir: &TempDir, name: &str, contents: &str) -> SourceFile {
        let path = dir.child(name);
        std::fs::write(&path, contents).unwrap();
        SourceFile::open(path).unwrap()
    }

    fn records(n: usize) -> String {
        let record = r#"{"ObjectIdentifier":"S-1-5-21-1000","Properties":{"name":"ALICE@CORP.LOCAL","description":"some text to pad the record out a bit"}}"#;
        vec![record; n].join(",")
    }

    #[test]
    fn test_trailing_meta() {
        let dir = TempDir::new().unwrap();
        let contents = format!(
            r#"{{"data":[{}],"meta":{{"methods":0,"type":"users","count":2,"version":4}}}}"#,
            records(2)
        );
        let file = export_file(&dir, "users.json", &contents);

        let metadata = FormatSniffer::default().check(&file).unwrap();

        assert_eq!(
            metadata,
            FileMetadata {
                record_type: RecordType::Users,
                version: 4,
                count: 2
            }
        );
    }

    #[test]
    fn test_leading_meta_is_used_when_trailing_window_has_none() {
        let dir = TempDir::new().unwrap();
        let contents = format!(
            "{{\n  \"meta\": {{\n    \"type\": \"azure\",\n    \"count\": 10,\n    \"version\": 5\n  }},\n  \"data\": [{}]\n}}",
            records(20)
        );
        let file = export_file(&dir, "azure.json", &contents);

        let metadata = FormatSniffer::default().check(&file).unwrap();

        assert_eq!(metadata.record_type, RecordType::Azure);
        assert_eq!(metadata.version, 5);
        assert_eq!(metadata.count, 10);
    }

    #[test]
    fn test_last_occurrence_wins_in_trailing_window() {
        let meta = scan_footer(
            r#"{"type":"user","count":1}],"meta":{"type":"computers","count":7,"version":4}}"#,
        );

        assert_eq!(meta.record_type.as_deref(), Some("computers"));
        assert_eq!(meta.count, Some(7));
    }

    #[test]
    fn test_trailing_meta_without_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let contents = format!(
            r#"{{"meta":{{"type":"users","count":5,"version":4}},"data":[{}],"meta2":{{"type":"users","count":5}}}}"#,
            records(5)
        );
        let file = export_file(&dir, "old.json", &contents);

        let err = FormatSniffer::default().check(&file).unwrap_err();

        assert!(matches!(
            err,
            SniffError::UnsupportedVersion {
                found: None,
                minimum: 4
            }
        ));
    }

    #[test_case(r#"{"data":[],"meta":{"type":"users","count":0,"version":3}}"#; "version too old")]
    #[test_case(r#"{"data":[],"meta":{"type":"users","count":0}}"#; "version missing")]
    fn test_unsupported_versions(contents: &str) {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, "users.json", contents);

        assert!(matches!(
            FormatSniffer::default().check(&file),
            Err(SniffError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_unknown_type() {
        let dir = TempDir::new().unwrap();
        let file = export_file(
            &dir,
            "sessions.json",
            r#"{"data":[],"meta":{"type":"sessions","count":0,"version":4}}"#,
        );

        let err = FormatSniffer::default().check(&file).unwrap_err();

        assert!(matches!(err, SniffError::UnknownType(name) if name == "sessions"));
    }

    #[test]
    fn test_no_metadata_anywhere() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, "plain.json", r#"{"data":[1,2,3]}"#);

        assert!(matches!(
            FormatSniffer::default().check(&file),
            Err(SniffError::Unrecognized)
        ));
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, "empty.json", "");

        assert_eq!(FormatSniffer::default().sniff(&file).unwrap(), SniffedMeta::default());
    }

    #[test]
    fn test_window_splitting_a_multibyte_character_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let name = "Jürgen ".repeat(60);
        let contents = format!(
            r#"{{"data":[{{"name":"{name}"}}],"meta":{{"type":"groups","count":1,"version":4}}}}"#
        );
        let file = export_file(&dir, "groups.json", &contents);

        let metadata = FormatSniffer::new(77, 4).check(&file).unwrap();

        assert_eq!(metadata.record_type, RecordType::Groups);
    }
}
