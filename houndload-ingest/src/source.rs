//! Streams the records of an export file's `data` array in fixed-size batches.
//!
//! Parsing happens incrementally on a blocking thread, so memory stays bounded by the batch size no
//! matter how large the file is. The parser only reads ahead when asked to: every call to
//! [`RecordStream::next_batch`] grants it exactly one more batch. A consumer that is busy writing
//! simply does not ask, and the parser stays where it left off.
use std::{fmt, io::BufReader, path::PathBuf};

use futures_util::Stream;
use houndload_core::RecordBatch;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::config::DEFAULT_RECORD_BATCH_SIZE;

/// The key of the array holding the records
pub const DATA_KEY: &str = "data";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open export file {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse export file {0}")]
    Parse(serde_json::Error),

    #[error("Record parser stopped unexpectedly {0}")]
    Cancelled(tokio::task::JoinError),
}

/// Where records come from and how many to read at a time
#[derive(Clone, Debug)]
pub struct RecordSource {
    path: PathBuf,
    batch_size: usize,
}

impl RecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            batch_size: DEFAULT_RECORD_BATCH_SIZE,
        }
    }

    /// Maximum records per batch. Zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Starts the parser. Must be called from within a tokio runtime.
    pub fn into_stream(self) -> RecordStream {
        let (demand_tx, demand_rx) = mpsc::channel(1);
        let (batches_tx, batches_rx) = mpsc::channel(1);

        let span = tracing::debug_span!("record_source", path = %self.path.display());
        let parser = tokio::task::spawn_blocking(move || {
            let _entered = span.entered();
            parse_records(&self, demand_rx, &batches_tx);
        });

        RecordStream {
            demand: Some(demand_tx),
            batches: batches_rx,
            parser: Some(parser),
            finished: false,
        }
    }
}

/// Batches of records, pulled one at a time.
///
/// Yields `Ok` batches in file order and then either nothing or exactly one error. Dropping the
/// stream stops the parser.
pub struct RecordStream {
    demand: Option<mpsc::Sender<()>>,
    batches: mpsc::Receiver<Result<RecordBatch, SourceError>>,
    parser: Option<JoinHandle<()>>,
    finished: bool,
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("finished", &self.finished)
            .finish()
    }
}

impl RecordStream {
    /// Asks the parser for one more batch and waits for it.
    ///
    /// Returns `None` once the array is exhausted or after an error was returned.
    pub async fn next_batch(&mut self) -> Option<Result<RecordBatch, SourceError>> {
        if self.finished {
            return None;
        }

        if let Some(demand) = &self.demand {
            if demand.send(()).await.is_err() {
                self.demand = None;
            }
        }

        match self.batches.recv().await {
            Some(Ok(batch)) => Some(Ok(batch)),
            Some(Err(err)) => {
                self.finish();
                Some(Err(err))
            }
            None => {
                self.finish();
                let parser = self.parser.take()?;
                parser.await.err().map(|err| Err(SourceError::Cancelled(err)))
            }
        }
    }

    /// Turns the pull interface into a [`Stream`]. Each poll grants the parser one batch, so a
    /// consumer that stops polling stops the parser too.
    pub fn into_batches(self) -> impl Stream<Item = Result<RecordBatch, SourceError>> + Send {
        futures_util::stream::unfold(self, |mut records| async move {
            let batch = records.next_batch().await?;
            Some((batch, records))
        })
    }

    fn finish(&mut self) {
        self.finished = true;
        self.demand = None;
    }
}

/// Parser side of the demand protocol
struct BatchEmitter<'a> {
    demand: mpsc::Receiver<()>,
    batches: &'a mpsc::Sender<Result<RecordBatch, SourceError>>,
    batch_size: usize,
    emitted: usize,
    cancelled: bool,
}

impl BatchEmitter<'_> {
    fn wait_for_demand(&mut self) -> bool {
        if self.demand.blocking_recv().is_none() {
            self.cancelled = true;
        }
        !self.cancelled
    }

    fn emit(&mut self, batch: RecordBatch) -> bool {
        let len = batch.len();
        if self.batches.blocking_send(Ok(batch)).is_err() {
            self.cancelled = true;
        } else {
            self.emitted += len;
        }
        !self.cancelled
    }
}

fn parse_records(
    source: &RecordSource,
    demand: mpsc::Receiver<()>,
    batches: &mpsc::Sender<Result<RecordBatch, SourceError>>,
) {
    let file = match fs_err::File::open(&source.path) {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(error = %err, "Failed to open export file");
            let _ = batches.blocking_send(Err(SourceError::Io(err)));
            return;
        }
    };

    let mut emitter = BatchEmitter {
        demand,
        batches,
        batch_size: source.batch_size,
        emitted: 0,
        cancelled: false,
    };

    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
    let result = DocumentSeed {
        emitter: &mut emitter,
    }
    .deserialize(&mut deserializer)
    .and_then(|()| deserializer.end());

    match result {
        Ok(()) => tracing::debug!(records = emitter.emitted, "Finished reading records"),
        Err(_) if emitter.cancelled => {
            tracing::debug!(records = emitter.emitted, "Consumer went away, stopped reading");
        }
        Err(err) => {
            tracing::error!(records = emitter.emitted, error = %err, "Failed to parse export file");
            let _ = batches.blocking_send(Err(SourceError::Parse(err)));
        }
    }
}

/// Visits the top level object, descending only into the data array
struct DocumentSeed<'a, 'e> {
    emitter: &'a mut BatchEmitter<'e>,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an export document")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let emitter = self.emitter;
        let mut seen = false;

        while let Some(key) = map.next_key::<String>()? {
            if !seen && key == DATA_KEY {
                seen = true;
                map.next_value_seed(RecordsSeed {
                    emitter: &mut *emitter,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }

        if !seen {
            tracing::warn!(data_key = DATA_KEY, "Export document has no records array");
        }

        Ok(())
    }
}

/// Visits the data array, emitting a batch whenever one is full and demand allows
struct RecordsSeed<'a, 'e> {
    emitter: &'a mut BatchEmitter<'e>,
}

impl<'de> DeserializeSeed<'de> for RecordsSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for RecordsSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of records")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let emitter = self.emitter;

        loop {
            if !emitter.wait_for_demand() {
                return Err(de::Error::custom("record consumer went away"));
            }

            let mut batch = Vec::with_capacity(emitter.batch_size);
            while batch.len() < emitter.batch_size {
                match seq.next_element::<Value>() {
                    Ok(Some(record)) => batch.push(record),
                    Ok(None) => break,
                    // Records parsed before the error are still handed out
                    Err(err) => {
                        if !batch.is_empty() {
                            emitter.emit(batch);
                        }
                        return Err(err);
                    }
                }
            }

            let exhausted = batch.len() < emitter.batch_size;
            if !batch.is_empty() && !emitter.emit(batch) {
                return Err(de::Error::custom("record consumer went away"));
            }

            if exhausted {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt as _;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use temp_dir::TempDir;
    use test_case::test_case;

    use super::*;

    fn write_export(dir: &TempDir, records: usize) -> PathBuf {
        let data = (0..records)
            .map(|i| json!({"ObjectIdentifier": format!("S-1-5-21-{i}"), "Properties": {"name": format!("USER{i}")}}))
            .collect::<Vec<_>>();
        let document = json!({"data": data, "meta": {"type": "users", "count": records, "version": 4}});

        let path = dir.child("users.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();
        path
    }

    async fn collect_all(stream: RecordStream) -> Vec<Result<RecordBatch, SourceError>> {
        stream.into_batches().collect().await
    }

    #[test_case(0, 200, 0; "empty array")]
    #[test_case(1, 200, 1; "single record")]
    #[test_case(200, 200, 1; "exactly one batch")]
    #[test_case(450, 200, 3; "short tail")]
    #[test_case(5, 1, 5; "batch size one")]
    #[tokio::test]
    async fn test_batches_partition_records(records: usize, batch_size: usize, expected: usize) {
        let dir = TempDir::new().unwrap();
        let path = write_export(&dir, records);

        let batches = collect_all(RecordSource::new(path).with_batch_size(batch_size).into_stream())
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect::<Vec<_>>();

        assert_eq!(batches.len(), expected);
        assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));

        let ids = batches
            .into_iter()
            .flatten()
            .map(|r| r["ObjectIdentifier"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        let expected_ids = (0..records).map(|i| format!("S-1-5-21-{i}")).collect::<Vec<_>>();
        assert_eq!(ids, expected_ids);
    }

    #[test_log::test(tokio::test)]
    async fn test_slow_consumer_sees_the_same_records() {
        let dir = TempDir::new().unwrap();
        let path = write_export(&dir, 37);

        let fast = collect_all(RecordSource::new(&path).with_batch_size(5).into_stream())
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect::<Vec<_>>();

        let mut slow = Vec::new();
        let mut stream = RecordSource::new(&path).with_batch_size(5).into_stream();
        while let Some(batch) = stream.next_batch().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
            slow.push(batch.unwrap());
        }

        assert_eq!(fast, slow);
    }

    #[test_log::test(tokio::test)]
    async fn test_other_keys_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("export.json");
        std::fs::write(
            &path,
            r#"{"meta":{"type":"users","count":2,"version":4},"extra":{"data":[9]},"data":[{"a":1},{"a":2}],"trailer":[1,2,3]}"#,
        )
        .unwrap();

        let batches = collect_all(RecordSource::new(path).into_stream()).await;

        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches.into_iter().next().unwrap().unwrap(),
            vec![json!({"a": 1}), json!({"a": 2})]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_data_key_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("export.json");
        std::fs::write(&path, r#"{"meta":{"type":"users","count":0,"version":4}}"#).unwrap();

        assert!(collect_all(RecordSource::new(path).into_stream()).await.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_json_errors_exactly_once_after_good_batches() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("broken.json");
        std::fs::write(&path, r#"{"data":[{"a":1},{"a":2},{"a":3},{"a":"#).unwrap();

        let mut stream = RecordSource::new(path).with_batch_size(2).into_stream();

        assert_eq!(stream.next_batch().await.unwrap().unwrap().len(), 2);
        assert_eq!(
            stream.next_batch().await.unwrap().unwrap(),
            vec![json!({"a": 3})]
        );
        assert!(matches!(
            stream.next_batch().await,
            Some(Err(SourceError::Parse(_)))
        ));
        assert!(stream.next_batch().await.is_none());
        assert!(stream.next_batch().await.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_records_before_a_malformed_one_are_handed_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("truncated.json");
        let valid = (0..5).map(|i| format!(r#"{{"a":{i}}}"#)).collect::<Vec<_>>();
        std::fs::write(&path, format!(r#"{{"data":[{},{{"a":]}}"#, valid.join(","))).unwrap();

        let mut stream = RecordSource::new(path).with_batch_size(200).into_stream();

        let batch = stream.next_batch().await.unwrap().unwrap();
        assert_eq!(batch, (0..5).map(|i| json!({"a": i})).collect::<Vec<_>>());
        assert!(matches!(
            stream.next_batch().await,
            Some(Err(SourceError::Parse(_)))
        ));
        assert!(stream.next_batch().await.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_data_that_is_not_an_array_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("object.json");
        std::fs::write(&path, r#"{"data":{"a":1}}"#).unwrap();

        let batches = collect_all(RecordSource::new(path).into_stream()).await;

        assert_eq!(batches.len(), 1);
        assert!(matches!(batches[0], Err(SourceError::Parse(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();

        let batches = collect_all(RecordSource::new(dir.child("nope.json")).into_stream()).await;

        assert_eq!(batches.len(), 1);
        assert!(matches!(batches[0], Err(SourceError::Io(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_dropping_the_stream_stops_the_parser() {
        let dir = TempDir::new().unwrap();
        let path = write_export(&dir, 1000);

        let mut stream = RecordSource::new(path).with_batch_size(10).into_stream();
        assert_eq!(stream.next_batch().await.unwrap().unwrap().len(), 10);

        let parser = stream.parser.take().unwrap();
        drop(stream);

        tokio::time::timeout(Duration::from_secs(5), parser)
            .await
            .unwrap()
            .unwrap();
    }
}
