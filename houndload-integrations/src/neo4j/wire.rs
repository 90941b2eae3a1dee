//! Request and response bodies of the query API
use houndload_core::{Params, QueryCounters, QueryResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct QueryRequest<'a> {
    pub statement: &'a str,
    pub parameters: &'a Params,
    pub include_counters: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub bookmarks: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct QueryResponse {
    pub data: QueryData,
    pub counters: QueryCounters,
    pub bookmarks: Vec<String>,
    pub errors: Vec<ServerError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct QueryData {
    pub fields: Vec<String>,
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ServerError {
    pub code: String,
    pub message: String,
}

impl QueryResponse {
    pub fn into_result(self) -> QueryResult {
        QueryResult {
            columns: self.data.fields,
            rows: self.data.values,
            counters: self.counters,
        }
    }
}
