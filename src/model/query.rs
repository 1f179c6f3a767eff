//! Wire types of the downstream query API.
//!
//! The query engine itself lives in the serving layer; these types pin down
//! the request/response contract it shares with the registry.

use serde::{Deserialize, Serialize};

use crate::sources::provenance::SourceKind;

pub const DEFAULT_PER_PAGE: u64 = 100;

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

/// Query string parameters accepted by the serving layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub ignore: String,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub file_path: String,
    #[serde(default)]
    pub host: String,
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub reverse: bool,
}

/// One matched line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineResult {
    pub line_number: u64,
    pub content: String,
}

/// Response echoing the selected registry entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResponse {
    pub result: Vec<LineResult>,
    pub total: u64,
    pub file_path: String,
    pub host: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}
