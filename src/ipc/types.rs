use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::history::HistoryStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub history: HistoryStore,
    /// Last issued time-derived class id, so ids stay unique when several
    /// extractions land in the same millisecond.
    pub last_class_stamp: i64,
}
