use std::fmt;

use serde::{Deserialize, Serialize};

pub const QUESTIONS_COLUMN: &str = "questions";
pub const ANSWERS_COLUMN: &str = "answers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEmbeddingRow {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingDescriptor {
    pub provider: String,
    pub model_id: String,
    pub dimensions: usize,
    pub encoding: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Current,
    Refreshed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunReport {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub dataset_path: String,
    pub db_path: String,
    pub fingerprint: Fingerprint,
    pub status: SyncStatus,
    pub row_count: usize,
    pub rows_written: usize,
    pub provider: String,
    pub model_id: String,
    pub dimensions: usize,
    pub hash_check_policy: String,
    pub duration_ms: u128,
}
