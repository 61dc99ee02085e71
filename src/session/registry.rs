//! The error registry written by `analyze`.

use super::write_pretty;
use crate::core::errors::{Error, Result};
use crate::core::{Dialect, ErrorRecord};
use crate::parser::{describe_code, ErrorStatistics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeCount {
    pub code: String,
    pub count: usize,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRegistry {
    pub timestamp: DateTime<Utc>,
    pub dialect: Dialect,
    pub total: usize,
    pub by_code: Vec<CodeCount>,
    pub errors: Vec<ErrorRecord>,
}

impl ErrorRegistry {
    pub fn from_records(dialect: Dialect, records: &[ErrorRecord]) -> Self {
        let stats = ErrorStatistics::from_records(records);
        let by_code = stats
            .by_code
            .iter()
            .map(|(code, count)| CodeCount {
                code: code.clone(),
                count: *count,
                description: describe_code(code).to_string(),
            })
            .collect();
        Self {
            timestamp: Utc::now(),
            dialect,
            total: stats.total,
            by_code,
            errors: records.to_vec(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_pretty(path, self)
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|e| Error::file_system("Failed to read registry", path, e))?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}
