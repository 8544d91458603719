//! Operator configuration.
//!
//! Loaded from JSON; every field is optional and falls back to its default.
//!
//! ```
//! use quarry_core::config::DdlConfig;
//!
//! let config = DdlConfig::from_json_str(r#"{ "index_immediate_effect": true }"#).unwrap();
//! assert!(config.index_immediate_effect);
//! assert_eq!(config.confirm_retry.max_attempts, 50);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{ColumnId, DEFAULT_MAX_RESERVED_TABLE_ID, DEFAULT_MIN_USER_COLUMN_ID, TableId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdlConfig {
    /// Highest table id reserved for system tables. Allocated ids must exceed it.
    pub max_reserved_table_id: TableId,
    /// Tables with an id below this value cannot be altered.
    pub min_alterable_table_id: TableId,
    /// A stored table whose column high-water-mark is below this is malformed.
    pub min_user_column_id: ColumnId,
    /// Create tablets for secondary index tables at creation time.
    pub index_immediate_effect: bool,
    /// Polling policy for the post-create name lookup.
    pub confirm_retry: RetryPolicy,
}

impl Default for DdlConfig {
    fn default() -> Self {
        Self {
            max_reserved_table_id: DEFAULT_MAX_RESERVED_TABLE_ID,
            min_alterable_table_id: DEFAULT_MAX_RESERVED_TABLE_ID,
            min_user_column_id: DEFAULT_MIN_USER_COLUMN_ID,
            index_immediate_effect: false,
            confirm_retry: RetryPolicy::default(),
        }
    }
}

impl DdlConfig {
    pub fn from_json_str(s: &str) -> Result<Self, StoreError> {
        serde_json::from_str(s)
            .map_err(|e| StoreError::Corrupted(format!("invalid DDL config: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Bounded retry with an optional fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms))
    }
}
