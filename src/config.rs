//! Per-document configuration
//!
//! Values are passed to [`Document::with_config`](crate::Document::with_config) explicitly;
//! there is no process-wide settings table.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DocConfig {
    /// Tab width, carried for collaborators that compute columns
    #[serde(default = "default_tab_size")]
    pub tab_size: usize,
    /// Lines per slice on the first [`process_batched`](crate::Document::process_batched) call
    #[serde(default = "default_batch_lines")]
    pub batch_lines: usize,
    /// Maximum concurrent readers before new readers block
    #[serde(default = "default_max_readers")]
    pub max_readers: usize,
    /// Compound edits kept on the undo stack
    #[serde(default = "default_undo_limit")]
    pub undo_limit: usize,
    /// Lock acquire timeout; `None` waits forever
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
    /// Initial gap capacity in bytes
    #[serde(default = "default_initial_gap")]
    pub initial_gap: usize,
}

impl Default for DocConfig {
    fn default() -> Self {
        Self {
            tab_size: default_tab_size(),
            batch_lines: default_batch_lines(),
            max_readers: default_max_readers(),
            undo_limit: default_undo_limit(),
            lock_timeout_ms: None,
            initial_gap: default_initial_gap(),
        }
    }
}

impl DocConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

fn default_tab_size() -> usize {
    4
}

fn default_batch_lines() -> usize {
    1000
}

fn default_max_readers() -> usize {
    32
}

fn default_undo_limit() -> usize {
    100
}

fn default_initial_gap() -> usize {
    64
}
