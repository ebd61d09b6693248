//! Tunable options for scans, sweeps and the durable journal.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COMPACT_AFTER, DEFAULT_SCAN_BATCH_SIZE};
use crate::error::{IndexError, Result};

fn default_true() -> bool {
    true
}

fn default_scan_batch_size() -> usize {
    DEFAULT_SCAN_BATCH_SIZE
}

fn default_compact_after() -> u64 {
    DEFAULT_COMPACT_AFTER
}

/// What the sweep does when an extractor reports no selected content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContentPolicy {
    /// Record the placement with an empty article id.
    #[default]
    Record,
    /// Treat the placement like one without an extractor.
    Skip,
}

/// How much of the existing index the prune pass removes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// Remove rows of ineligible sites only.
    #[default]
    Prune,
    /// Remove every row of the company, then rebuild from the layout tree.
    Rebuild,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalOptions {
    /// fsync after every appended entry.
    #[serde(default = "default_true")]
    pub sync_each_append: bool,
    /// Compact once this many entries were appended since the last compaction. 0 disables.
    #[serde(default = "default_compact_after")]
    pub compact_after: u64,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self {
            sync_each_append: true,
            compact_after: DEFAULT_COMPACT_AFTER,
        }
    }
}

/// Options shared by the updater, the sweeper, and the journaled store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexOptions {
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
    #[serde(default)]
    pub empty_content: EmptyContentPolicy,
    #[serde(default)]
    pub sweep_mode: SweepMode,
    #[serde(default)]
    pub journal: JournalOptions,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            empty_content: EmptyContentPolicy::default(),
            sweep_mode: SweepMode::default(),
            journal: JournalOptions::default(),
        }
    }
}

impl IndexOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_batch_size == 0 {
            return Err(IndexError::InvalidOptions {
                reason: "scan_batch_size must be non-zero".into(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn with_scan_batch_size(mut self, scan_batch_size: usize) -> Self {
        self.scan_batch_size = scan_batch_size;
        self
    }

    #[must_use]
    pub fn with_empty_content(mut self, policy: EmptyContentPolicy) -> Self {
        self.empty_content = policy;
        self
    }

    #[must_use]
    pub fn with_sweep_mode(mut self, mode: SweepMode) -> Self {
        self.sweep_mode = mode;
        self
    }

    #[must_use]
    pub fn with_journal(mut self, journal: JournalOptions) -> Self {
        self.journal = journal;
        self
    }
}
