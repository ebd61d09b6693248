//! Outcome of a reconciliation sweep.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub company_id: u64,
    /// Rows deleted by the prune pass.
    pub pruned: u64,
    pub layouts_scanned: u64,
    /// Layouts whose site was ineligible.
    pub layouts_skipped: u64,
    pub placements_scanned: u64,
    /// Placements whose widget type has no registered extractor.
    pub placements_unregistered: u64,
    /// Placements with no selected content, dropped under `EmptyContentPolicy::Skip`.
    pub empty_content_skipped: u64,
    pub associations_created: u64,
    pub associations_existing: u64,
    pub duration_ms: u64,
}

impl SweepReport {
    #[must_use]
    pub fn new(company_id: u64) -> Self {
        Self {
            company_id,
            ..Self::default()
        }
    }

    /// Rows the rebuild pass ensured are present.
    #[must_use]
    pub fn associations_total(&self) -> u64 {
        self.associations_created + self.associations_existing
    }
}
