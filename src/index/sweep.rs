//! Company-wide reconciliation of the association index.
//!
//! A sweep runs two passes. The prune pass drops rows that belong to sites which may no
//! longer hold associations. The rebuild pass walks every page of the company and ensures a
//! row exists for each placement whose widget type has a registered extractor. Both passes
//! page through their inputs with [`scan`](crate::store::scan), so memory stays bounded by
//! the batch size.
//!
//! The sweep never takes a lock across rows. Concurrent updater calls may interleave with
//! it; at worst a row is created twice over and the store's uniqueness check turns the
//! second attempt into a no-op.

use std::sync::Arc;
use std::time::Instant;

use crate::constants::PREFS_OWNER_ID_DEFAULT;
use crate::directory::{LayoutSource, PreferenceSource};
use crate::eligibility::{eligibility, is_eligible};
use crate::error::Result;
use crate::registry::ExtractorRegistry;
use crate::store::{scan, scan_records};
use crate::types::{
    AssociationRecord, EmptyContentPolicy, IndexOptions, Layout, OwnerType, PlacementKey,
    SweepMode, SweepReport, root_portlet_id,
};

use super::updater::AssociationUpdater;

#[derive(Clone)]
pub struct Sweeper {
    updater: AssociationUpdater,
    layouts: Arc<dyn LayoutSource>,
    preferences: Arc<dyn PreferenceSource>,
    extractors: Arc<ExtractorRegistry>,
    options: IndexOptions,
}

impl Sweeper {
    #[must_use]
    pub fn new(
        updater: AssociationUpdater,
        layouts: Arc<dyn LayoutSource>,
        preferences: Arc<dyn PreferenceSource>,
        extractors: Arc<ExtractorRegistry>,
        options: IndexOptions,
    ) -> Self {
        Self {
            updater,
            layouts,
            preferences,
            extractors,
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Bring the index for `company_id` in line with the current page tree.
    ///
    /// The first error aborts the sweep and is returned as is. Rows already pruned or
    /// created before the failure stay that way; running the sweep again converges.
    pub fn reconcile(&self, company_id: u64) -> Result<SweepReport> {
        log::info!("Checking content associations for company {company_id}");
        let started = Instant::now();
        let mut report = SweepReport::new(company_id);

        report.pruned = self.prune(company_id)?;
        self.rebuild(company_id, &mut report)?;

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            sweep.company_id = company_id,
            sweep.pruned = report.pruned,
            sweep.layouts = report.layouts_scanned,
            sweep.layouts_skipped = report.layouts_skipped,
            sweep.placements = report.placements_scanned,
            sweep.created = report.associations_created,
            sweep.existing = report.associations_existing,
            sweep.duration_ms = report.duration_ms,
            "content association sweep finished"
        );
        Ok(report)
    }

    fn prune(&self, company_id: u64) -> Result<u64> {
        let store = self.updater.store();
        let sites = self.updater.sites();
        let mode = self.options.sweep_mode;
        let mut pruned = 0u64;

        scan_records(
            store,
            self.options.scan_batch_size,
            &|record: &AssociationRecord| record.company_id == company_id,
            |record| {
                let remove = match mode {
                    SweepMode::Rebuild => true,
                    SweepMode::Prune => !is_eligible(sites, record.group_id)?,
                };
                if remove && store.remove(record.id)?.is_some() {
                    pruned += 1;
                    tracing::debug!(
                        association.id = record.id,
                        association.group_id = record.group_id,
                        "pruned association"
                    );
                }
                Ok(())
            },
        )?;
        Ok(pruned)
    }

    fn rebuild(&self, company_id: u64, report: &mut SweepReport) -> Result<()> {
        scan(
            self.options.scan_batch_size,
            |after, limit| self.layouts.layouts_after(company_id, after, limit),
            |layout| self.rebuild_layout(company_id, &layout, report),
        )?;
        Ok(())
    }

    fn rebuild_layout(
        &self,
        company_id: u64,
        layout: &Layout,
        report: &mut SweepReport,
    ) -> Result<()> {
        report.layouts_scanned += 1;

        let site = eligibility(self.updater.sites(), layout.group_id)?;
        if !site.is_eligible() {
            report.layouts_skipped += 1;
            tracing::trace!(
                layout.plid = layout.plid,
                layout.group_id = layout.group_id,
                reason = site.label(),
                "skipping layout"
            );
            return Ok(());
        }

        for portlet_id in &layout.portlet_ids {
            report.placements_scanned += 1;

            let Some(extractor) = self.extractors.lookup(root_portlet_id(portlet_id))? else {
                report.placements_unregistered += 1;
                continue;
            };

            let preferences = self.preferences.preferences(
                layout.company_id,
                PREFS_OWNER_ID_DEFAULT,
                OwnerType::Layout,
                layout.plid,
                portlet_id,
            )?;

            let article_id = match extractor.extract(&preferences) {
                Some(article_id) => article_id,
                None if self.options.empty_content == EmptyContentPolicy::Skip => {
                    report.empty_content_skipped += 1;
                    continue;
                }
                None => String::new(),
            };

            let key = PlacementKey::new(
                layout.group_id,
                layout.private_layout,
                layout.layout_id,
                portlet_id.as_str(),
            );
            let (_, created) = self.updater.ensure(&key, company_id, &article_id)?;
            if created {
                report.associations_created += 1;
            } else {
                report.associations_existing += 1;
            }
        }
        Ok(())
    }
}
