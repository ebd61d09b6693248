//! Single-placement maintenance of the association index.
//!
//! Callers that edit a page's widget configuration go through here. Every operation is a
//! short sequence of atomic store calls; "nothing to delete" is success, and only a missing
//! site during row creation is an error.

use std::sync::Arc;

use crate::directory::{IdGenerator, SiteDirectory};
use crate::error::{IndexError, Result};
use crate::store::AssociationStore;
use crate::types::{AssociationRecord, PlacementKey};

#[derive(Clone)]
pub struct AssociationUpdater {
    store: Arc<dyn AssociationStore>,
    sites: Arc<dyn SiteDirectory>,
    ids: Arc<dyn IdGenerator>,
}

impl AssociationUpdater {
    #[must_use]
    pub fn new(
        store: Arc<dyn AssociationStore>,
        sites: Arc<dyn SiteDirectory>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self { store, sites, ids }
    }

    #[must_use]
    pub fn store(&self) -> &dyn AssociationStore {
        &*self.store
    }

    #[must_use]
    pub fn sites(&self) -> &dyn SiteDirectory {
        &*self.sites
    }

    /// Remove every row at `key`.
    pub fn delete_for_placement(&self, key: &PlacementKey) -> Result<usize> {
        self.store.remove_by_placement(key)
    }

    /// Remove the `(key, article_id)` row if present.
    pub fn delete_for_placement_and_article(
        &self,
        key: &PlacementKey,
        article_id: &str,
    ) -> Result<bool> {
        match self.store.fetch_by_placement_article(key, article_id)? {
            Some(row) => Ok(self.store.remove(row.id)?.is_some()),
            None => Ok(false),
        }
    }

    /// Remove every placement of `article_id` within a site.
    pub fn delete_all_for_article_in_group(&self, group_id: u64, article_id: &str) -> Result<usize> {
        let rows = self.store.find_by_group_article(group_id, article_id)?;
        self.remove_rows(rows)
    }

    /// Remove every row on one page, used when the page is deleted.
    pub fn delete_all_for_layout(
        &self,
        group_id: u64,
        private_layout: bool,
        layout_id: u64,
    ) -> Result<usize> {
        let rows = self.store.find_by_layout(group_id, private_layout, layout_id)?;
        self.remove_rows(rows)
    }

    /// Remove every row of a site's public or private layout set.
    pub fn delete_all_for_owner_scope(&self, group_id: u64, private_layout: bool) -> Result<usize> {
        let rows = self.store.find_by_owner(group_id, private_layout)?;
        self.remove_rows(rows)
    }

    fn remove_rows(&self, rows: Vec<AssociationRecord>) -> Result<usize> {
        let mut removed = 0;
        for row in rows {
            if self.store.remove(row.id)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Ensure a `(key, article_id)` row exists, keeping any other rows at `key`.
    pub fn upsert(&self, key: &PlacementKey, article_id: &str) -> Result<AssociationRecord> {
        self.upsert_with_purge(key, article_id, false)
    }

    /// Ensure a `(key, article_id)` row exists. With `purge`, every row at `key` is removed
    /// first, so the placement ends up mapped to `article_id` alone.
    pub fn upsert_with_purge(
        &self,
        key: &PlacementKey,
        article_id: &str,
        purge: bool,
    ) -> Result<AssociationRecord> {
        if purge {
            let company_id = self.company_of(key.group_id)?;
            let purged = self.store.remove_by_placement(key)?;
            tracing::debug!(
                placement.group_id = key.group_id,
                placement.layout_id = key.layout_id,
                placement.portlet_id = %key.portlet_id,
                purged,
                "purged placement before upsert"
            );
            return self.ensure(key, company_id, article_id).map(|(row, _)| row);
        }

        if let Some(existing) = self.store.fetch_by_placement_article(key, article_id)? {
            return Ok(existing);
        }
        let company_id = self.company_of(key.group_id)?;
        self.ensure(key, company_id, article_id).map(|(row, _)| row)
    }

    /// Replace the whole association set at `key` with `article_ids`, in order.
    ///
    /// The site is resolved before anything is removed, so `SiteNotFound` leaves the
    /// placement as it was.
    pub fn upsert_set<S: AsRef<str>>(
        &self,
        key: &PlacementKey,
        article_ids: &[S],
    ) -> Result<Vec<AssociationRecord>> {
        let company_id = self.company_of(key.group_id)?;
        self.store.remove_by_placement(key)?;
        article_ids
            .iter()
            .map(|article_id| {
                self.ensure(key, company_id, article_id.as_ref())
                    .map(|(row, _)| row)
            })
            .collect()
    }

    fn company_of(&self, group_id: u64) -> Result<u64> {
        self.sites
            .fetch_site(group_id)?
            .map(|site| site.company_id)
            .ok_or(IndexError::SiteNotFound { group_id })
    }

    /// Fetch-or-create under a known company. The flag is `true` when a row was created.
    pub(crate) fn ensure(
        &self,
        key: &PlacementKey,
        company_id: u64,
        article_id: &str,
    ) -> Result<(AssociationRecord, bool)> {
        if let Some(existing) = self.store.fetch_by_placement_article(key, article_id)? {
            return Ok((existing, false));
        }
        let id = self.ids.next_id()?;
        let record = self.store.create(id).bind(key, company_id, article_id);
        match self.store.update(record) {
            Ok(created) => Ok((created, true)),
            // Lost a race with a concurrent writer for the same tuple.
            Err(IndexError::DuplicateAssociation { existing_id, .. }) => self
                .store
                .fetch(existing_id)?
                .map(|row| (row, false))
                .ok_or_else(|| IndexError::source("association store", "duplicate row vanished")),
            Err(err) => Err(err),
        }
    }

    pub fn find_all(&self) -> Result<Vec<AssociationRecord>> {
        self.store.find_all()
    }

    pub fn find_by_placement(&self, key: &PlacementKey) -> Result<Vec<AssociationRecord>> {
        self.store.find_by_placement(key)
    }

    pub fn find_by_group_article(
        &self,
        group_id: u64,
        article_id: &str,
    ) -> Result<Vec<AssociationRecord>> {
        self.store.find_by_group_article(group_id, article_id)
    }

    pub fn find_by_article(&self, article_id: &str) -> Result<Vec<AssociationRecord>> {
        self.store.find_by_article(article_id)
    }

    pub fn find_by_portlet(&self, portlet_id: &str) -> Result<Vec<AssociationRecord>> {
        self.store.find_by_portlet(portlet_id)
    }

    /// Pages of a layout set that display `article_id`.
    pub fn layout_ids(
        &self,
        group_id: u64,
        private_layout: bool,
        article_id: &str,
    ) -> Result<Vec<u64>> {
        Ok(self
            .store
            .find_by_group_privacy_article(group_id, private_layout, article_id)?
            .into_iter()
            .map(|row| row.layout_id)
            .collect())
    }

    pub fn layout_ids_count(
        &self,
        group_id: u64,
        private_layout: bool,
        article_id: &str,
    ) -> Result<usize> {
        self.store
            .count_by_group_privacy_article(group_id, private_layout, article_id)
    }

    /// Placements of `article_id` across every site.
    pub fn layout_ids_count_for_article(&self, article_id: &str) -> Result<usize> {
        self.store.count_by_article(article_id)
    }
}
