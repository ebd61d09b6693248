//! In-memory association table with ordered secondary indexes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{AssociationStore, RecordFilter};
use crate::error::{IndexError, Result};
use crate::types::{AssociationId, AssociationRecord, PlacementKey};

// (group, private, layout, portlet, article, id)
type PlacementEntry = (u64, bool, u64, String, String, AssociationId);
// (group, article, private, id)
type GroupArticleEntry = (u64, String, bool, AssociationId);

#[derive(Debug, Default)]
struct Tables {
    rows: BTreeMap<AssociationId, AssociationRecord>,
    by_placement: BTreeSet<PlacementEntry>,
    by_group_article: BTreeSet<GroupArticleEntry>,
    by_article: BTreeSet<(String, AssociationId)>,
    by_portlet: BTreeSet<(String, AssociationId)>,
    high_water: AssociationId,
}

impl Tables {
    fn index(&mut self, row: &AssociationRecord) {
        self.by_placement.insert(placement_entry(row));
        self.by_group_article.insert((
            row.group_id,
            row.article_id.clone(),
            row.private_layout,
            row.id,
        ));
        self.by_article.insert((row.article_id.clone(), row.id));
        self.by_portlet.insert((row.portlet_id.clone(), row.id));
    }

    fn unindex(&mut self, row: &AssociationRecord) {
        self.by_placement.remove(&placement_entry(row));
        self.by_group_article.remove(&(
            row.group_id,
            row.article_id.clone(),
            row.private_layout,
            row.id,
        ));
        self.by_article.remove(&(row.article_id.clone(), row.id));
        self.by_portlet.remove(&(row.portlet_id.clone(), row.id));
    }

    fn rows_for<'a>(&self, ids: impl Iterator<Item = &'a AssociationId>) -> Vec<AssociationRecord> {
        ids.filter_map(|id| self.rows.get(id)).cloned().collect()
    }

    /// Ids under a `(group, private, layout?, portlet?, article?)` prefix of the placement index.
    fn placement_ids(
        &self,
        group_id: u64,
        private_layout: bool,
        layout_id: Option<u64>,
        portlet_id: Option<&str>,
        article_id: Option<&str>,
    ) -> Vec<AssociationId> {
        let lower: PlacementEntry = (
            group_id,
            private_layout,
            layout_id.unwrap_or(0),
            portlet_id.unwrap_or_default().to_string(),
            article_id.unwrap_or_default().to_string(),
            0,
        );
        self.by_placement
            .range(lower..)
            .take_while(|(g, p, l, portlet, article, _)| {
                *g == group_id
                    && *p == private_layout
                    && layout_id.is_none_or(|layout_id| *l == layout_id)
                    && portlet_id.is_none_or(|portlet_id| portlet == portlet_id)
                    && article_id.is_none_or(|article_id| article == article_id)
            })
            .map(|entry| entry.5)
            .collect()
    }

    fn group_article_ids(
        &self,
        group_id: u64,
        article_id: &str,
        private_layout: Option<bool>,
    ) -> Vec<AssociationId> {
        let lower: GroupArticleEntry = (
            group_id,
            article_id.to_string(),
            private_layout.unwrap_or(false),
            0,
        );
        self.by_group_article
            .range(lower..)
            .take_while(|(g, a, p, _)| {
                *g == group_id
                    && a == article_id
                    && private_layout.is_none_or(|private_layout| *p == private_layout)
            })
            .map(|entry| entry.3)
            .collect()
    }
}

fn placement_entry(row: &AssociationRecord) -> PlacementEntry {
    (
        row.group_id,
        row.private_layout,
        row.layout_id,
        row.portlet_id.clone(),
        row.article_id.clone(),
        row.id,
    )
}

fn keyed_ids(index: &BTreeSet<(String, AssociationId)>, key: &str) -> Vec<AssociationId> {
    index
        .range((key.to_string(), 0)..)
        .take_while(|(k, _)| k == key)
        .map(|(_, id)| *id)
        .collect()
}

/// Association table kept entirely in memory.
///
/// Every lookup pattern is served by an ordered index keyed on the pattern's prefix, so no
/// query scans the full table except `find_all` and `scan_batch`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| IndexError::Lock("association table lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| IndexError::Lock("association table lock poisoned".into()))
    }

    /// Reject `record` when another row already owns its `(placement, article)` tuple.
    pub(crate) fn check_unique(&self, record: &AssociationRecord) -> Result<()> {
        let tables = self.read()?;
        check_unique(&tables, record)
    }

    /// Raise the high-water id without storing a row (used when replaying removals).
    pub(crate) fn observe_id(&self, id: AssociationId) -> Result<()> {
        let mut tables = self.write()?;
        tables.high_water = tables.high_water.max(id);
        Ok(())
    }
}

fn check_unique(tables: &Tables, record: &AssociationRecord) -> Result<()> {
    let owners = tables.placement_ids(
        record.group_id,
        record.private_layout,
        Some(record.layout_id),
        Some(&record.portlet_id),
        Some(&record.article_id),
    );
    match owners.into_iter().find(|id| *id != record.id) {
        Some(existing_id) => Err(IndexError::DuplicateAssociation {
            group_id: record.group_id,
            layout_id: record.layout_id,
            portlet_id: record.portlet_id.clone(),
            article_id: record.article_id.clone(),
            existing_id,
        }),
        None => Ok(()),
    }
}

impl AssociationStore for MemoryStore {
    fn update(&self, record: AssociationRecord) -> Result<AssociationRecord> {
        let mut tables = self.write()?;
        check_unique(&tables, &record)?;
        if let Some(previous) = tables.rows.remove(&record.id) {
            tables.unindex(&previous);
        }
        tables.index(&record);
        tables.high_water = tables.high_water.max(record.id);
        tables.rows.insert(record.id, record.clone());
        Ok(record)
    }

    fn remove(&self, id: AssociationId) -> Result<Option<AssociationRecord>> {
        let mut tables = self.write()?;
        let removed = tables.rows.remove(&id);
        if let Some(row) = &removed {
            tables.unindex(row);
        }
        Ok(removed)
    }

    fn fetch(&self, id: AssociationId) -> Result<Option<AssociationRecord>> {
        Ok(self.read()?.rows.get(&id).cloned())
    }

    fn fetch_by_placement_article(
        &self,
        key: &PlacementKey,
        article_id: &str,
    ) -> Result<Option<AssociationRecord>> {
        let tables = self.read()?;
        let ids = tables.placement_ids(
            key.group_id,
            key.private_layout,
            Some(key.layout_id),
            Some(&key.portlet_id),
            Some(article_id),
        );
        Ok(tables.rows_for(ids.iter()).into_iter().next())
    }

    fn find_by_placement(&self, key: &PlacementKey) -> Result<Vec<AssociationRecord>> {
        let tables = self.read()?;
        let ids = tables.placement_ids(
            key.group_id,
            key.private_layout,
            Some(key.layout_id),
            Some(&key.portlet_id),
            None,
        );
        Ok(tables.rows_for(ids.iter()))
    }

    fn find_by_group_article(
        &self,
        group_id: u64,
        article_id: &str,
    ) -> Result<Vec<AssociationRecord>> {
        let tables = self.read()?;
        let ids = tables.group_article_ids(group_id, article_id, None);
        Ok(tables.rows_for(ids.iter()))
    }

    fn find_by_group_privacy_article(
        &self,
        group_id: u64,
        private_layout: bool,
        article_id: &str,
    ) -> Result<Vec<AssociationRecord>> {
        let tables = self.read()?;
        let ids = tables.group_article_ids(group_id, article_id, Some(private_layout));
        Ok(tables.rows_for(ids.iter()))
    }

    fn count_by_group_privacy_article(
        &self,
        group_id: u64,
        private_layout: bool,
        article_id: &str,
    ) -> Result<usize> {
        Ok(self
            .read()?
            .group_article_ids(group_id, article_id, Some(private_layout))
            .len())
    }

    fn find_by_article(&self, article_id: &str) -> Result<Vec<AssociationRecord>> {
        let tables = self.read()?;
        let ids = keyed_ids(&tables.by_article, article_id);
        Ok(tables.rows_for(ids.iter()))
    }

    fn count_by_article(&self, article_id: &str) -> Result<usize> {
        Ok(keyed_ids(&self.read()?.by_article, article_id).len())
    }

    fn find_by_layout(
        &self,
        group_id: u64,
        private_layout: bool,
        layout_id: u64,
    ) -> Result<Vec<AssociationRecord>> {
        let tables = self.read()?;
        let ids = tables.placement_ids(group_id, private_layout, Some(layout_id), None, None);
        Ok(tables.rows_for(ids.iter()))
    }

    fn find_by_owner(&self, group_id: u64, private_layout: bool) -> Result<Vec<AssociationRecord>> {
        let tables = self.read()?;
        let ids = tables.placement_ids(group_id, private_layout, None, None, None);
        Ok(tables.rows_for(ids.iter()))
    }

    fn find_by_portlet(&self, portlet_id: &str) -> Result<Vec<AssociationRecord>> {
        let tables = self.read()?;
        let ids = keyed_ids(&tables.by_portlet, portlet_id);
        Ok(tables.rows_for(ids.iter()))
    }

    fn find_all(&self) -> Result<Vec<AssociationRecord>> {
        Ok(self.read()?.rows.values().cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read()?.rows.len())
    }

    fn max_id(&self) -> Result<AssociationId> {
        Ok(self.read()?.high_water)
    }

    fn scan_batch(
        &self,
        after: Option<AssociationId>,
        limit: usize,
        filter: RecordFilter<'_>,
    ) -> Result<Vec<AssociationRecord>> {
        let tables = self.read()?;
        let start = after.map_or(0, |after| after.saturating_add(1));
        Ok(tables
            .rows
            .range(start..)
            .map(|(_, row)| row)
            .filter(|row| filter(row))
            .take(limit)
            .cloned()
            .collect())
    }
}
