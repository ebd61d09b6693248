//! Durable association store: an in-memory table replayed from, and mirrored to, a journal.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{AssociationStore, MemoryStore, RecordFilter};
use crate::error::{IndexError, Result};
use crate::io::{Journal, JournalOp, JournalStats};
use crate::types::{AssociationId, AssociationRecord, JournalOptions, PlacementKey};

/// Every mutation is appended to the journal before it becomes visible in memory, and
/// writers are serialized on the journal so replay order matches apply order.
#[derive(Debug)]
pub struct JournaledStore {
    memory: MemoryStore,
    journal: Mutex<Journal>,
}

impl JournaledStore {
    pub fn open<P: AsRef<Path>>(path: P, options: JournalOptions) -> Result<Self> {
        let (journal, ops) = Journal::open(path.as_ref(), options)?;
        let memory = MemoryStore::new();
        let replayed = ops.len();
        for op in ops {
            match op {
                JournalOp::Put(record) => {
                    memory.update(record)?;
                }
                JournalOp::Remove(id) => {
                    memory.observe_id(id)?;
                    memory.remove(id)?;
                }
                JournalOp::Reserve(id) => memory.observe_id(id)?,
            }
        }
        tracing::info!(
            store.path = %path.as_ref().display(),
            store.replayed = replayed,
            store.rows = memory.count()?,
            "journaled store opened"
        );
        Ok(Self {
            memory,
            journal: Mutex::new(journal),
        })
    }

    fn journal(&self) -> Result<MutexGuard<'_, Journal>> {
        self.journal
            .lock()
            .map_err(|_| IndexError::Lock("journal mutex poisoned".into()))
    }

    /// Rewrite the journal so it holds exactly the live rows.
    pub fn compact(&self) -> Result<()> {
        let mut journal = self.journal()?;
        self.compact_locked(&mut journal)
    }

    fn compact_locked(&self, journal: &mut Journal) -> Result<()> {
        let rows = self.memory.find_all()?;
        journal.compact(self.memory.max_id()?, &rows)
    }

    /// Compaction after a committed write. A failure here leaves the uncompacted journal in
    /// place and is retried on the next write; the write itself has already succeeded.
    fn maybe_compact(&self, journal: &mut Journal) {
        if !journal.should_compact() {
            return;
        }
        if let Err(err) = self.compact_locked(journal) {
            tracing::warn!(
                journal.path = %journal.path().display(),
                error = %err,
                "journal compaction failed; keeping uncompacted journal"
            );
        }
    }

    pub fn stats(&self) -> Result<JournalStats> {
        Ok(self.journal()?.stats())
    }
}

impl AssociationStore for JournaledStore {
    fn update(&self, record: AssociationRecord) -> Result<AssociationRecord> {
        let mut journal = self.journal()?;
        self.memory.check_unique(&record)?;
        journal.append(&JournalOp::Put(record.clone()))?;
        let stored = self.memory.update(record)?;
        self.maybe_compact(&mut journal);
        Ok(stored)
    }

    fn remove(&self, id: AssociationId) -> Result<Option<AssociationRecord>> {
        let mut journal = self.journal()?;
        if self.memory.fetch(id)?.is_none() {
            return Ok(None);
        }
        journal.append(&JournalOp::Remove(id))?;
        let removed = self.memory.remove(id)?;
        self.maybe_compact(&mut journal);
        Ok(removed)
    }

    fn fetch(&self, id: AssociationId) -> Result<Option<AssociationRecord>> {
        self.memory.fetch(id)
    }

    fn fetch_by_placement_article(
        &self,
        key: &PlacementKey,
        article_id: &str,
    ) -> Result<Option<AssociationRecord>> {
        self.memory.fetch_by_placement_article(key, article_id)
    }

    fn find_by_placement(&self, key: &PlacementKey) -> Result<Vec<AssociationRecord>> {
        self.memory.find_by_placement(key)
    }

    fn find_by_group_article(
        &self,
        group_id: u64,
        article_id: &str,
    ) -> Result<Vec<AssociationRecord>> {
        self.memory.find_by_group_article(group_id, article_id)
    }

    fn find_by_group_privacy_article(
        &self,
        group_id: u64,
        private_layout: bool,
        article_id: &str,
    ) -> Result<Vec<AssociationRecord>> {
        self.memory
            .find_by_group_privacy_article(group_id, private_layout, article_id)
    }

    fn count_by_group_privacy_article(
        &self,
        group_id: u64,
        private_layout: bool,
        article_id: &str,
    ) -> Result<usize> {
        self.memory
            .count_by_group_privacy_article(group_id, private_layout, article_id)
    }

    fn find_by_article(&self, article_id: &str) -> Result<Vec<AssociationRecord>> {
        self.memory.find_by_article(article_id)
    }

    fn count_by_article(&self, article_id: &str) -> Result<usize> {
        self.memory.count_by_article(article_id)
    }

    fn find_by_layout(
        &self,
        group_id: u64,
        private_layout: bool,
        layout_id: u64,
    ) -> Result<Vec<AssociationRecord>> {
        self.memory.find_by_layout(group_id, private_layout, layout_id)
    }

    fn find_by_owner(&self, group_id: u64, private_layout: bool) -> Result<Vec<AssociationRecord>> {
        self.memory.find_by_owner(group_id, private_layout)
    }

    fn find_by_portlet(&self, portlet_id: &str) -> Result<Vec<AssociationRecord>> {
        self.memory.find_by_portlet(portlet_id)
    }

    fn find_all(&self) -> Result<Vec<AssociationRecord>> {
        self.memory.find_all()
    }

    fn count(&self) -> Result<usize> {
        self.memory.count()
    }

    fn max_id(&self) -> Result<AssociationId> {
        self.memory.max_id()
    }

    fn scan_batch(
        &self,
        after: Option<AssociationId>,
        limit: usize,
        filter: RecordFilter<'_>,
    ) -> Result<Vec<AssociationRecord>> {
        self.memory.scan_batch(after, limit, filter)
    }
}
