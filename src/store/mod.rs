//! Association store contract and the batched scan driver.
//!
//! Stores are shared between the updater and any number of concurrent sweeps, so every
//! method takes `&self`. A single `update` or `remove` is atomic; nothing spans rows.

mod journaled;
mod memory;

pub use journaled::JournaledStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{AssociationId, AssociationRecord, PlacementKey};

/// Row filter applied by a scan.
pub type RecordFilter<'a> = &'a dyn Fn(&AssociationRecord) -> bool;

/// Keyed table of association rows with the composite-prefix lookups the index needs.
pub trait AssociationStore: Send + Sync {
    /// New unsaved row bound to `id`.
    fn create(&self, id: AssociationId) -> AssociationRecord {
        AssociationRecord::shell(id)
    }

    /// Insert or replace the row with `record.id`, returning the persisted form.
    fn update(&self, record: AssociationRecord) -> Result<AssociationRecord>;

    /// Delete by id; returns the removed row.
    fn remove(&self, id: AssociationId) -> Result<Option<AssociationRecord>>;

    fn fetch(&self, id: AssociationId) -> Result<Option<AssociationRecord>>;

    fn fetch_by_placement_article(
        &self,
        key: &PlacementKey,
        article_id: &str,
    ) -> Result<Option<AssociationRecord>>;

    fn find_by_placement(&self, key: &PlacementKey) -> Result<Vec<AssociationRecord>>;

    fn find_by_group_article(&self, group_id: u64, article_id: &str)
    -> Result<Vec<AssociationRecord>>;

    fn find_by_group_privacy_article(
        &self,
        group_id: u64,
        private_layout: bool,
        article_id: &str,
    ) -> Result<Vec<AssociationRecord>>;

    fn count_by_group_privacy_article(
        &self,
        group_id: u64,
        private_layout: bool,
        article_id: &str,
    ) -> Result<usize>;

    fn find_by_article(&self, article_id: &str) -> Result<Vec<AssociationRecord>>;

    fn count_by_article(&self, article_id: &str) -> Result<usize>;

    fn find_by_layout(
        &self,
        group_id: u64,
        private_layout: bool,
        layout_id: u64,
    ) -> Result<Vec<AssociationRecord>>;

    fn find_by_owner(&self, group_id: u64, private_layout: bool) -> Result<Vec<AssociationRecord>>;

    fn find_by_portlet(&self, portlet_id: &str) -> Result<Vec<AssociationRecord>>;

    fn find_all(&self) -> Result<Vec<AssociationRecord>>;

    fn count(&self) -> Result<usize>;

    /// Highest id ever persisted, `0` for an empty store.
    fn max_id(&self) -> Result<AssociationId>;

    /// Up to `limit` rows with id greater than `after` that pass `filter`, in id order.
    /// An empty batch means no such rows remain.
    fn scan_batch(
        &self,
        after: Option<AssociationId>,
        limit: usize,
        filter: RecordFilter<'_>,
    ) -> Result<Vec<AssociationRecord>>;

    /// Delete every row at `key`; returns how many were removed.
    fn remove_by_placement(&self, key: &PlacementKey) -> Result<usize> {
        let rows = self.find_by_placement(key)?;
        let mut removed = 0;
        for row in rows {
            if self.remove(row.id)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Anything a scan can page through by a monotonically increasing cursor.
pub trait ScanCursor {
    fn cursor(&self) -> u64;
}

impl ScanCursor for AssociationRecord {
    fn cursor(&self) -> u64 {
        self.id
    }
}

impl ScanCursor for crate::types::Layout {
    fn cursor(&self) -> u64 {
        self.plid
    }
}

/// Drive `action` over every item `fetch` yields, one batch in memory at a time.
///
/// `fetch(after, limit)` must return items in increasing cursor order and may return fewer
/// than `limit` at any time; only an empty batch ends the scan. The first error from either
/// side stops the scan and is returned; items already acted upon stay acted upon.
pub fn scan<T, F, A>(batch_size: usize, mut fetch: F, mut action: A) -> Result<u64>
where
    T: ScanCursor,
    F: FnMut(Option<u64>, usize) -> Result<Vec<T>>,
    A: FnMut(T) -> Result<()>,
{
    let batch_size = batch_size.max(1);
    let mut after = None;
    let mut visited = 0u64;
    loop {
        let batch = fetch(after, batch_size)?;
        let Some(last) = batch.last().map(ScanCursor::cursor) else {
            break;
        };
        for item in batch {
            action(item)?;
            visited += 1;
        }
        after = Some(last);
    }
    Ok(visited)
}

/// Scan the rows of `store` that pass `filter`.
pub fn scan_records<A>(
    store: &dyn AssociationStore,
    batch_size: usize,
    filter: RecordFilter<'_>,
    action: A,
) -> Result<u64>
where
    A: FnMut(AssociationRecord) -> Result<()>,
{
    scan(
        batch_size,
        |after, limit| store.scan_batch(after, limit, filter),
        action,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;

    struct Item(u64);

    impl ScanCursor for Item {
        fn cursor(&self) -> u64 {
            self.0
        }
    }

    fn source(len: u64) -> impl FnMut(Option<u64>, usize) -> Result<Vec<Item>> {
        move |after, limit| {
            let start = after.map_or(1, |a| a + 1);
            Ok((start..=len).take(limit).map(Item).collect())
        }
    }

    #[test]
    fn visits_every_item_across_batches() {
        let mut seen = Vec::new();
        let visited = scan(3, source(10), |item| {
            seen.push(item.0);
            Ok(())
        })
        .unwrap();
        assert_eq!(visited, 10);
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn scan_ends_on_empty_batch() {
        for (len, expected_fetches) in [(6, 3), (7, 4), (0, 1)] {
            let mut fetches = 0;
            let mut inner = source(len);
            let visited = scan(
                3,
                |after, limit| {
                    fetches += 1;
                    inner(after, limit)
                },
                |_| Ok(()),
            )
            .unwrap();
            assert_eq!(visited, len);
            assert_eq!(fetches, expected_fetches, "len {len}");
        }
    }

    #[test]
    fn short_pages_do_not_end_the_scan() {
        let mut inner = source(10);
        let mut seen = Vec::new();
        let visited = scan(
            4,
            |after, limit| {
                let mut page = inner(after, limit)?;
                page.truncate(1);
                Ok(page)
            },
            |item| {
                seen.push(item.0);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(visited, 10);
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn action_error_stops_scan() {
        let mut seen = 0;
        let err = scan(4, source(10), |item| {
            if item.0 == 6 {
                return Err(IndexError::source("test", "boom"));
            }
            seen += 1;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, IndexError::Source { .. }));
        assert_eq!(seen, 5);
    }
}
