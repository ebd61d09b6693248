//! Integration tests for the journal-backed association store.

use std::sync::Arc;

use tempfile::TempDir;

use placement_index::{
    AssociationStore, ExtractorRegistry, IndexError, IndexOptions, JournalOptions,
    JournaledStore, Layout, MemoryLayoutSource, MemoryPreferenceSource, MemorySiteDirectory,
    OwnerType, PlacementIndex, PlacementKey, PreferenceKeyExtractor, Site,
};

const COMPANY: u64 = 10;
const SITE: u64 = 20;

fn options(compact_after: u64) -> IndexOptions {
    IndexOptions::default().with_journal(JournalOptions {
        sync_each_append: false,
        compact_after,
    })
}

fn open_index(path: &std::path::Path, options: IndexOptions, pages: u64) -> PlacementIndex {
    let sites = Arc::new(MemorySiteDirectory::new());
    sites.put_site(Site::new(SITE, COMPANY)).unwrap();
    let layouts = Arc::new(MemoryLayoutSource::new());
    let preferences = Arc::new(MemoryPreferenceSource::new());
    for plid in 1..=pages {
        let portlet_id = "journal_content_INSTANCE_a";
        layouts
            .put_layout(Layout::new(plid, SITE, COMPANY, false, plid).with_portlet(portlet_id))
            .unwrap();
        preferences
            .put_json(
                COMPANY,
                0,
                OwnerType::Layout,
                plid,
                portlet_id,
                &format!(r#"{{"articleId":"A{plid}"}}"#),
            )
            .unwrap();
    }
    let extractors = Arc::new(ExtractorRegistry::new());
    extractors
        .register("journal_content", Arc::new(PreferenceKeyExtractor::article_id()))
        .unwrap();

    let index = PlacementIndex::builder()
        .journal_path(path)
        .options(options)
        .sites(sites)
        .layouts(layouts)
        .preferences(preferences)
        .extractors(extractors)
        .build()
        .unwrap();
    index.open().unwrap();
    index
}

#[test]
fn swept_rows_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("placements.pix");

    let before = {
        let index = open_index(&path, options(0), 12);
        let report = index.reconcile(COMPANY).unwrap();
        assert_eq!(report.associations_created, 12);
        index.updater().find_all().unwrap()
    };

    let index = open_index(&path, options(0), 12);
    assert_eq!(index.updater().find_all().unwrap(), before);

    let report = index.reconcile(COMPANY).unwrap();
    assert_eq!(report.associations_created, 0);
    assert_eq!(report.associations_existing, 12);
}

#[test]
fn ids_stay_monotonic_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("placements.pix");
    let key = PlacementKey::new(SITE, false, 99, "journal_content_INSTANCE_z");

    let removed_id = {
        let index = open_index(&path, options(0), 0);
        index.updater().upsert(&key, "A1").unwrap();
        let last = index.updater().upsert(&key, "A2").unwrap();
        index.updater().delete_for_placement(&key).unwrap();
        last.id
    };

    let index = open_index(&path, options(0), 0);
    assert!(index.updater().find_all().unwrap().is_empty());
    let fresh = index.updater().upsert(&key, "A3").unwrap();
    assert!(fresh.id > removed_id);
}

#[test]
fn compaction_keeps_live_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("placements.pix");
    let key = PlacementKey::new(SITE, false, 99, "journal_content_INSTANCE_z");

    let (rows, high_id) = {
        let index = open_index(&path, options(4), 0);
        for round in 0..6 {
            index
                .updater()
                .upsert_with_purge(&key, &format!("A{round}"), true)
                .unwrap();
        }
        let rows = index.updater().find_all().unwrap();
        let high_id = index.updater().store().max_id().unwrap();
        (rows, high_id)
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].article_id, "A5");

    let store = JournaledStore::open(&path, JournalOptions::default()).unwrap();
    assert_eq!(store.find_all().unwrap(), rows);
    assert_eq!(store.max_id().unwrap(), high_id);
    let stats = store.stats().unwrap();
    assert!(stats.sequence < 11, "journal was not compacted: {stats:?}");
}

#[test]
fn second_writer_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("placements.pix");

    let _first = JournaledStore::open(&path, JournalOptions::default()).unwrap();
    let err = JournaledStore::open(&path, JournalOptions::default()).unwrap_err();
    assert!(matches!(err, IndexError::Lock(_)));
}

#[test]
fn journal_options_apply_regardless_of_builder_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("placements.pix");
    let sites = Arc::new(MemorySiteDirectory::new());
    sites.put_site(Site::new(SITE, COMPANY)).unwrap();
    let key = PlacementKey::new(SITE, false, 99, "journal_content_INSTANCE_z");

    {
        let index = PlacementIndex::builder()
            .journal_path(&path)
            .options(options(2))
            .sites(sites)
            .layouts(Arc::new(MemoryLayoutSource::new()))
            .preferences(Arc::new(MemoryPreferenceSource::new()))
            .build()
            .unwrap();
        for round in 0..6 {
            index
                .updater()
                .upsert_with_purge(&key, &format!("A{round}"), true)
                .unwrap();
        }
    }

    let store = JournaledStore::open(&path, JournalOptions::default()).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    let stats = store.stats().unwrap();
    assert!(stats.sequence <= 3, "compact_after was ignored: {stats:?}");
}

#[test]
fn failed_compaction_does_not_fail_committed_writes() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).unwrap();
    let path = nested.join("placements.pix");
    let index = open_index(&path, options(2), 0);
    let first = PlacementKey::new(SITE, false, 1, "journal_content_INSTANCE_a");
    index.updater().upsert(&first, "A1").unwrap();

    // Compaction stages its replacement next to the journal; without a directory it fails.
    std::fs::remove_dir_all(&nested).unwrap();

    let second = PlacementKey::new(SITE, false, 2, "journal_content_INSTANCE_a");
    let row = index.updater().upsert(&second, "A2").unwrap();
    assert_eq!(index.updater().store().fetch(row.id).unwrap(), Some(row.clone()));
    let removed = index.updater().delete_for_placement(&first).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(index.updater().find_all().unwrap(), vec![row]);
}
