//! Owning handle for a wired-up placement index.
//!
//! Responsibilities:
//! - Collect the collaborators (store, site directory, page tree, preferences, ids).
//! - Validate options and seed the id source past every persisted row.
//! - Gate the extractor registry: lookups are served between `open` and `close`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::directory::{IdGenerator, LayoutSource, PreferenceSource, SequenceCounter, SiteDirectory};
use crate::error::{IndexError, Result};
use crate::registry::ExtractorRegistry;
use crate::store::{AssociationStore, JournaledStore, MemoryStore};
use crate::types::{IndexOptions, SweepReport};

use super::sweep::Sweeper;
use super::updater::AssociationUpdater;

/// Handle bundling the updater, the sweeper and the extractor registry they share.
pub struct PlacementIndex {
    updater: AssociationUpdater,
    sweeper: Sweeper,
    extractors: Arc<ExtractorRegistry>,
}

impl PlacementIndex {
    #[must_use]
    pub fn builder() -> PlacementIndexBuilder {
        PlacementIndexBuilder::default()
    }

    /// Begin serving extractor lookups.
    pub fn open(&self) -> Result<()> {
        self.extractors.open()?;
        tracing::info!("placement index opened");
        Ok(())
    }

    /// Stop serving lookups and drop every registration. Sweeps started afterwards fail.
    pub fn close(&self) -> Result<()> {
        self.extractors.close()?;
        tracing::info!("placement index closed");
        Ok(())
    }

    #[must_use]
    pub fn updater(&self) -> &AssociationUpdater {
        &self.updater
    }

    #[must_use]
    pub fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }

    #[must_use]
    pub fn extractors(&self) -> &Arc<ExtractorRegistry> {
        &self.extractors
    }

    pub fn reconcile(&self, company_id: u64) -> Result<SweepReport> {
        self.sweeper.reconcile(company_id)
    }
}

#[derive(Default)]
pub struct PlacementIndexBuilder {
    store: Option<Arc<dyn AssociationStore>>,
    journal: Option<PathBuf>,
    sites: Option<Arc<dyn SiteDirectory>>,
    layouts: Option<Arc<dyn LayoutSource>>,
    preferences: Option<Arc<dyn PreferenceSource>>,
    ids: Option<Arc<dyn IdGenerator>>,
    extractors: Option<Arc<ExtractorRegistry>>,
    options: IndexOptions,
}

impl PlacementIndexBuilder {
    pub fn store(mut self, store: Arc<dyn AssociationStore>) -> Self {
        self.store = Some(store);
        self.journal = None;
        self
    }

    /// Back the index with a journal at `path`. The journal is opened by [`build`](Self::build)
    /// with whatever journal options the builder holds at that point.
    pub fn journal_path(mut self, path: impl AsRef<Path>) -> Self {
        self.journal = Some(path.as_ref().to_path_buf());
        self.store = None;
        self
    }

    pub fn sites(mut self, sites: Arc<dyn SiteDirectory>) -> Self {
        self.sites = Some(sites);
        self
    }

    pub fn layouts(mut self, layouts: Arc<dyn LayoutSource>) -> Self {
        self.layouts = Some(layouts);
        self
    }

    pub fn preferences(mut self, preferences: Arc<dyn PreferenceSource>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn extractors(mut self, extractors: Arc<ExtractorRegistry>) -> Self {
        self.extractors = Some(extractors);
        self
    }

    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Wire everything together. The store defaults to an in-memory one (or the journal set by
    /// [`journal_path`](Self::journal_path)) and the id source to a counter that starts after
    /// the highest persisted id.
    pub fn build(self) -> Result<PlacementIndex> {
        self.options.validate()?;

        let sites = self.sites.ok_or_else(|| missing("site directory"))?;
        let layouts = self.layouts.ok_or_else(|| missing("layout source"))?;
        let preferences = self.preferences.ok_or_else(|| missing("preference source"))?;
        let store: Arc<dyn AssociationStore> = match (self.store, self.journal) {
            (Some(store), _) => store,
            (None, Some(path)) => {
                Arc::new(JournaledStore::open(path, self.options.journal.clone())?)
            }
            (None, None) => Arc::new(MemoryStore::new()),
        };
        let ids = match self.ids {
            Some(ids) => ids,
            None => Arc::new(SequenceCounter::starting_after(store.max_id()?)),
        };
        let extractors = self.extractors.unwrap_or_default();

        let updater = AssociationUpdater::new(store, sites, ids);
        let sweeper = Sweeper::new(
            updater.clone(),
            layouts,
            preferences,
            Arc::clone(&extractors),
            self.options,
        );
        Ok(PlacementIndex {
            updater,
            sweeper,
            extractors,
        })
    }
}

fn missing(part: &str) -> IndexError {
    IndexError::InvalidOptions {
        reason: format!("missing {part}"),
    }
}
