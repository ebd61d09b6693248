use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{IdGenerator, LayoutSource, PreferenceSource, SiteDirectory};
use crate::error::{IndexError, Result};
use crate::types::{Layout, OwnerType, PortletPreferences, Site};

fn poisoned(what: &str) -> IndexError {
    IndexError::Lock(format!("{what} lock poisoned"))
}

#[derive(Debug, Default)]
pub struct MemorySiteDirectory {
    sites: RwLock<HashMap<u64, Site>>,
}

impl MemorySiteDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_site(&self, site: Site) -> Result<()> {
        self.sites
            .write()
            .map_err(|_| poisoned("site directory"))?
            .insert(site.group_id, site);
        Ok(())
    }

    pub fn remove_site(&self, group_id: u64) -> Result<Option<Site>> {
        Ok(self
            .sites
            .write()
            .map_err(|_| poisoned("site directory"))?
            .remove(&group_id))
    }
}

impl SiteDirectory for MemorySiteDirectory {
    fn fetch_site(&self, group_id: u64) -> Result<Option<Site>> {
        Ok(self
            .sites
            .read()
            .map_err(|_| poisoned("site directory"))?
            .get(&group_id)
            .cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryLayoutSource {
    layouts: RwLock<BTreeMap<u64, Layout>>,
}

impl MemoryLayoutSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_layout(&self, layout: Layout) -> Result<()> {
        self.layouts
            .write()
            .map_err(|_| poisoned("layout source"))?
            .insert(layout.plid, layout);
        Ok(())
    }

    pub fn remove_layout(&self, plid: u64) -> Result<Option<Layout>> {
        Ok(self
            .layouts
            .write()
            .map_err(|_| poisoned("layout source"))?
            .remove(&plid))
    }
}

impl LayoutSource for MemoryLayoutSource {
    fn layouts_after(&self, company_id: u64, after: Option<u64>, limit: usize) -> Result<Vec<Layout>> {
        let layouts = self.layouts.read().map_err(|_| poisoned("layout source"))?;
        let start = after.map_or(0, |after| after.saturating_add(1));
        Ok(layouts
            .range(start..)
            .map(|(_, layout)| layout)
            .filter(|layout| layout.company_id == company_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

type PreferenceKey = (u64, u64, OwnerType, u64, String);

#[derive(Debug, Default)]
pub struct MemoryPreferenceSource {
    preferences: RwLock<HashMap<PreferenceKey, PortletPreferences>>,
}

impl MemoryPreferenceSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_preferences(
        &self,
        company_id: u64,
        owner_id: u64,
        owner_type: OwnerType,
        plid: u64,
        portlet_id: &str,
        preferences: PortletPreferences,
    ) -> Result<()> {
        self.preferences
            .write()
            .map_err(|_| poisoned("preference source"))?
            .insert(
                (company_id, owner_id, owner_type, plid, portlet_id.to_string()),
                preferences,
            );
        Ok(())
    }

    /// Store the JSON form of a placement's preferences.
    pub fn put_json(
        &self,
        company_id: u64,
        owner_id: u64,
        owner_type: OwnerType,
        plid: u64,
        portlet_id: &str,
        json: &str,
    ) -> Result<()> {
        let preferences = PortletPreferences::from_json(json)?;
        self.put_preferences(company_id, owner_id, owner_type, plid, portlet_id, preferences)
    }
}

impl PreferenceSource for MemoryPreferenceSource {
    /// Missing preferences read as an empty set, as a freshly placed widget would have.
    fn preferences(
        &self,
        company_id: u64,
        owner_id: u64,
        owner_type: OwnerType,
        plid: u64,
        portlet_id: &str,
    ) -> Result<PortletPreferences> {
        let preferences = self
            .preferences
            .read()
            .map_err(|_| poisoned("preference source"))?;
        Ok(preferences
            .get(&(company_id, owner_id, owner_type, plid, portlet_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Process-local monotonically increasing id source.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    last: AtomicU64,
}

impl SequenceCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter whose first id is `last + 1`.
    #[must_use]
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

impl IdGenerator for SequenceCounter {
    fn next_id(&self) -> Result<u64> {
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| last.checked_add(1))
            .map_err(|_| IndexError::source("sequence counter", "id space exhausted"))?;
        Ok(previous + 1)
    }
}
