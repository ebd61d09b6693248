//! Authoritative sources the index is derived from.
//!
//! The index never owns sites, pages or placement preferences; it reads them through these
//! traits. In-memory implementations live in [`memory`] for embedding and tests.

mod memory;

pub use memory::{MemoryLayoutSource, MemoryPreferenceSource, MemorySiteDirectory, SequenceCounter};

use crate::error::Result;
use crate::types::{Layout, OwnerType, PortletPreferences, Site};

/// Tenant site lookup.
pub trait SiteDirectory: Send + Sync {
    /// `Ok(None)` when the site does not exist.
    fn fetch_site(&self, group_id: u64) -> Result<Option<Site>>;
}

/// Page tree of every site, paged by `plid`.
pub trait LayoutSource: Send + Sync {
    /// Up to `limit` layouts of `company_id` with `plid > after`, in `plid` order. Short pages
    /// are allowed; an empty page means the tree is exhausted.
    fn layouts_after(&self, company_id: u64, after: Option<u64>, limit: usize) -> Result<Vec<Layout>>;
}

/// Stored per-placement configuration.
pub trait PreferenceSource: Send + Sync {
    fn preferences(
        &self,
        company_id: u64,
        owner_id: u64,
        owner_type: OwnerType,
        plid: u64,
        portlet_id: &str,
    ) -> Result<PortletPreferences>;
}

/// Source of fresh association ids.
pub trait IdGenerator: Send + Sync {
    /// Strictly greater than every id returned before.
    fn next_id(&self) -> Result<u64>;
}
