//! Content extractors keyed by root widget-type identifier.
//!
//! Widget types announce an extractor through [`ExtractorRegistry::register`] and withdraw
//! it through [`ExtractorRegistry::unregister`] at any time. Lookups are only valid between
//! [`ExtractorRegistry::open`] and [`ExtractorRegistry::close`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::constants::ARTICLE_ID_PREFERENCE;
use crate::error::{IndexError, Result};
use crate::types::PortletPreferences;

/// Produces the content identifier a placement currently displays.
pub trait ContentExtractor: Send + Sync {
    /// `None` when the placement has no content selected. Never fails on malformed input.
    fn extract(&self, preferences: &PortletPreferences) -> Option<String>;
}

impl<F> ContentExtractor for F
where
    F: Fn(&PortletPreferences) -> Option<String> + Send + Sync,
{
    fn extract(&self, preferences: &PortletPreferences) -> Option<String> {
        self(preferences)
    }
}

/// Reads a single preference key, treating a blank value as no selection.
#[derive(Debug, Clone)]
pub struct PreferenceKeyExtractor {
    key: String,
}

impl PreferenceKeyExtractor {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Extractor for web content display placements.
    #[must_use]
    pub fn article_id() -> Self {
        Self::new(ARTICLE_ID_PREFERENCE)
    }
}

impl ContentExtractor for PreferenceKeyExtractor {
    fn extract(&self, preferences: &PortletPreferences) -> Option<String> {
        preferences
            .value(&self.key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Returned by `register`; withdraws the registration when passed to `unregister`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationHandle {
    root_portlet_id: String,
    id: u64,
}

impl RegistrationHandle {
    #[must_use]
    pub fn root_portlet_id(&self) -> &str {
        &self.root_portlet_id
    }
}

struct Registration {
    id: u64,
    ranking: i32,
    extractor: Arc<dyn ContentExtractor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Open,
    Closed,
}

struct Inner {
    phase: Phase,
    next_id: u64,
    entries: HashMap<String, Vec<Registration>>,
}

/// Live map from root widget-type identifier to the extractor serving it.
///
/// When several extractors register for one type the highest ranking wins; ties go to the
/// earliest registration. Entries are fully built before they are published under the write
/// lock, so readers never see a partial registration.
pub struct ExtractorRegistry {
    inner: RwLock<Inner>,
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ExtractorRegistry");
        if let Ok(inner) = self.inner.read() {
            debug
                .field("phase", &inner.phase)
                .field("types", &inner.entries.len());
        }
        debug.finish_non_exhaustive()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                phase: Phase::Pending,
                next_id: 1,
                entries: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| IndexError::Lock("extractor registry lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| IndexError::Lock("extractor registry lock poisoned".into()))
    }

    /// Start serving lookups. Registrations made before opening are kept.
    pub fn open(&self) -> Result<()> {
        let mut inner = self.write()?;
        if inner.phase != Phase::Open {
            inner.phase = Phase::Open;
            tracing::debug!(registry.types = inner.entries.len(), "extractor registry opened");
        }
        Ok(())
    }

    /// Stop serving lookups and drop every registration.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.write()?;
        let dropped: usize = inner.entries.values().map(Vec::len).sum();
        inner.entries.clear();
        inner.phase = Phase::Closed;
        tracing::debug!(registry.dropped = dropped, "extractor registry closed");
        Ok(())
    }

    pub fn is_open(&self) -> Result<bool> {
        Ok(self.read()?.phase == Phase::Open)
    }

    pub fn register(
        &self,
        root_portlet_id: &str,
        extractor: Arc<dyn ContentExtractor>,
    ) -> Result<RegistrationHandle> {
        self.register_ranked(root_portlet_id, extractor, 0)
    }

    pub fn register_ranked(
        &self,
        root_portlet_id: &str,
        extractor: Arc<dyn ContentExtractor>,
        ranking: i32,
    ) -> Result<RegistrationHandle> {
        let mut inner = self.write()?;
        if inner.phase == Phase::Closed {
            return Err(IndexError::RegistryClosed);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let registrations = inner
            .entries
            .entry(root_portlet_id.to_string())
            .or_default();
        registrations.push(Registration {
            id,
            ranking,
            extractor,
        });
        registrations.sort_by(|a, b| b.ranking.cmp(&a.ranking).then(a.id.cmp(&b.id)));
        tracing::debug!(
            registry.root_portlet_id = root_portlet_id,
            registry.ranking = ranking,
            "extractor registered"
        );
        Ok(RegistrationHandle {
            root_portlet_id: root_portlet_id.to_string(),
            id,
        })
    }

    /// Withdraw a registration; `false` if it was already gone.
    pub fn unregister(&self, handle: &RegistrationHandle) -> Result<bool> {
        let mut inner = self.write()?;
        let Some(registrations) = inner.entries.get_mut(&handle.root_portlet_id) else {
            return Ok(false);
        };
        let before = registrations.len();
        registrations.retain(|registration| registration.id != handle.id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            inner.entries.remove(&handle.root_portlet_id);
        }
        Ok(removed)
    }

    /// Extractor serving `root_portlet_id`, or `None` when that widget type is not indexed.
    pub fn lookup(&self, root_portlet_id: &str) -> Result<Option<Arc<dyn ContentExtractor>>> {
        let inner = self.read()?;
        match inner.phase {
            Phase::Pending => Err(IndexError::RegistryNotOpen),
            Phase::Closed => Err(IndexError::RegistryClosed),
            Phase::Open => Ok(inner
                .entries
                .get(root_portlet_id)
                .and_then(|registrations| registrations.first())
                .map(|registration| Arc::clone(&registration.extractor))),
        }
    }

    /// Root identifiers with at least one registration, sorted.
    pub fn registered_types(&self) -> Result<Vec<String>> {
        let mut types: Vec<String> = self.read()?.entries.keys().cloned().collect();
        types.sort();
        Ok(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fixed(value: &'static str) -> Arc<dyn ContentExtractor> {
        Arc::new(move |_: &PortletPreferences| Some(value.to_string()))
    }

    fn extract_with(registry: &ExtractorRegistry, root: &str) -> Option<String> {
        registry
            .lookup(root)
            .unwrap()
            .and_then(|extractor| extractor.extract(&PortletPreferences::new()))
    }

    #[test]
    fn lookup_requires_open() {
        let registry = ExtractorRegistry::new();
        registry.register("journal", fixed("A")).unwrap();
        assert!(matches!(registry.lookup("journal"), Err(IndexError::RegistryNotOpen)));

        registry.open().unwrap();
        assert_eq!(extract_with(&registry, "journal").as_deref(), Some("A"));
        assert!(registry.lookup("other").unwrap().is_none());

        registry.close().unwrap();
        assert!(matches!(registry.lookup("journal"), Err(IndexError::RegistryClosed)));
        assert!(registry.registered_types().unwrap().is_empty());
        assert!(matches!(
            registry.register("journal", fixed("B")),
            Err(IndexError::RegistryClosed)
        ));
    }

    #[test]
    fn highest_ranking_wins_and_ties_keep_first() {
        let registry = ExtractorRegistry::new();
        registry.open().unwrap();
        let first = registry.register("journal", fixed("first")).unwrap();
        registry.register("journal", fixed("tie")).unwrap();
        assert_eq!(extract_with(&registry, "journal").as_deref(), Some("first"));

        let high = registry.register_ranked("journal", fixed("high"), 10).unwrap();
        assert_eq!(extract_with(&registry, "journal").as_deref(), Some("high"));

        assert!(registry.unregister(&high).unwrap());
        assert!(!registry.unregister(&high).unwrap());
        assert_eq!(extract_with(&registry, "journal").as_deref(), Some("first"));

        assert!(registry.unregister(&first).unwrap());
        assert_eq!(extract_with(&registry, "journal").as_deref(), Some("tie"));
    }

    #[test]
    fn preference_key_extractor_ignores_blank_values() {
        let extractor = PreferenceKeyExtractor::article_id();
        let prefs = PortletPreferences::new().with_value("articleId", " A-7 ");
        assert_eq!(extractor.extract(&prefs).as_deref(), Some("A-7"));
        let blank = PortletPreferences::new().with_value("articleId", "   ");
        assert_eq!(extractor.extract(&blank), None);
        assert_eq!(extractor.extract(&PortletPreferences::new()), None);
    }

    #[test]
    fn concurrent_readers_see_whole_registrations() {
        let registry = Arc::new(ExtractorRegistry::new());
        registry.open().unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..200 {
                    let handle = registry.register("journal", fixed("A")).unwrap();
                    registry.unregister(&handle).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(extractor) = registry.lookup("journal").unwrap() {
                            assert_eq!(
                                extractor.extract(&PortletPreferences::new()).as_deref(),
                                Some("A")
                            );
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(registry.lookup("journal").unwrap().is_none());
    }
}
