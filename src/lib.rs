#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints: internal helpers are self-describing; public APIs carry docs where
// the behaviour is not obvious from the signature.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Builders and collaborator wiring take owned `Arc`s and option structs.
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::unreadable_literal)] // Journal format constants read better as hex
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::unnecessary_wraps)]

//! Derived index of which content article each widget placement displays.
//!
//! The index is a cache of facts that live elsewhere: sites, their pages, and the stored
//! preferences of each widget placed on a page. [`AssociationUpdater`] keeps it current as
//! individual placements change, and [`Sweeper::reconcile`] rebuilds it for a whole company
//! from the page tree. Widget types opt in by registering a [`ContentExtractor`] with the
//! shared [`ExtractorRegistry`].

/// The placement-index crate version (matches `Cargo.toml`).
pub const PLACEMENT_INDEX_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod constants;
pub mod directory;
pub mod eligibility;
pub mod error;
pub mod index;
pub mod io;
pub mod registry;
pub mod store;
pub mod types;

pub use directory::{
    IdGenerator, LayoutSource, MemoryLayoutSource, MemoryPreferenceSource, MemorySiteDirectory,
    PreferenceSource, SequenceCounter, SiteDirectory,
};
pub use eligibility::{Eligibility, eligibility, is_eligible};
pub use error::{IndexError, Result};
pub use index::{AssociationUpdater, PlacementIndex, PlacementIndexBuilder, Sweeper};
pub use io::{Journal, JournalOp, JournalStats};
pub use registry::{
    ContentExtractor, ExtractorRegistry, PreferenceKeyExtractor, RegistrationHandle,
};
pub use store::{
    AssociationStore, JournaledStore, MemoryStore, RecordFilter, ScanCursor, scan, scan_records,
};
pub use types::{
    AssociationId, AssociationRecord, EmptyContentPolicy, IndexOptions, JournalOptions, Layout,
    OwnerType, PlacementKey, PortletPreferences, Site, SiteType, SweepMode, SweepReport,
    assemble_portlet_id, instance_id, root_portlet_id, user_id,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(PLACEMENT_INDEX_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
