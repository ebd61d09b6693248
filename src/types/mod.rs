//! Public types exposed by the `placement-index` crate.

pub mod layout;
pub mod options;
pub mod portlet;
pub mod record;
pub mod report;
pub mod site;

pub use layout::{Layout, OwnerType, PortletPreferences};
pub use options::{EmptyContentPolicy, IndexOptions, JournalOptions, SweepMode};
pub use portlet::{assemble_portlet_id, instance_id, root_portlet_id, user_id};
pub use record::{AssociationId, AssociationRecord, PlacementKey};
pub use report::SweepReport;
pub use site::{Site, SiteType};
