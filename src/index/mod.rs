//! Index maintenance: per-placement updates and company-wide reconciliation.

mod lifecycle;
mod sweep;
mod updater;

pub use lifecycle::{PlacementIndex, PlacementIndexBuilder};
pub use sweep::Sweeper;
pub use updater::AssociationUpdater;
