//! Which sites may hold association rows.

use crate::directory::SiteDirectory;
use crate::error::Result;
use crate::types::Site;

/// Eligibility of a site, with the reason when it is excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Missing,
    Staging,
    ControlPanel,
    System,
}

impl Eligibility {
    /// Classify a resolved (or unresolved) site.
    #[must_use]
    pub fn of(site: Option<&Site>) -> Self {
        match site {
            None => Self::Missing,
            Some(site) if site.is_staging() => Self::Staging,
            Some(site) if site.is_control_panel() => Self::ControlPanel,
            Some(site) if site.is_system() => Self::System,
            Some(_) => Self::Eligible,
        }
    }

    #[must_use]
    pub fn is_eligible(self) -> bool {
        self == Self::Eligible
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::Missing => "missing",
            Self::Staging => "staging",
            Self::ControlPanel => "control_panel",
            Self::System => "system",
        }
    }
}

/// Resolve `group_id` and classify it. Nothing is cached: site state may change between calls.
pub fn eligibility(sites: &dyn SiteDirectory, group_id: u64) -> Result<Eligibility> {
    let site = sites.fetch_site(group_id)?;
    Ok(Eligibility::of(site.as_ref()))
}

pub fn is_eligible(sites: &dyn SiteDirectory, group_id: u64) -> Result<bool> {
    Ok(eligibility(sites, group_id)?.is_eligible())
}
