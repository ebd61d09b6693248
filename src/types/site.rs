//! Tenant sites (groups) as seen by the site directory.

use serde::{Deserialize, Serialize};

use crate::constants::CONTROL_PANEL_GROUP_KEY;

/// Site membership type. `System` marks sites reserved by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    #[default]
    Open,
    Restricted,
    Private,
    System,
}

impl SiteType {
    /// Numeric code used by the site directory's persisted form.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Open => 1,
            Self::Restricted => 2,
            Self::Private => 3,
            Self::System => 4,
        }
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Open),
            2 => Some(Self::Restricted),
            3 => Some(Self::Private),
            4 => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub group_id: u64,
    pub company_id: u64,
    /// Id of the live site this one stages, `0` for a live site.
    #[serde(default)]
    pub live_group_id: u64,
    #[serde(default)]
    pub group_key: String,
    #[serde(default)]
    pub site_type: SiteType,
}

impl Site {
    #[must_use]
    pub fn new(group_id: u64, company_id: u64) -> Self {
        Self {
            group_id,
            company_id,
            live_group_id: 0,
            group_key: format!("site-{group_id}"),
            site_type: SiteType::Open,
        }
    }

    #[must_use]
    pub fn staging_of(mut self, live_group_id: u64) -> Self {
        self.live_group_id = live_group_id;
        self
    }

    #[must_use]
    pub fn with_group_key(mut self, group_key: impl Into<String>) -> Self {
        self.group_key = group_key.into();
        self
    }

    #[must_use]
    pub fn with_site_type(mut self, site_type: SiteType) -> Self {
        self.site_type = site_type;
        self
    }

    #[must_use]
    pub fn is_staging(&self) -> bool {
        self.live_group_id != 0
    }

    #[must_use]
    pub fn is_control_panel(&self) -> bool {
        self.group_key == CONTROL_PANEL_GROUP_KEY
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.site_type == SiteType::System
    }
}
