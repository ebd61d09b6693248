//! The association record and the placement key it is filed under.

use serde::{Deserialize, Serialize};

/// Synthetic identity of an association row.
pub type AssociationId = u64;

/// Identifies one widget placement: a portlet instance on a page of a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlacementKey {
    pub group_id: u64,
    pub private_layout: bool,
    pub layout_id: u64,
    pub portlet_id: String,
}

impl PlacementKey {
    #[must_use]
    pub fn new(
        group_id: u64,
        private_layout: bool,
        layout_id: u64,
        portlet_id: impl Into<String>,
    ) -> Self {
        Self {
            group_id,
            private_layout,
            layout_id,
            portlet_id: portlet_id.into(),
        }
    }
}

/// One `(placement, article)` fact stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationRecord {
    pub id: AssociationId,
    pub group_id: u64,
    pub company_id: u64,
    pub private_layout: bool,
    pub layout_id: u64,
    pub portlet_id: String,
    pub article_id: String,
}

impl AssociationRecord {
    /// Empty shell bound to `id`; fields are filled in before the row is persisted.
    #[must_use]
    pub fn shell(id: AssociationId) -> Self {
        Self {
            id,
            group_id: 0,
            company_id: 0,
            private_layout: false,
            layout_id: 0,
            portlet_id: String::new(),
            article_id: String::new(),
        }
    }

    /// Fill the shell with a placement, owning company and article.
    #[must_use]
    pub fn bind(mut self, key: &PlacementKey, company_id: u64, article_id: &str) -> Self {
        self.group_id = key.group_id;
        self.company_id = company_id;
        self.private_layout = key.private_layout;
        self.layout_id = key.layout_id;
        self.portlet_id.clone_from(&key.portlet_id);
        self.article_id = article_id.to_string();
        self
    }

    #[must_use]
    pub fn placement_key(&self) -> PlacementKey {
        PlacementKey {
            group_id: self.group_id,
            private_layout: self.private_layout,
            layout_id: self.layout_id,
            portlet_id: self.portlet_id.clone(),
        }
    }

    #[must_use]
    pub fn is_at(&self, key: &PlacementKey) -> bool {
        self.group_id == key.group_id
            && self.private_layout == key.private_layout
            && self.layout_id == key.layout_id
            && self.portlet_id == key.portlet_id
    }
}
