//! Pages of the layout tree and the preferences stored per placement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A page in a site's public or private layout set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Globally unique page id; layout sources page through layouts in `plid` order.
    pub plid: u64,
    pub group_id: u64,
    pub company_id: u64,
    pub private_layout: bool,
    /// Page id, unique within `(group_id, private_layout)`.
    pub layout_id: u64,
    /// Placement identifiers in column order.
    #[serde(default)]
    pub portlet_ids: Vec<String>,
}

impl Layout {
    #[must_use]
    pub fn new(plid: u64, group_id: u64, company_id: u64, private_layout: bool, layout_id: u64) -> Self {
        Self {
            plid,
            group_id,
            company_id,
            private_layout,
            layout_id,
            portlet_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_portlet(mut self, portlet_id: impl Into<String>) -> Self {
        self.portlet_ids.push(portlet_id.into());
        self
    }
}

/// Who owns a preference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Company,
    Group,
    User,
    Layout,
}

impl OwnerType {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Company => 1,
            Self::Group => 2,
            Self::Layout => 3,
            Self::User => 4,
        }
    }
}

/// Multi-valued string preferences of one placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortletPreferences {
    values: BTreeMap<String, Vec<String>>,
}

impl PortletPreferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the stored JSON form: an object of string or string-array values.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut values = BTreeMap::new();
        for (key, value) in raw {
            let entries = match value {
                serde_json::Value::String(s) => vec![s],
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        serde_json::Value::String(s) => Some(s),
                        serde_json::Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect(),
                serde_json::Value::Null => Vec::new(),
                other => vec![other.to_string()],
            };
            values.insert(key, entries);
        }
        Ok(Self { values })
    }

    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_value(key, value);
        self
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    pub fn set_values<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(key.into(), values.into_iter().map(Into::into).collect());
    }

    /// First value stored under `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn values(&self, key: &str) -> &[String] {
        self.values.get(key).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
