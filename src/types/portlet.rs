//! Placement identifier conventions.
//!
//! A placement identifier is `<root>[_USER_<user id>][_INSTANCE_<instance id>]`. The root
//! part is shared by every placement of one widget type and keys the extractor registry.

use crate::constants::{INSTANCE_SEPARATOR, USER_SEPARATOR};

/// Strip the user and instance suffixes from a placement identifier.
#[must_use]
pub fn root_portlet_id(portlet_id: &str) -> &str {
    let user = portlet_id.find(USER_SEPARATOR);
    let instance = portlet_id.find(INSTANCE_SEPARATOR);
    match (user, instance) {
        (Some(x), _) => &portlet_id[..x],
        (None, Some(y)) => &portlet_id[..y],
        (None, None) => portlet_id,
    }
}

/// Instance suffix of a placement identifier, if any.
#[must_use]
pub fn instance_id(portlet_id: &str) -> Option<&str> {
    portlet_id
        .find(INSTANCE_SEPARATOR)
        .map(|pos| &portlet_id[pos + INSTANCE_SEPARATOR.len()..])
        .filter(|instance| !instance.is_empty())
}

/// Owning user id of a user-scoped placement.
#[must_use]
pub fn user_id(portlet_id: &str) -> Option<u64> {
    let start = portlet_id.find(USER_SEPARATOR)? + USER_SEPARATOR.len();
    let rest = &portlet_id[start..];
    let end = rest.find(INSTANCE_SEPARATOR).unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Build a placement identifier from its parts.
#[must_use]
pub fn assemble_portlet_id(root: &str, user_id: Option<u64>, instance_id: Option<&str>) -> String {
    let mut portlet_id = root.to_string();
    if let Some(user_id) = user_id {
        portlet_id.push_str(USER_SEPARATOR);
        portlet_id.push_str(&user_id.to_string());
    }
    if let Some(instance_id) = instance_id.filter(|id| !id.is_empty()) {
        portlet_id.push_str(INSTANCE_SEPARATOR);
        portlet_id.push_str(instance_id);
    }
    portlet_id
}
