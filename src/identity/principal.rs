use serde::{Deserialize, Serialize};

use super::permissions::{PermissionKind, PermissionSet};

/// Security profile of a client at one point in time. Derived from the admin registry on
/// demand; never cached across requests since admin status may change mid-session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSecurityInfo {
    pub authenticated: bool,
    pub is_admin: bool,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl ClientSecurityInfo {
    pub fn anonymous() -> Self {
        Self { authenticated: false, is_admin: false, permissions: PermissionSet::none() }
    }

    pub fn has_permission(&self, kind: PermissionKind) -> bool {
        self.is_admin && self.permissions.get(kind)
    }
}

/// Who is invoking a resource method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// Certificate id once authenticated.
    pub id: Option<String>,
    /// Session token of the connection the request arrived on.
    pub session: Option<String>,
    pub security: ClientSecurityInfo,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { id: None, session: None, security: ClientSecurityInfo::anonymous() }
    }
}
