//! Declarative security requirements attached to resource methods.
//! Requirements are plain data; evaluation happens in the router before a handler runs.

use serde::{Deserialize, Serialize};

use crate::identity::{ClientSecurityInfo, PermissionKind};
use crate::resource::{ActionResult, ActionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "permission", rename_all = "snake_case")]
pub enum SecurityRequirement {
    Public,
    Authenticated,
    Admin,
    Permission(PermissionKind),
}

/// Why a requirement was not met. `Unauthorized` means "log in first";
/// `Forbidden` means the logged-in client will not be allowed this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthorized,
    Forbidden,
}

impl SecurityRequirement {
    pub fn evaluate(&self, info: &ClientSecurityInfo) -> Result<(), Denial> {
        match self {
            SecurityRequirement::Public => Ok(()),
            _ if !info.authenticated => Err(Denial::Unauthorized),
            SecurityRequirement::Authenticated => Ok(()),
            SecurityRequirement::Admin => {
                if info.is_admin { Ok(()) } else { Err(Denial::Forbidden) }
            }
            SecurityRequirement::Permission(kind) => {
                if info.has_permission(*kind) { Ok(()) } else { Err(Denial::Forbidden) }
            }
        }
    }

    pub fn allows(&self, info: &ClientSecurityInfo) -> bool {
        self.evaluate(info).is_ok()
    }
}

impl From<Denial> for ActionResult {
    fn from(d: Denial) -> Self {
        match d {
            Denial::Unauthorized => ActionResult::error(ActionStatus::Unauthorized, "authentication required"),
            Denial::Forbidden => ActionResult::error(ActionStatus::Forbidden, "insufficient permissions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PermissionSet;

    fn authed(is_admin: bool, permissions: PermissionSet) -> ClientSecurityInfo {
        ClientSecurityInfo { authenticated: true, is_admin, permissions }
    }

    #[test]
    fn public_passes_for_anonymous() {
        assert!(SecurityRequirement::Public.allows(&ClientSecurityInfo::anonymous()));
    }

    #[test]
    fn anonymous_is_unauthorized_for_everything_else() {
        let anon = ClientSecurityInfo::anonymous();
        for req in [
            SecurityRequirement::Authenticated,
            SecurityRequirement::Admin,
            SecurityRequirement::Permission(PermissionKind::Console),
        ] {
            assert_eq!(req.evaluate(&anon), Err(Denial::Unauthorized));
        }
    }

    #[test]
    fn non_admin_is_forbidden() {
        let user = authed(false, PermissionSet::none());
        assert_eq!(SecurityRequirement::Authenticated.evaluate(&user), Ok(()));
        assert_eq!(SecurityRequirement::Admin.evaluate(&user), Err(Denial::Forbidden));
        assert_eq!(
            SecurityRequirement::Permission(PermissionKind::ViewMap).evaluate(&user),
            Err(Denial::Forbidden)
        );
    }

    #[test]
    fn permission_bit_is_checked_per_kind() {
        let admin = authed(true, PermissionSet::none().with(PermissionKind::Console, true));
        assert!(SecurityRequirement::Admin.allows(&admin));
        assert!(SecurityRequirement::Permission(PermissionKind::Console).allows(&admin));
        assert_eq!(
            SecurityRequirement::Permission(PermissionKind::ManageSaves).evaluate(&admin),
            Err(Denial::Forbidden)
        );
    }

    #[test]
    fn denial_maps_to_distinct_statuses() {
        assert_eq!(ActionResult::from(Denial::Unauthorized).status, ActionStatus::Unauthorized);
        assert_eq!(ActionResult::from(Denial::Forbidden).status, ActionStatus::Forbidden);
    }

    #[test]
    fn requirement_serializes_as_data() {
        let v = serde_json::to_value(SecurityRequirement::Permission(PermissionKind::Console)).unwrap();
        assert_eq!(v, serde_json::json!({"kind":"permission","permission":"console"}));
        let p: SecurityRequirement = serde_json::from_str(r#"{"kind":"public"}"#).unwrap();
        assert_eq!(p, SecurityRequirement::Public);
    }
}
