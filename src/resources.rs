//! Built-in resources mounted on every tree: `admins` (registry management) and
//! `server` (public identity info).

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::certificate::IdentityCertificate;
use crate::identity::{AdminRegistry, PermissionKind, PermissionSet};
use crate::resource::{ActionResult, CollectionResource, InputKind, ObserverRegistry, SimpleResource, Verb};
use crate::security::SecurityRequirement;

pub const ADMINS: &str = "admins";
pub const SERVER: &str = "server";
pub const WHOAMI: &str = "whoami";

#[derive(Debug, Deserialize)]
struct NewAdmin {
    id: String,
    #[serde(default)]
    permissions: PermissionSet,
}

/// `GET/POST /admins`, `GET/PATCH/DELETE /admins/{id}`; all gated on `manage_admins`.
pub fn admins_resource(registry: Arc<AdminRegistry>, observers: Arc<ObserverRegistry>) -> CollectionResource {
    let manage = SecurityRequirement::Permission(PermissionKind::ManageAdmins);
    let list = registry.clone();
    let add = registry.clone();
    let read = registry.clone();
    let patch = registry.clone();
    let delete = registry.clone();
    let exists = registry;
    CollectionResource::builder()
        .collection_method(Verb::Get, InputKind::None, manage, move |_| match serde_json::to_value(list.records()) {
            Ok(v) => ActionResult::ok_with(v),
            Err(e) => ActionResult::generic(e.to_string()),
        })
        .collection_method(Verb::Post, InputKind::Object, manage, move |inv| {
            let req: NewAdmin = match inv.parse() {
                Ok(r) => r,
                Err(bad) => return bad,
            };
            match add.add_admin(&req.id, req.permissions) {
                Ok(true) => ActionResult::ok_with(json!({ "id": req.id })),
                Ok(false) => ActionResult::conflict(format!("'{}' is already an admin", req.id)),
                Err(e) => e.into(),
            }
        })
        .item_method(Verb::Get, InputKind::None, manage, move |inv| {
            let id = match inv.require_item() {
                Ok(id) => id,
                Err(bad) => return bad,
            };
            match read.permissions_for(id) {
                Some(p) => ActionResult::ok_with(json!({ "id": id, "permissions": p })),
                None => ActionResult::not_found(format!("no admin '{}'", id)),
            }
        })
        .item_method(Verb::Patch, InputKind::Object, manage, move |inv| {
            let id = match inv.require_item() {
                Ok(id) => id,
                Err(bad) => return bad,
            };
            let update: PermissionSet = match inv.parse() {
                Ok(p) => p,
                Err(bad) => return bad,
            };
            match patch.set_permissions(id, &update) {
                Ok(p) => ActionResult::ok_with(json!({ "id": id, "permissions": p })),
                Err(e) => e.into(),
            }
        })
        .item_method(Verb::Delete, InputKind::None, manage, move |inv| {
            let id = match inv.require_item() {
                Ok(id) => id,
                Err(bad) => return bad,
            };
            // a caller may not strip their own admin status
            if inv.caller.id.as_deref() == Some(id) {
                return ActionResult::conflict("cannot remove yourself");
            }
            match delete.remove_admin(id) {
                Ok(true) => ActionResult::ok(),
                Ok(false) => ActionResult::not_found(format!("no admin '{}'", id)),
                Err(e) => e.into(),
            }
        })
        .item_exists(move |id| exists.is_admin(id))
        .observable(observers)
        .build()
}

/// Public server identity: who the client is talking to, and whether anyone has claimed it.
pub fn server_info_resource(certificate: IdentityCertificate, registry: Arc<AdminRegistry>) -> SimpleResource {
    SimpleResource::builder()
        .get(SecurityRequirement::Public, move |_| {
            ActionResult::ok_with(json!({
                "id": certificate.id,
                "version": env!("CARGO_PKG_VERSION"),
                "certificate": certificate,
                "bootstrap": registry.is_bootstrap_mode(),
            }))
        })
        .build()
}

/// The caller's own security profile.
pub fn whoami_resource() -> SimpleResource {
    SimpleResource::builder()
        .get(SecurityRequirement::Authenticated, |inv| {
            let granted: Vec<&str> = inv.caller.security.permissions.granted().map(|k| k.as_str()).collect();
            ActionResult::ok_with(json!({
                "id": inv.caller.id,
                "isAdmin": inv.caller.security.is_admin,
                "permissions": granted,
            }))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Caller, ClientSecurityInfo};
    use crate::resource::{ActionStatus, ResourceRequest, ResourceTree, RouterResource};

    fn tree(registry: Arc<AdminRegistry>) -> ResourceTree {
        let observers = ObserverRegistry::shared("/admins");
        let root = RouterResource::builder()
            .child(ADMINS, admins_resource(registry, observers))
            .unwrap()
            .child(WHOAMI, whoami_resource())
            .unwrap()
            .build();
        ResourceTree::new(root)
    }

    fn caller(registry: &AdminRegistry, id: &str) -> Caller {
        Caller { id: Some(id.to_string()), session: None, security: registry.security_info(Some(id), true) }
    }

    #[test]
    fn manage_admins_round_trip() {
        let reg = Arc::new(AdminRegistry::in_memory());
        reg.add_first_admin_if_necessary("root").unwrap();
        let t = tree(reg.clone());
        let root = caller(&reg, "root");

        let add = ResourceRequest::new(Verb::Post, ["admins"]).with_data(json!({"id": "bob", "permissions": {"console": true}}));
        assert!(t.handle(add.clone(), &root).is_ok());
        assert_eq!(t.handle(add, &root).status, ActionStatus::Conflict);

        let patch = ResourceRequest::new(Verb::Patch, ["admins", "bob"]).with_data(json!({"view_map": true}));
        let res = t.handle(patch, &root);
        assert_eq!(res.data.unwrap()["permissions"]["view_map"], true);

        assert!(t.handle(ResourceRequest::new(Verb::Delete, ["admins", "bob"]), &root).is_ok());
        assert_eq!(t.handle(ResourceRequest::new(Verb::Get, ["admins", "bob"]), &root).status, ActionStatus::NotFound);
        assert_eq!(t.handle(ResourceRequest::new(Verb::Delete, ["admins", "root"]), &root).status, ActionStatus::Conflict);
    }

    #[test]
    fn non_admin_is_forbidden_and_anonymous_unauthorized() {
        let reg = Arc::new(AdminRegistry::in_memory());
        reg.add_first_admin_if_necessary("root").unwrap();
        let t = tree(reg.clone());
        let list = ResourceRequest::new(Verb::Get, ["admins"]);
        assert_eq!(t.handle(list.clone(), &caller(&reg, "mallory")).status, ActionStatus::Forbidden);
        assert_eq!(t.handle(list, &Caller::anonymous()).status, ActionStatus::Unauthorized);
    }

    #[test]
    fn whoami_reports_granted_bits() {
        let t = tree(Arc::new(AdminRegistry::in_memory()));
        let c = Caller {
            id: Some("x".into()),
            session: None,
            security: ClientSecurityInfo {
                authenticated: true,
                is_admin: true,
                permissions: PermissionSet::none().with(PermissionKind::Console, true),
            },
        };
        let res = t.handle(ResourceRequest::new(Verb::Get, ["whoami"]), &c);
        assert_eq!(res.data.unwrap()["permissions"], json!(["console"]));
    }
}
