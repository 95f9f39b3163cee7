//! Persisted admin registry.
//!
//! Two co-located collections kept 1:1: the admin identity set and one permission record
//! per admin. Both live in one JSON document and are rewritten together (temp file +
//! rename) while the registry mutex is held, so readers never observe one without the other.
//!
//! While the admin set is empty the registry is in bootstrap mode: every client counts as
//! admin, and the first client to connect is promoted for real, which ends bootstrap mode.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::permissions::PermissionSet;
use super::principal::ClientSecurityInfo;
use crate::error::{AdminError, AdminResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub id: String,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AdminDocument {
    #[serde(default)]
    admins: BTreeSet<String>,
    #[serde(default)]
    permissions: BTreeMap<String, PermissionSet>,
}

impl AdminDocument {
    /// Restore the 1:1 invariant after loading a hand-edited or partially written file.
    fn repair(&mut self) -> bool {
        let mut changed = false;
        for id in self.admins.iter() {
            if !self.permissions.contains_key(id) {
                warn!(target: "admins", "admin '{}' had no permission record; granting none", id);
                self.permissions.insert(id.clone(), PermissionSet::none());
                changed = true;
            }
        }
        let orphans: Vec<String> = self.permissions.keys().filter(|id| !self.admins.contains(*id)).cloned().collect();
        for id in orphans {
            warn!(target: "admins", "dropping permission record for non-admin '{}'", id);
            self.permissions.remove(&id);
            changed = true;
        }
        changed
    }
}

pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

pub struct AdminRegistry {
    path: Option<PathBuf>,
    doc: Mutex<AdminDocument>,
    listeners: RwLock<Vec<ChangeCallback>>,
}

impl std::fmt::Debug for AdminRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminRegistry")
            .field("path", &self.path)
            .field("admins", &self.doc.lock().admins.len())
            .finish()
    }
}

impl AdminRegistry {
    /// Registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self { path: None, doc: Mutex::new(AdminDocument::default()), listeners: RwLock::new(Vec::new()) }
    }

    /// Load the registry at `path`; a missing file is an empty registry (bootstrap mode).
    pub fn open(path: &Path) -> AdminResult<Self> {
        let mut doc = if path.exists() {
            let raw = std::fs::read(path)?;
            serde_json::from_slice::<AdminDocument>(&raw)
                .map_err(|e| AdminError::io("admin_registry_corrupt", format!("{}: {}", path.display(), e).as_str()))?
        } else {
            AdminDocument::default()
        };
        let repaired = doc.repair();
        let reg = Self { path: Some(path.to_path_buf()), doc: Mutex::new(doc), listeners: RwLock::new(Vec::new()) };
        if repaired {
            let guard = reg.doc.lock();
            reg.persist(&guard)?;
        }
        info!(target: "admins", "admin registry loaded from {:?} ({} admins)", path, reg.doc.lock().admins.len());
        Ok(reg)
    }

    pub fn on_change(&self, callback: ChangeCallback) {
        self.listeners.write().push(callback);
    }

    pub fn is_bootstrap_mode(&self) -> bool {
        self.doc.lock().admins.is_empty()
    }

    pub fn client_has_admin_permissions(&self, id: &str) -> bool {
        let doc = self.doc.lock();
        doc.admins.is_empty() || doc.admins.contains(id)
    }

    pub fn is_admin(&self, id: &str) -> bool {
        self.doc.lock().admins.contains(id)
    }

    pub fn permissions_for(&self, id: &str) -> Option<PermissionSet> {
        self.doc.lock().permissions.get(id).cloned()
    }

    pub fn records(&self) -> Vec<AdminRecord> {
        let doc = self.doc.lock();
        doc.admins
            .iter()
            .map(|id| AdminRecord { id: id.clone(), permissions: doc.permissions.get(id).cloned().unwrap_or_default() })
            .collect()
    }

    /// Security profile for `id` as of now.
    pub fn security_info(&self, id: Option<&str>, authenticated: bool) -> ClientSecurityInfo {
        if !authenticated {
            return ClientSecurityInfo::anonymous();
        }
        let doc = self.doc.lock();
        if doc.admins.is_empty() {
            return ClientSecurityInfo { authenticated, is_admin: true, permissions: PermissionSet::full() };
        }
        match id.and_then(|i| doc.permissions.get(i).map(|p| (i, p))) {
            Some((i, perms)) if doc.admins.contains(i) => {
                ClientSecurityInfo { authenticated, is_admin: true, permissions: perms.clone() }
            }
            _ => ClientSecurityInfo { authenticated, is_admin: false, permissions: PermissionSet::none() },
        }
    }

    /// Promote `id` with every permission if no admin exists yet. Returns true if promoted.
    pub fn add_first_admin_if_necessary(&self, id: &str) -> AdminResult<bool> {
        {
            let mut doc = self.doc.lock();
            if !doc.admins.is_empty() {
                return Ok(false);
            }
            doc.admins.insert(id.to_string());
            doc.permissions.insert(id.to_string(), PermissionSet::full());
            if let Err(e) = self.persist(&doc) {
                doc.admins.remove(id);
                doc.permissions.remove(id);
                return Err(e);
            }
        }
        info!(target: "admins", "bootstrap: '{}' promoted to first admin", id);
        self.fire_changed();
        Ok(true)
    }

    /// Returns false if `id` was already an admin (permissions left untouched).
    pub fn add_admin(&self, id: &str, permissions: PermissionSet) -> AdminResult<bool> {
        if id.trim().is_empty() {
            return Err(AdminError::invalid_message("invalid_admin_id", "admin id must not be empty"));
        }
        {
            let mut doc = self.doc.lock();
            if doc.admins.contains(id) {
                return Ok(false);
            }
            doc.admins.insert(id.to_string());
            doc.permissions.insert(id.to_string(), permissions);
            if let Err(e) = self.persist(&doc) {
                doc.admins.remove(id);
                doc.permissions.remove(id);
                return Err(e);
            }
        }
        info!(target: "admins", "admin '{}' added", id);
        self.fire_changed();
        Ok(true)
    }

    /// Returns false if `id` was not an admin. Removing the last admin re-enters bootstrap mode.
    pub fn remove_admin(&self, id: &str) -> AdminResult<bool> {
        {
            let mut doc = self.doc.lock();
            if !doc.admins.remove(id) {
                return Ok(false);
            }
            let previous = doc.permissions.remove(id);
            if let Err(e) = self.persist(&doc) {
                doc.admins.insert(id.to_string());
                if let Some(p) = previous {
                    doc.permissions.insert(id.to_string(), p);
                }
                return Err(e);
            }
        }
        info!(target: "admins", "admin '{}' removed", id);
        self.fire_changed();
        Ok(true)
    }

    /// Overlay `permissions` onto an existing admin's record.
    pub fn set_permissions(&self, id: &str, permissions: &PermissionSet) -> AdminResult<PermissionSet> {
        let updated = {
            let mut doc = self.doc.lock();
            if !doc.admins.contains(id) {
                return Err(AdminError::not_found("admin_not_found", format!("no admin '{}'", id).as_str()));
            }
            let previous = doc.permissions.get(id).cloned().unwrap_or_default();
            let mut next = previous.clone();
            next.merge(permissions);
            doc.permissions.insert(id.to_string(), next.clone());
            if let Err(e) = self.persist(&doc) {
                doc.permissions.insert(id.to_string(), previous);
                return Err(e);
            }
            next
        };
        self.fire_changed();
        Ok(updated)
    }

    fn persist(&self, doc: &AdminDocument) -> AdminResult<()> {
        let Some(path) = &self.path else { return Ok(()); };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(doc).map_err(|e| AdminError::io("admin_registry_encode", e.to_string().as_str()))?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn fire_changed(&self) {
        let listeners: Vec<ChangeCallback> = self.listeners.read().clone();
        for cb in listeners {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PermissionKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn bootstrap_promotes_exactly_one_client() {
        let reg = AdminRegistry::in_memory();
        assert!(reg.is_bootstrap_mode());
        assert!(reg.client_has_admin_permissions("anyone"));

        assert!(reg.add_first_admin_if_necessary("alice").unwrap());
        assert!(!reg.is_bootstrap_mode());
        assert_eq!(reg.permissions_for("alice"), Some(PermissionSet::full()));

        assert!(!reg.add_first_admin_if_necessary("bob").unwrap());
        assert!(!reg.client_has_admin_permissions("bob"));
        assert!(!reg.security_info(Some("bob"), true).is_admin);
        assert!(reg.security_info(Some("alice"), true).is_admin);
    }

    #[test]
    fn collections_stay_in_lockstep() {
        let reg = AdminRegistry::in_memory();
        reg.add_admin("alice", PermissionSet::none().with(PermissionKind::Console, true)).unwrap();
        assert!(!reg.add_admin("alice", PermissionSet::full()).unwrap());
        assert!(!reg.permissions_for("alice").unwrap().get(PermissionKind::ManageSaves));

        assert!(reg.remove_admin("alice").unwrap());
        assert_eq!(reg.permissions_for("alice"), None);
        assert!(!reg.remove_admin("alice").unwrap());
        assert!(reg.is_bootstrap_mode());
    }

    #[test]
    fn set_permissions_requires_existing_admin() {
        let reg = AdminRegistry::in_memory();
        let err = reg.set_permissions("ghost", &PermissionSet::full()).unwrap_err();
        assert_eq!(err.code_str(), "admin_not_found");
        reg.add_admin("alice", PermissionSet::none()).unwrap();
        let p = reg.set_permissions("alice", &PermissionSet::default().with(PermissionKind::ViewMap, true)).unwrap();
        assert!(p.get(PermissionKind::ViewMap));
        assert!(!p.get(PermissionKind::Console));
    }

    #[test]
    fn change_callbacks_fire_on_mutation_only() {
        let reg = AdminRegistry::in_memory();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        reg.on_change(Arc::new(move || { c.fetch_add(1, Ordering::SeqCst); }));
        reg.add_admin("alice", PermissionSet::full()).unwrap();
        reg.add_admin("alice", PermissionSet::full()).unwrap();
        reg.remove_admin("nobody").unwrap();
        reg.remove_admin("alice").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn anonymous_profile_ignores_bootstrap() {
        let reg = AdminRegistry::in_memory();
        let info = reg.security_info(None, false);
        assert!(!info.authenticated);
        assert!(!info.is_admin);
    }
}
