//! The process-wide service object.
//!
//! Built once at startup and shared by `Arc`; nothing in the crate reaches for a global.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::certificate::{CertificateScheme, Ed25519Identity, Ed25519Scheme, IdentityKey};
use crate::config::ServerConfig;
use crate::identity::{AdminRegistry, SessionContext, SessionManager};
use crate::resource::{ObserverRegistry, Resource, ResourceTree, RouteError, RouterResource, RouterResourceBuilder};
use crate::resources;

pub struct Services {
    identity: Arc<dyn IdentityKey>,
    scheme: Arc<dyn CertificateScheme>,
    admins: Arc<AdminRegistry>,
    admin_observers: Arc<ObserverRegistry>,
    tree: ResourceTree,
    sessions: SessionManager,
}

impl Services {
    /// Load (or create) the server identity and admin registry under the configured data dir.
    pub fn open(config: &ServerConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create or access data dir: {}", config.data_dir.display()))?;
        let identity = Ed25519Identity::load_or_create_root(&config.identity_path(), &config.server_id)
            .with_context(|| format!("While loading server identity from {}", config.identity_path().display()))?;
        let admins = AdminRegistry::open(&config.admins_path())
            .map_err(|e| anyhow::anyhow!("While loading admin registry: {}", e))?;
        if admins.is_bootstrap_mode() {
            info!(target: "startup", "no admins configured; the first client to authenticate becomes admin");
        }
        Self::builder(Arc::new(identity), Arc::new(admins))
            .build()
            .map_err(|e| anyhow::anyhow!("While building resource tree: {}", e))
    }

    pub fn builder(identity: Arc<dyn IdentityKey>, admins: Arc<AdminRegistry>) -> ServicesBuilder {
        ServicesBuilder { identity, scheme: Arc::new(Ed25519Scheme), admins, root: RouterResource::builder(), error: None }
    }

    pub fn identity(&self) -> &Arc<dyn IdentityKey> {
        &self.identity
    }

    pub fn scheme(&self) -> &Arc<dyn CertificateScheme> {
        &self.scheme
    }

    pub fn admins(&self) -> &Arc<AdminRegistry> {
        &self.admins
    }

    pub fn admin_observers(&self) -> &Arc<ObserverRegistry> {
        &self.admin_observers
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

/// Assembles the resource tree. Host resources are mounted next to the built-ins.
pub struct ServicesBuilder {
    identity: Arc<dyn IdentityKey>,
    scheme: Arc<dyn CertificateScheme>,
    admins: Arc<AdminRegistry>,
    root: RouterResourceBuilder,
    error: Option<RouteError>,
}

impl ServicesBuilder {
    pub fn scheme(mut self, scheme: Arc<dyn CertificateScheme>) -> Self {
        self.scheme = scheme;
        self
    }

    /// Mount a host resource at the top level. Name clashes surface from `build`.
    pub fn mount<R: Resource + 'static>(mut self, name: &str, resource: R) -> Self {
        if self.error.is_some() {
            return self;
        }
        match std::mem::take(&mut self.root).child(name, resource) {
            Ok(root) => self.root = root,
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn build(self) -> Result<Services, RouteError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let admin_observers = ObserverRegistry::shared(format!("/{}", resources::ADMINS));
        let root = self
            .root
            .child(resources::ADMINS, resources::admins_resource(self.admins.clone(), admin_observers.clone()))?
            .child(resources::SERVER, resources::server_info_resource(self.identity.certificate().clone(), self.admins.clone()))?
            .child(resources::WHOAMI, resources::whoami_resource())?
            .build();
        let tree = ResourceTree::new(root);

        let notify = admin_observers.clone();
        self.admins.on_change(Arc::new(move || notify.notify_changed_for_all_clients()));

        let sessions = SessionManager::new(SessionContext {
            identity: self.identity.clone(),
            scheme: self.scheme.clone(),
            admins: self.admins.clone(),
            tree: tree.clone(),
        });
        Ok(Services { identity: self.identity, scheme: self.scheme, admins: self.admins, admin_observers, tree, sessions })
    }
}
