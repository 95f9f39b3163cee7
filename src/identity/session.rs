use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::admins::AdminRegistry;
use super::handshake::{ClientAuthenticationMessage, HandshakeCoordinator, HandshakeHello};
use super::principal::{Caller, ClientSecurityInfo};
use crate::certificate::{CertificateScheme, IdentityKey};
use crate::error::{AdminError, AdminResult};
use crate::protocol::{b64, ClientMessage, PushMessage};
use crate::resource::{ActionResult, ObserverRegistry, ResourcePath, ResourceRequest, ResourceTree, Verb};
use crate::tprintln;

pub type SessionToken = String;
pub type PushSender = UnboundedSender<PushMessage>;

/// Everything a session needs from the process, shared by all sessions.
#[derive(Clone)]
pub struct SessionContext {
    pub identity: Arc<dyn IdentityKey>,
    pub scheme: Arc<dyn CertificateScheme>,
    pub admins: Arc<AdminRegistry>,
    pub tree: ResourceTree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// Outcome of one inbound message on an event-capable transport.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageOutcome {
    pub result: ActionResult,
    /// The transport should drop the connection after delivering `result`.
    pub close: bool,
}

/// Per-connection state. Wraps exactly one handshake; authenticates at most once.
pub struct Session {
    token: SessionToken,
    state: SessionState,
    client_identity: Option<String>,
    handshake: HandshakeCoordinator,
    ctx: SessionContext,
    outbound: Option<PushSender>,
    subscriptions: HashMap<String, Arc<ObserverRegistry>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("client_identity", &self.client_identity)
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(token: SessionToken, ctx: SessionContext) -> Self {
        let handshake = HandshakeCoordinator::new(ctx.identity.clone(), ctx.scheme.clone());
        Self {
            token,
            state: SessionState::Unauthenticated,
            client_identity: None,
            handshake,
            ctx,
            outbound: None,
            subscriptions: HashMap::new(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn client_identity(&self) -> Option<&str> {
        self.client_identity.as_deref()
    }

    /// Recomputed on every call; admin status can change while the session is live.
    pub fn security_info(&self) -> ClientSecurityInfo {
        self.ctx.admins.security_info(self.client_identity.as_deref(), self.is_authenticated())
    }

    pub fn caller(&self) -> Caller {
        Caller { id: self.client_identity.clone(), session: Some(self.token.clone()), security: self.security_info() }
    }

    pub fn attach_outbound(&mut self, sender: PushSender) {
        self.outbound = Some(sender);
    }

    pub fn server_hello(&mut self) -> AdminResult<HandshakeHello> {
        match self.state {
            SessionState::Closed => Err(AdminError::session_closed()),
            SessionState::Authenticated => Err(AdminError::already_authenticated()),
            SessionState::Unauthenticated => Ok(self.handshake.init_server_hello()?),
        }
    }

    /// Complete the handshake. Failure closes the session and yields a generic
    /// `Unauthorized`; a second call on an authenticated session is rejected without
    /// touching the established identity.
    pub fn authenticate(&mut self, msg: &ClientAuthenticationMessage) -> AdminResult<Vec<u8>> {
        match self.state {
            SessionState::Closed => return Err(AdminError::session_closed()),
            SessionState::Authenticated => return Err(AdminError::already_authenticated()),
            SessionState::Unauthenticated => {}
        }
        match self.handshake.authenticate(msg) {
            Ok(signature) => {
                let id = msg.client_hello.certificate.id.clone();
                self.state = SessionState::Authenticated;
                self.client_identity = Some(id.clone());
                if let Err(e) = self.ctx.admins.add_first_admin_if_necessary(&id) {
                    error!(target: "session", "could not record first admin '{}': {}", id, e);
                }
                info!(target: "session", client = %id, "session authenticated");
                Ok(signature)
            }
            Err(reason) => {
                warn!(target: "session", "handshake failed; closing session");
                tprintln!("session.auth_failed reason={}", reason.code());
                self.disconnect();
                Err(AdminError::from(reason).client_facing())
            }
        }
    }

    pub fn dispatch(&self, request: ResourceRequest) -> ActionResult {
        if self.state == SessionState::Closed {
            return AdminError::session_closed().into();
        }
        self.ctx.tree.handle(request, &self.caller())
    }

    /// Register for change/event pushes on the resource at `path`. The caller must be
    /// allowed to read that resource.
    pub fn subscribe(&mut self, path: Vec<String>) -> ActionResult {
        if self.state == SessionState::Closed {
            return AdminError::session_closed().into();
        }
        let Some(sender) = self.outbound.clone() else {
            return ActionResult::not_allowed("this transport cannot receive push messages");
        };
        let method = match self.ctx.tree.resolve(Verb::Get, &mut ResourcePath::new(path.clone())) {
            Ok(m) => m,
            Err(e) => return e.into(),
        };
        if let Err(denied) = method.requirement.evaluate(&self.security_info()) {
            return denied.into();
        }
        let Some(registry) = self.ctx.tree.find_observable(&path) else {
            return ActionResult::not_allowed("resource is not observable");
        };
        // read access is re-checked on every delivery; a caller who lost it is dropped
        let requirement = method.requirement;
        let admins = self.ctx.admins.clone();
        let client = self.client_identity.clone();
        let authenticated = self.is_authenticated();
        let token = self.token.clone();
        let weak = Arc::downgrade(&registry);
        registry.register(
            &self.token,
            Arc::new(move |n| {
                if requirement.evaluate(&admins.security_info(client.as_deref(), authenticated)).is_err() {
                    debug!(target: "session", client = ?client, "subscriber lost read access; dropping");
                    if let Some(reg) = weak.upgrade() {
                        reg.unregister(&token);
                    }
                    return;
                }
                // receiver gone means the connection is closing; nothing to do
                let _ = sender.send(PushMessage::from(n));
            }),
        );
        self.subscriptions.insert(registry.resource_path().to_string(), registry);
        ActionResult::ok()
    }

    pub fn unsubscribe(&mut self, path: Vec<String>) -> ActionResult {
        let Some(registry) = self.ctx.tree.find_observable(&path) else {
            return ActionResult::not_found("no observable resource at that path");
        };
        registry.unregister(&self.token);
        self.subscriptions.remove(registry.resource_path());
        ActionResult::ok()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Drop all observer registrations and close. Idempotent.
    pub fn disconnect(&mut self) {
        for (_, registry) in self.subscriptions.drain() {
            registry.unregister(&self.token);
        }
        self.outbound = None;
        if self.state != SessionState::Closed {
            debug!(target: "session", client = ?self.client_identity, "session closed");
        }
        self.state = SessionState::Closed;
    }

    /// Handle one decoded envelope from an event-capable transport.
    pub fn handle(&mut self, msg: ClientMessage) -> MessageOutcome {
        match msg {
            ClientMessage::Hello => match self.server_hello() {
                Ok(hello) => MessageOutcome {
                    result: ActionResult::ok_with(json!({ "token": self.token, "serverHello": hello })),
                    close: false,
                },
                Err(e) => MessageOutcome { result: e.into(), close: false },
            },
            ClientMessage::Authenticate(auth) => match self.authenticate(&auth) {
                Ok(signature) => MessageOutcome {
                    result: ActionResult::ok_with(json!({ "signature": base64::engine::general_purpose::STANDARD.encode(signature) })),
                    close: false,
                },
                Err(e) => {
                    let close = self.state == SessionState::Closed;
                    MessageOutcome { result: e.into(), close }
                }
            },
            ClientMessage::Request(req) => MessageOutcome { result: self.dispatch(req), close: false },
            ClientMessage::Subscribe { path } => MessageOutcome { result: self.subscribe(path), close: false },
            ClientMessage::Unsubscribe { path } => MessageOutcome { result: self.unsubscribe(path), close: false },
            ClientMessage::Logout => {
                self.disconnect();
                MessageOutcome { result: ActionResult::ok(), close: true }
            }
        }
    }
}

/// Response body for a verification signature on connectionless transports.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VerificationResponse {
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
}

pub type SharedSession = Arc<Mutex<Session>>;

fn gen_token() -> AdminResult<SessionToken> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AdminError::generic("random_unavailable", e.to_string().as_str()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Token-addressed sessions for transports without a persistent connection.
pub struct SessionManager {
    ctx: SessionContext,
    sessions: RwLock<HashMap<SessionToken, SharedSession>>,
}

impl SessionManager {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// New unauthenticated session.
    pub fn open_session(&self) -> AdminResult<(SessionToken, SharedSession)> {
        let token = gen_token()?;
        let session = Arc::new(Mutex::new(Session::new(token.clone(), self.ctx.clone())));
        self.sessions.write().insert(token.clone(), session.clone());
        tprintln!("session.open token_len={}", token.len());
        Ok((token, session))
    }

    /// New session with its server hello already issued (handshake start).
    pub fn open(&self) -> AdminResult<(SessionToken, HandshakeHello)> {
        let (token, session) = self.open_session()?;
        let hello = session.lock().server_hello();
        match hello {
            Ok(h) => Ok((token, h)),
            Err(e) => {
                self.close(&token);
                Err(e)
            }
        }
    }

    /// Unknown or closed tokens are an `InvalidSession`, distinct from auth failure.
    pub fn get(&self, token: &str) -> AdminResult<SharedSession> {
        let found = self.sessions.read().get(token).cloned();
        match found {
            Some(s) if s.lock().state() != SessionState::Closed => Ok(s),
            Some(_) => {
                self.sessions.write().remove(token);
                Err(AdminError::invalid_session())
            }
            None => Err(AdminError::invalid_session()),
        }
    }

    pub fn close(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        match removed {
            Some(s) => {
                s.lock().disconnect();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drop closed sessions. Sessions busy in a handler are skipped until the next sweep;
    /// the map is write-locked only for the removals.
    pub fn sweep_closed(&self) -> usize {
        let entries: Vec<(SessionToken, SharedSession)> =
            self.sessions.read().iter().map(|(t, s)| (t.clone(), s.clone())).collect();
        let closed: Vec<SessionToken> = entries
            .into_iter()
            .filter(|(_, s)| s.try_lock().is_some_and(|g| g.state() == SessionState::Closed))
            .map(|(t, _)| t)
            .collect();
        if closed.is_empty() {
            return 0;
        }
        let mut map = self.sessions.write();
        closed.iter().filter(|t| map.remove(t.as_str()).is_some()).count()
    }
}
