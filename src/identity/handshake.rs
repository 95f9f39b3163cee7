//! Certificate-based mutual authentication handshake.
//!
//! ```text
//!   server                                   client
//!   init_server_hello() ── serverHello ──▶
//!                       ◀── {clientHello, sign_client(server ‖ client)} ──
//!   authenticate():  client cert endorsed by server cert?
//!                    client signature valid over server ‖ client?
//!                    ── sign_server(server ‖ client) ──▶  verify_server()
//! ```
//!
//! `‖` is the concatenation of each hello's canonical bytes:
//! `random ‖ cert.id ‖ cert.modulus ‖ cert.exponent ‖ cert.signature ‖ timestamp(8 BE)`.
//! The timestamp is signed but not checked for staleness.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::certificate::{CertificateScheme, IdentityCertificate, IdentityKey};
use crate::error::AdminError;
use crate::protocol::b64;

pub const NONCE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeHello {
    #[serde(with = "b64")]
    pub random: Vec<u8>,
    pub certificate: IdentityCertificate,
    #[serde(with = "b64::be_i64")]
    pub timestamp: i64,
}

impl HandshakeHello {
    /// Fresh hello with a random nonce and the current unix time in milliseconds.
    pub fn new(certificate: IdentityCertificate) -> Result<Self, HandshakeError> {
        let mut random = vec![0u8; NONCE_LEN];
        getrandom::getrandom(&mut random).map_err(|e| HandshakeError::Random(e.to_string()))?;
        Ok(Self { random, certificate, timestamp: chrono::Utc::now().timestamp_millis() })
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cert = self.certificate.canonical_bytes();
        let mut out = Vec::with_capacity(self.random.len() + cert.len() + 8);
        out.extend_from_slice(&self.random);
        out.extend_from_slice(&cert);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out
    }
}

/// The bytes both parties sign: server hello first, then client hello.
pub fn joint_bytes(server: &HandshakeHello, client: &HandshakeHello) -> Vec<u8> {
    let mut out = server.canonical_bytes();
    out.extend_from_slice(&client.canonical_bytes());
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAuthenticationMessage {
    pub client_hello: HandshakeHello,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("random source unavailable: {0}")]
    Random(String),
    #[error("handshake already concluded")]
    Concluded,
    #[error("server certificate is not the trusted one")]
    UntrustedServer,
}

impl From<HandshakeError> for AdminError {
    fn from(e: HandshakeError) -> Self {
        match e {
            HandshakeError::Random(_) => AdminError::generic("random_unavailable", e.to_string().as_str()),
            HandshakeError::Concluded => AdminError::session_closed(),
            HandshakeError::UntrustedServer => AdminError::auth_failed("untrusted_server", e.to_string().as_str()),
        }
    }
}

/// Internal diagnostic for a failed authentication. Collapsed to a single opaque
/// "unauthorized" outcome before reaching a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("client certificate is not endorsed by the server certificate")]
    UntrustedCertificate,
    #[error("client signature does not verify over the handshake transcript")]
    BadSignature,
    #[error("no server hello outstanding")]
    NoServerHello,
    #[error("handshake already concluded")]
    Concluded,
}

impl AuthFailure {
    pub fn code(self) -> &'static str {
        match self {
            AuthFailure::UntrustedCertificate => "untrusted_certificate",
            AuthFailure::BadSignature => "bad_signature",
            AuthFailure::NoServerHello => "no_server_hello",
            AuthFailure::Concluded => "handshake_concluded",
        }
    }
}

impl From<AuthFailure> for AdminError {
    fn from(f: AuthFailure) -> Self {
        AdminError::auth_failed(f.code(), f.to_string().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    ServerHelloSent,
    Authenticated,
    Rejected,
}

/// Server side of one handshake attempt.
pub struct HandshakeCoordinator {
    identity: Arc<dyn IdentityKey>,
    scheme: Arc<dyn CertificateScheme>,
    state: HandshakeState,
    server_hello: Option<HandshakeHello>,
}

impl HandshakeCoordinator {
    pub fn new(identity: Arc<dyn IdentityKey>, scheme: Arc<dyn CertificateScheme>) -> Self {
        Self { identity, scheme, state: HandshakeState::Init, server_hello: None }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Issue (or re-issue) the server hello. A new call replaces the retained nonce, so a
    /// client response to an earlier hello no longer verifies.
    pub fn init_server_hello(&mut self) -> Result<HandshakeHello, HandshakeError> {
        match self.state {
            HandshakeState::Authenticated | HandshakeState::Rejected => return Err(HandshakeError::Concluded),
            HandshakeState::Init | HandshakeState::ServerHelloSent => {}
        }
        let hello = HandshakeHello::new(self.identity.certificate().clone())?;
        self.server_hello = Some(hello.clone());
        self.state = HandshakeState::ServerHelloSent;
        Ok(hello)
    }

    /// Validate the client's half; on success return the server's verification signature.
    /// Any failure is terminal for this coordinator.
    pub fn authenticate(&mut self, msg: &ClientAuthenticationMessage) -> Result<Vec<u8>, AuthFailure> {
        let outcome = self.check(msg);
        match &outcome {
            Ok(_) => {
                self.state = HandshakeState::Authenticated;
                info!(target: "handshake", client = %msg.client_hello.certificate.id, "client authenticated");
            }
            Err(AuthFailure::Concluded) => {}
            Err(reason) => {
                self.state = HandshakeState::Rejected;
                debug!(target: "handshake", client = %msg.client_hello.certificate.id, reason = reason.code(), "authentication rejected");
            }
        }
        outcome
    }

    fn check(&self, msg: &ClientAuthenticationMessage) -> Result<Vec<u8>, AuthFailure> {
        match self.state {
            HandshakeState::ServerHelloSent => {}
            HandshakeState::Init => return Err(AuthFailure::NoServerHello),
            HandshakeState::Authenticated | HandshakeState::Rejected => return Err(AuthFailure::Concluded),
        }
        let server_hello = self.server_hello.as_ref().ok_or(AuthFailure::NoServerHello)?;
        let client_cert = &msg.client_hello.certificate;
        if !self.scheme.is_endorsed_by(client_cert, self.identity.certificate()) {
            return Err(AuthFailure::UntrustedCertificate);
        }
        let transcript = joint_bytes(server_hello, &msg.client_hello);
        if !self.scheme.verify(client_cert, &transcript, &msg.signature) {
            return Err(AuthFailure::BadSignature);
        }
        Ok(self.identity.sign(&transcript))
    }
}

/// Client side: answers a server hello and checks the server's verification signature.
pub struct ClientHandshake {
    identity: Arc<dyn IdentityKey>,
    scheme: Arc<dyn CertificateScheme>,
    trusted_server: IdentityCertificate,
    transcript: Option<Vec<u8>>,
}

impl ClientHandshake {
    pub fn new(identity: Arc<dyn IdentityKey>, scheme: Arc<dyn CertificateScheme>, trusted_server: IdentityCertificate) -> Self {
        Self { identity, scheme, trusted_server, transcript: None }
    }

    pub fn respond(&mut self, server_hello: &HandshakeHello) -> Result<ClientAuthenticationMessage, HandshakeError> {
        if server_hello.certificate != self.trusted_server {
            return Err(HandshakeError::UntrustedServer);
        }
        let client_hello = HandshakeHello::new(self.identity.certificate().clone())?;
        let transcript = joint_bytes(server_hello, &client_hello);
        let signature = self.identity.sign(&transcript);
        self.transcript = Some(transcript);
        Ok(ClientAuthenticationMessage { client_hello, signature })
    }

    /// True when `signature` is the trusted server's signature over the last transcript.
    pub fn verify_server(&self, signature: &[u8]) -> bool {
        match &self.transcript {
            Some(t) => self.scheme.verify(&self.trusted_server, t, signature),
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "handshake_tests.rs"]
mod tests;
