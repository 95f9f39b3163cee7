//! Identity certificates and the signing capability behind the handshake.
//!
//! The handshake only needs two operations: sign bytes as "me" and verify bytes signed by
//! the holder of a certificate. Both are traits so the session layer never touches key
//! material directly. [`Ed25519Identity`] / [`Ed25519Scheme`] are the shipped implementation.
//!
//! Wire layout of a certificate is `{id, modulus, exponent, signature}`. For Ed25519 the
//! `modulus` carries the 32-byte verifying key and `exponent` is empty. The issuer signature
//! covers `id ‖ modulus ‖ exponent`; a root certificate signs itself.

use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::protocol::b64;

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("random source unavailable: {0}")]
    Random(String),
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("certificate does not match the stored key")]
    KeyMismatch,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCertificate {
    pub id: String,
    #[serde(with = "b64")]
    pub modulus: Vec<u8>,
    #[serde(with = "b64")]
    pub exponent: Vec<u8>,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
}

impl IdentityCertificate {
    /// Bytes the issuer signs when endorsing this certificate.
    pub fn endorsement_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.id.len() + self.modulus.len() + self.exponent.len());
        out.extend_from_slice(self.id.as_bytes());
        out.extend_from_slice(&self.modulus);
        out.extend_from_slice(&self.exponent);
        out
    }

    /// `id ‖ modulus ‖ exponent ‖ signature`, the certificate part of a hello's canonical form.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.endorsement_bytes();
        out.extend_from_slice(&self.signature);
        out
    }
}

/// Verification half of the capability. Stateless.
pub trait CertificateScheme: Send + Sync {
    /// True when `signature` over `data` was produced by the key inside `signer`.
    fn verify(&self, signer: &IdentityCertificate, data: &[u8], signature: &[u8]) -> bool;

    /// Chain-of-trust check: `certificate` carries a valid endorsement by `issuer`.
    fn is_endorsed_by(&self, certificate: &IdentityCertificate, issuer: &IdentityCertificate) -> bool {
        self.verify(issuer, &certificate.endorsement_bytes(), &certificate.signature)
    }
}

/// Signing half of the capability, bound to one identity.
pub trait IdentityKey: Send + Sync {
    fn certificate(&self) -> &IdentityCertificate;
    fn sign(&self, data: &[u8]) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Scheme;

impl CertificateScheme for Ed25519Scheme {
    fn verify(&self, signer: &IdentityCertificate, data: &[u8], signature: &[u8]) -> bool {
        let Ok(key_bytes) = <[u8; 32]>::try_from(signer.modulus.as_slice()) else { return false; };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else { return false; };
        let Ok(sig) = Signature::from_slice(signature) else { return false; };
        key.verify(data, &sig).is_ok()
    }
}

pub struct Ed25519Identity {
    key: SigningKey,
    certificate: IdentityCertificate,
}

impl std::fmt::Debug for Ed25519Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Identity").field("id", &self.certificate.id).finish_non_exhaustive()
    }
}

fn random_seed() -> Result<[u8; 32], CertificateError> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| CertificateError::Random(e.to_string()))?;
    Ok(seed)
}

fn unsigned_certificate(id: &str, key: &SigningKey) -> IdentityCertificate {
    IdentityCertificate {
        id: id.to_string(),
        modulus: key.verifying_key().to_bytes().to_vec(),
        exponent: Vec::new(),
        signature: Vec::new(),
    }
}

impl Ed25519Identity {
    /// Fresh self-endorsed identity, used as the server's trust root.
    pub fn generate_root(id: &str) -> Result<Self, CertificateError> {
        Ok(Self::root_from_seed(id, random_seed()?))
    }

    pub fn root_from_seed(id: &str, seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let mut certificate = unsigned_certificate(id, &key);
        certificate.signature = key.sign(&certificate.endorsement_bytes()).to_bytes().to_vec();
        Self { key, certificate }
    }

    /// New identity endorsed by `self`.
    pub fn issue(&self, id: &str) -> Result<Self, CertificateError> {
        Ok(self.issue_from_seed(id, random_seed()?))
    }

    pub fn issue_from_seed(&self, id: &str, seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let mut certificate = unsigned_certificate(id, &key);
        certificate.signature = self.sign(&certificate.endorsement_bytes());
        Self { key, certificate }
    }

    pub fn seed(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    pub fn to_stored(&self) -> StoredIdentity {
        StoredIdentity { seed: self.seed().to_vec(), certificate: self.certificate.clone() }
    }

    pub fn from_stored(stored: StoredIdentity) -> Result<Self, CertificateError> {
        let seed = <[u8; 32]>::try_from(stored.seed.as_slice())
            .map_err(|_| CertificateError::InvalidKey(format!("seed must be 32 bytes, got {}", stored.seed.len())))?;
        let key = SigningKey::from_bytes(&seed);
        if key.verifying_key().to_bytes().as_slice() != stored.certificate.modulus.as_slice() {
            return Err(CertificateError::KeyMismatch);
        }
        Ok(Self { key, certificate: stored.certificate })
    }

    pub fn save(&self, path: &Path) -> Result<(), CertificateError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_vec_pretty(&self.to_stored())?;
        std::fs::write(path, body)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CertificateError> {
        let raw = std::fs::read(path)?;
        let stored: StoredIdentity = serde_json::from_slice(&raw)?;
        Self::from_stored(stored)
    }

    /// Load the identity at `path`, creating a new root identity there on first use.
    pub fn load_or_create_root(path: &Path, id: &str) -> Result<Self, CertificateError> {
        if path.exists() {
            return Self::load(path);
        }
        let identity = Self::generate_root(id)?;
        identity.save(path)?;
        info!(target: "certificate", "created server identity '{}' at {:?}", id, path);
        Ok(identity)
    }
}

impl IdentityKey for Ed25519Identity {
    fn certificate(&self) -> &IdentityCertificate {
        &self.certificate
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.key.sign(data).to_bytes().to_vec()
    }
}

/// On-disk form of an identity: private seed plus its certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    #[serde(with = "b64")]
    pub seed: Vec<u8>,
    pub certificate: IdentityCertificate,
}
