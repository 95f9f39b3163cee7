//! Who is on the other end of a session and what they may do.
//!
//! The handshake establishes a client identity from a certificate; the admin registry
//! maps that identity to an admin flag and permission set; sessions tie the two
//! together per connection.

pub mod admins;
pub mod handshake;
mod permissions;
mod principal;
pub mod session;

pub use admins::{AdminRecord, AdminRegistry};
pub use handshake::{
    ClientAuthenticationMessage, ClientHandshake, HandshakeCoordinator, HandshakeHello, HandshakeState,
};
pub use permissions::{PermissionKind, PermissionSet};
pub use principal::{Caller, ClientSecurityInfo};
pub use session::{MessageOutcome, Session, SessionContext, SessionManager, SessionState, SessionToken, SharedSession};
