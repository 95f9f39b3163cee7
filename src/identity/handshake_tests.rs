use super::*;
use crate::certificate::{Ed25519Identity, Ed25519Scheme};

fn server() -> Arc<Ed25519Identity> {
    Arc::new(Ed25519Identity::root_from_seed("server", [11u8; 32]))
}

fn coordinator(server: &Arc<Ed25519Identity>) -> HandshakeCoordinator {
    HandshakeCoordinator::new(server.clone(), Arc::new(Ed25519Scheme))
}

fn client_for(server: &Arc<Ed25519Identity>, identity: Ed25519Identity) -> ClientHandshake {
    ClientHandshake::new(Arc::new(identity), Arc::new(Ed25519Scheme), server.certificate().clone())
}

#[test]
fn endorsed_client_authenticates_and_can_verify_server() {
    let srv = server();
    let mut coord = coordinator(&srv);
    let hello = coord.init_server_hello().unwrap();
    assert_eq!(hello.random.len(), NONCE_LEN);
    assert_eq!(coord.state(), HandshakeState::ServerHelloSent);

    let mut client = client_for(&srv, srv.issue_from_seed("alice", [1u8; 32]));
    let msg = client.respond(&hello).unwrap();
    let verification = coord.authenticate(&msg).unwrap();
    assert_eq!(coord.state(), HandshakeState::Authenticated);
    assert!(client.verify_server(&verification));
    assert!(Ed25519Scheme.verify(srv.certificate(), &joint_bytes(&hello, &msg.client_hello), &verification));
}

#[test]
fn unendorsed_certificate_is_rejected() {
    let srv = server();
    let rogue = Ed25519Identity::root_from_seed("rogue", [2u8; 32]);
    let mut coord = coordinator(&srv);
    let hello = coord.init_server_hello().unwrap();
    let mut client = client_for(&srv, rogue.issue_from_seed("alice", [1u8; 32]));
    let msg = client.respond(&hello).unwrap();
    assert_eq!(coord.authenticate(&msg), Err(AuthFailure::UntrustedCertificate));
    assert_eq!(coord.state(), HandshakeState::Rejected);
}

#[test]
fn signature_from_another_key_is_rejected() {
    let srv = server();
    let alice = srv.issue_from_seed("alice", [1u8; 32]);
    let imposter = srv.issue_from_seed("alice", [3u8; 32]);
    let mut coord = coordinator(&srv);
    let hello = coord.init_server_hello().unwrap();

    let mut real = client_for(&srv, alice);
    let mut msg = real.respond(&hello).unwrap();
    // re-sign the genuine transcript with a different private key
    msg.signature = imposter.sign(&joint_bytes(&hello, &msg.client_hello));
    assert_eq!(coord.authenticate(&msg), Err(AuthFailure::BadSignature));
}

#[test]
fn both_rejections_look_identical_to_a_client() {
    let a = AdminError::from(AuthFailure::UntrustedCertificate).client_facing();
    let b = AdminError::from(AuthFailure::BadSignature).client_facing();
    assert_eq!(a, b);
}

#[test]
fn reissued_hello_invalidates_previous_response() {
    let srv = server();
    let mut coord = coordinator(&srv);
    let first = coord.init_server_hello().unwrap();
    let mut client = client_for(&srv, srv.issue_from_seed("alice", [1u8; 32]));
    let stale = client.respond(&first).unwrap();
    let _second = coord.init_server_hello().unwrap();
    assert_eq!(coord.authenticate(&stale), Err(AuthFailure::BadSignature));
}

#[test]
fn authenticate_without_hello_and_after_conclusion() {
    let srv = server();
    let mut coord = coordinator(&srv);
    let mut client = client_for(&srv, srv.issue_from_seed("alice", [1u8; 32]));
    let other = coordinator(&srv).init_server_hello().unwrap();
    let msg = client.respond(&other).unwrap();
    assert_eq!(coord.authenticate(&msg), Err(AuthFailure::NoServerHello));
    // terminal like any other failure
    assert_eq!(coord.state(), HandshakeState::Rejected);
    assert_eq!(coord.init_server_hello(), Err(HandshakeError::Concluded));
    assert_eq!(coord.authenticate(&msg), Err(AuthFailure::Concluded));
}

#[test]
fn client_refuses_unknown_server() {
    let srv = server();
    let other = Arc::new(Ed25519Identity::root_from_seed("other", [4u8; 32]));
    let hello = coordinator(&other).init_server_hello().unwrap();
    let mut client = client_for(&srv, srv.issue_from_seed("alice", [1u8; 32]));
    assert_eq!(client.respond(&hello).unwrap_err(), HandshakeError::UntrustedServer);
    assert!(!client.verify_server(&[0u8; 64]));
}

#[test]
fn hello_wire_shape() {
    let srv = server();
    let hello = coordinator(&srv).init_server_hello().unwrap();
    let v = serde_json::to_value(&hello).unwrap();
    assert!(v["random"].is_string());
    assert!(v["timestamp"].is_string());
    assert_eq!(v["certificate"]["id"], "server");
    let back: HandshakeHello = serde_json::from_value(v).unwrap();
    assert_eq!(back, hello);
}
