use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AdminError::invalid_message("bad_input", "oops").http_status(), 400);
    assert_eq!(AdminError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(AdminError::not_allowed("not_allowed", "no put").http_status(), 405);
    assert_eq!(AdminError::conflict("conflict", "dup").http_status(), 409);
    assert_eq!(AdminError::unauthorized().http_status(), 401);
    assert_eq!(AdminError::forbidden("forbidden", "no").http_status(), 403);
    assert_eq!(AdminError::io("io", "disk").http_status(), 503);
    assert_eq!(AdminError::generic("internal", "boom").http_status(), 500);
}

#[test]
fn authentication_failures_are_collapsed() {
    let untrusted = AdminError::auth_failed("untrusted_certificate", "issuer mismatch").client_facing();
    let bad_sig = AdminError::auth_failed("bad_signature", "signature mismatch").client_facing();
    assert_eq!(untrusted, bad_sig);
    assert_eq!(untrusted.code_str(), "unauthorized");
    assert_eq!(untrusted.message(), "unauthorized");
}

#[test]
fn invalid_session_is_distinct_from_unauthorized() {
    let s = AdminError::invalid_session();
    assert_eq!(s.code_str(), "invalid_session");
    assert_ne!(s, AdminError::unauthorized());
    // client_facing leaves it alone
    assert_eq!(s.clone().client_facing(), s);
}

#[test]
fn action_status_mapping() {
    assert_eq!(AdminError::invalid_message("x", "y").action_status(), ActionStatus::BadRequest);
    assert_eq!(AdminError::forbidden("x", "y").action_status(), ActionStatus::Forbidden);
    assert_eq!(AdminError::not_allowed("x", "y").action_status(), ActionStatus::ActionNotAllowed);
    assert_eq!(AdminError::already_authenticated().action_status(), ActionStatus::Conflict);
    assert_eq!(AdminError::io("x", "y").action_status(), ActionStatus::GenericError);
}
