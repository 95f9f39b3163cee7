//! Admin registry persistence: reopen round trips and repair of a drifted document.

use anyhow::Result;
use tempfile::tempdir;

use adminlink::identity::{AdminRegistry, PermissionKind, PermissionSet};

#[test]
fn registry_survives_reopen() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("admins.json");
    {
        let reg = AdminRegistry::open(&path)?;
        assert!(reg.is_bootstrap_mode());
        reg.add_first_admin_if_necessary("alice")?;
        reg.add_admin("bob", PermissionSet::none().with(PermissionKind::Console, true))?;
        reg.set_permissions("bob", &PermissionSet::default().with(PermissionKind::ViewMetrics, true))?;
    }
    let reg = AdminRegistry::open(&path)?;
    assert!(!reg.is_bootstrap_mode());
    assert_eq!(reg.permissions_for("alice"), Some(PermissionSet::full()));
    let bob = reg.permissions_for("bob").unwrap();
    assert!(bob.get(PermissionKind::Console) && bob.get(PermissionKind::ViewMetrics));
    assert!(!bob.get(PermissionKind::ManageAdmins));
    assert_eq!(reg.records().len(), 2);
    Ok(())
}

#[test]
fn drifted_document_is_repaired_on_load() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("admins.json");
    std::fs::write(
        &path,
        r#"{"admins":["alice","bob"],"permissions":{"alice":{"console":true},"ghost":{"console":true}}}"#,
    )?;
    let reg = AdminRegistry::open(&path)?;
    assert_eq!(reg.permissions_for("bob"), Some(PermissionSet::none()));
    assert_eq!(reg.permissions_for("ghost"), None);
    assert!(reg.permissions_for("alice").unwrap().get(PermissionKind::Console));

    // repaired document was written back
    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert!(raw["permissions"].get("ghost").is_none());
    assert!(raw["permissions"].get("bob").is_some());
    Ok(())
}

#[test]
fn corrupt_document_is_an_error_not_bootstrap() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("admins.json");
    std::fs::write(&path, b"{ not json")?;
    let err = AdminRegistry::open(&path).unwrap_err();
    assert_eq!(err.code_str(), "admin_registry_corrupt");
    Ok(())
}

#[test]
fn removing_last_admin_reenters_bootstrap() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("nested").join("admins.json");
    let reg = AdminRegistry::open(&path)?;
    reg.add_first_admin_if_necessary("alice")?;
    assert!(path.exists());
    reg.remove_admin("alice")?;
    let reopened = AdminRegistry::open(&path)?;
    assert!(reopened.is_bootstrap_mode());
    assert!(reopened.client_has_admin_permissions("anyone"));
    Ok(())
}
