//!
//! adminlink certificate tool
//! --------------------------
//! Issues client identities endorsed by the server identity in the data dir, and prints
//! the server certificate clients must pin.
//!
//! USAGE:
//!   adminlink_cert issue <client-id> [--out PATH] [--data-dir PATH] [--server-id ID]
//!   adminlink_cert server [--data-dir PATH] [--server-id ID]
//!   adminlink_cert check <identity-file> [--data-dir PATH] [--server-id ID]

use std::env;
use std::path::PathBuf;

use adminlink::certificate::{CertificateScheme, Ed25519Identity, Ed25519Scheme, IdentityKey};
use adminlink::config::{has_flag, parse_string_arg, ServerConfig};
use anyhow::{bail, Context, Result};

fn usage() {
    println!("adminlink_cert\n\nUSAGE:\n  adminlink_cert issue <client-id> [--out PATH]\n  adminlink_cert server\n  adminlink_cert check <identity-file>\n\nCOMMON OPTIONS:\n  --data-dir PATH    Folder holding server_identity.json (env: ADMINLINK_DATA_DIR)\n  --server-id ID     Id used if the server identity must be created (env: ADMINLINK_SERVER_ID)\n");
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || has_flag(&args, "--help") || has_flag(&args, "-h") {
        usage();
        return Ok(());
    }
    let config = ServerConfig::from_env_and_args(&args)?;
    let server = Ed25519Identity::load_or_create_root(&config.identity_path(), &config.server_id)
        .with_context(|| format!("While loading server identity from {}", config.identity_path().display()))?;

    match args[1].as_str() {
        "issue" => {
            let Some(id) = args.get(2).filter(|a| !a.starts_with("--")) else {
                bail!("issue requires a client id");
            };
            let out = parse_string_arg(&args, "--out")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(format!("{}.identity.json", id)));
            if out.exists() {
                bail!("refusing to overwrite {}", out.display());
            }
            let client = server.issue(id)?;
            client.save(&out)?;
            println!("issued '{}' -> {}", id, out.display());
        }
        "server" => {
            println!("{}", serde_json::to_string_pretty(server.certificate())?);
        }
        "check" => {
            let Some(file) = args.get(2) else { bail!("check requires an identity file") };
            let client = Ed25519Identity::load(std::path::Path::new(file))?;
            if Ed25519Scheme.is_endorsed_by(client.certificate(), server.certificate()) {
                println!("'{}' is endorsed by '{}'", client.certificate().id, server.certificate().id);
            } else {
                bail!("'{}' is NOT endorsed by '{}'", client.certificate().id, server.certificate().id);
            }
        }
        other => {
            usage();
            bail!("unknown command '{}'", other);
        }
    }
    Ok(())
}
