//!
//! adminlink configuration
//! -----------------------
//! Runtime settings resolved from, in order of precedence: CLI flags, environment
//! variables, built-in defaults.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

pub const ENV_HTTP_PORT: &str = "ADMINLINK_HTTP_PORT";
pub const ENV_DATA_DIR: &str = "ADMINLINK_DATA_DIR";
pub const ENV_SERVER_ID: &str = "ADMINLINK_SERVER_ID";
pub const ENV_BIND: &str = "ADMINLINK_BIND";

pub const DEFAULT_HTTP_PORT: u16 = 7879;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_SERVER_ID: &str = "adminlink-server";
pub const DEFAULT_BIND: &str = "0.0.0.0";

pub const SERVER_IDENTITY_FILE: &str = "server_identity.json";
pub const ADMINS_FILE: &str = "admins.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub http_port: u16,
    pub bind: IpAddr,
    pub data_dir: PathBuf,
    pub server_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            bind: IpAddr::from([0, 0, 0, 0]),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            server_id: DEFAULT_SERVER_ID.to_string(),
        }
    }
}

impl ServerConfig {
    /// Resolve from the process environment and `args` (as from `env::args()`).
    pub fn from_env_and_args(args: &[String]) -> anyhow::Result<Self> {
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve<F>(args: &[String], lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_port = match parse_string_arg(args, "--http-port").or_else(|| lookup(ENV_HTTP_PORT)) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("invalid http port '{}': {}", raw, e))?,
            None => DEFAULT_HTTP_PORT,
        };
        let bind_raw = parse_string_arg(args, "--bind").or_else(|| lookup(ENV_BIND)).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .trim()
            .parse::<IpAddr>()
            .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {}", bind_raw, e))?;
        let data_dir = parse_string_arg(args, "--data-dir")
            .or_else(|| lookup(ENV_DATA_DIR))
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let server_id = parse_string_arg(args, "--server-id")
            .or_else(|| lookup(ENV_SERVER_ID))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_ID.to_string());
        Ok(Self { http_port, bind, data_dir: PathBuf::from(data_dir), server_id })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.http_port)
    }

    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join(SERVER_IDENTITY_FILE)
    }

    pub fn admins_path(&self) -> PathBuf {
        self.data_dir.join(ADMINS_FILE)
    }
}

/// Value following `flag`, if both are present.
pub fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_apply_when_nothing_set() {
        let cfg = ServerConfig::resolve(&args(&["adminlink"]), |_| None).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.socket_addr().to_string(), "0.0.0.0:7879");
        assert_eq!(cfg.identity_path(), PathBuf::from("data").join("server_identity.json"));
    }

    #[test]
    fn flag_beats_env_beats_default() {
        let env: HashMap<&str, &str> =
            [(ENV_HTTP_PORT, "9000"), (ENV_DATA_DIR, "/srv/env"), (ENV_SERVER_ID, "from-env")].into_iter().collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());
        let cfg = ServerConfig::resolve(&args(&["adminlink", "--http-port", "9100"]), lookup).unwrap();
        assert_eq!(cfg.http_port, 9100);
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/env"));
        assert_eq!(cfg.server_id, "from-env");
        assert_eq!(cfg.bind.to_string(), DEFAULT_BIND);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(ServerConfig::resolve(&args(&["x", "--http-port", "http"]), |_| None).is_err());
        assert!(ServerConfig::resolve(&args(&["x"]), |k| (k == ENV_BIND).then(|| "nowhere".to_string())).is_err());
    }

    #[test]
    fn trailing_flag_without_value_is_ignored() {
        let a = args(&["x", "--data-dir"]);
        assert_eq!(parse_string_arg(&a, "--data-dir"), None);
        assert!(has_flag(&a, "--data-dir"));
    }
}
