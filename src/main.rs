//!
//! adminlink server binary
//! -----------------------
//! Starts the HTTP/WebSocket admin endpoint. Configuration comes from CLI flags and
//! environment variables; see `adminlink::config`.

use std::env;

use adminlink::config::{has_flag, ServerConfig, DEFAULT_BIND, DEFAULT_DATA_DIR, DEFAULT_HTTP_PORT, DEFAULT_SERVER_ID};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!(
            "adminlink server\n\nUSAGE:\n  adminlink [--http-port N] [--bind ADDR] [--data-dir PATH] [--server-id ID]\n\nOPTIONS:\n  --http-port N      HTTP/WS port (env: ADMINLINK_HTTP_PORT, default {})\n  --bind ADDR        Listen address (env: ADMINLINK_BIND, default {})\n  --data-dir PATH    Identity and admin registry folder (env: ADMINLINK_DATA_DIR, default {})\n  --server-id ID     Id for a newly created server certificate (env: ADMINLINK_SERVER_ID, default {})\n",
            DEFAULT_HTTP_PORT, DEFAULT_BIND, DEFAULT_DATA_DIR, DEFAULT_SERVER_ID
        );
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env_and_args(&args)?;
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "adminlink",
        "adminlink starting: RUST_LOG='{}', addr={}, data_dir={:?}, server_id='{}'",
        rust_log,
        config.socket_addr(),
        config.data_dir,
        config.server_id
    );

    adminlink::server::run(config).await
}
