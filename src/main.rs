//! API relay server.
//!
//! ```text
//!     Caller (browser API tester)
//!       │  POST /api/proxy { request: { method, url, headers, body, params } }
//!       ▼
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  http        request id → trace → body limit → handler   │
//!  │    │                                                     │
//!  │    ▼                                                     │
//!  │  forward     descriptor → hop → redirect? → next hop ... │
//!  │    │           │  cookies: replay jar + accumulator      │
//!  │    │           └─ net: DNS → TCP → TLS → hyper           │──▶ Origin
//!  │    ▼                                                     │
//!  │  envelope    status, headers, cookies, body bytes,       │
//!  │              timings, sizes, network info                │
//!  └──────────────────────────────────────────────────────────┘
//!       │
//!       ▼  200 envelope | 500 { statusCode, statusMessage: "Proxy Error", message }
//! ```

use std::path::PathBuf;

use clap::Parser;

use api_relay::config::{load_config, RelayConfig};
use api_relay::lifecycle::{self, Shutdown};
use api_relay::observability::init_logging;

#[derive(Parser)]
#[command(name = "api-relay")]
#[command(about = "Request-forwarding relay for a browser API tester", long_about = None)]
struct Args {
    /// Path to a TOML config file; built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "api-relay starting"
    );

    let shutdown = Shutdown::new();
    lifecycle::spawn_signal_listener(shutdown.clone());
    lifecycle::start(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
