use std::sync::Arc;

use warden_core::{config::Config, health, logging};

#[tokio::main]
async fn main() -> Result<(), warden_core::Error> {
    logging::init("warden")?;

    let cfg = Arc::new(Config::load()?);

    // Uptime probes hit this while the gateway connection does the real work.
    let port = cfg.http_port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(port).await {
            tracing::error!("liveness endpoint failed: {e}");
        }
    });

    warden_discord::router::run_gateway(cfg)
        .await
        .map_err(|e| warden_core::Error::Gateway(format!("discord gateway failed: {e}")))
}
