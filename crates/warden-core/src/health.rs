//! Minimal liveness endpoint for external uptime probes. Not part of the
//! bot core; it only proves the process is up.

use std::net::{Ipv4Addr, SocketAddr};

use axum::{routing::get, Router};

use crate::Result;

async fn alive() -> &'static str {
    "Bot is alive!"
}

pub async fn serve(port: u16) -> Result<()> {
    let app = Router::new().route("/", get(alive));
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("liveness endpoint on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_liveness_string() {
        assert_eq!(alive().await, "Bot is alive!");
    }
}
