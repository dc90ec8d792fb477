//! Chat relay: every connected client hears every other client.
//!
//! Run with `cargo run --example relay_server`, then connect any WebSocket
//! client to `ws://127.0.0.1:8080`. Set `RUST_LOG=wsrelay=debug` for more
//! detail. Stop with Ctrl-C.

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wsrelay::{
    FullDuplexConnection, Outgoing, ServerConfig, SessionState, Topology, WebSocketServer,
};

#[tokio::main]
async fn main() -> wsrelay::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("relay_server=info,wsrelay=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = WebSocketServer::new(ServerConfig::default());
    let registry = server.registry().clone();

    server
        .on_client_connect(move |joined| {
            // Pair the newcomer with everyone already here; earlier pairs
            // were wired when those clients joined.
            for other in registry.snapshot() {
                if other.same_session(joined) || other.state() != SessionState::Established {
                    continue;
                }
                match FullDuplexConnection::new(vec![other, joined.clone()]) {
                    Ok(pair) => pair.open_communication_channels(),
                    Err(e) => warn!(error = %e, "failed to pair clients"),
                }
            }

            let greeting = Outgoing::from(format!("client {} joined", joined.id()));
            let others = |session: &wsrelay::ClientSession, _: usize| !session.same_session(joined);
            let notified = registry.broadcast(&greeting, Some(&others));
            info!(session_id = %joined.id(), notified, "client joined");

            let _ = joined.send(&format!("welcome, you are client {}", joined.id()));
        })
        .on_client_message(|message, session| {
            info!(session_id = %session.id(), message, "relaying");
        })
        .on_client_disconnect(|session| {
            info!(session_id = %session.id(), "client left");
        });

    let handle = server.listen().await?;
    info!(addr = %handle.local_addr(), "relay server ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
    handle.shutdown().await;
    Ok(())
}
