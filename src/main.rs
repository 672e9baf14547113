///
/// Runs the type service: the registered local types exposed over HTTP,
/// following the remote validation and representation protocol.
///
///   GET  /validate          lists the registered type names
///   POST /validate/{type}   {"value": .., "size": ..}, 200 when valid
///   POST /repr/{type}       {"value": .., "environment": {..}}, 200 with the representation
///
/// Usage: slotbase [settings file]
///
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use slotbase::datatype::TypeRegistry;
use slotbase::error::{Result, SlotbaseError};
use slotbase::server::router;
use slotbase::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args().nth(1);
    let settings = Settings::load(path.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let registry = Arc::new(TypeRegistry::with_builtins());
    let addr = settings.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SlotbaseError::Transport(format!("cannot bind {}: {}", addr, e)))?;
    info!(%addr, types = ?registry.names(), "type service listening");
    axum::serve(listener, router(registry))
        .await
        .map_err(|e| SlotbaseError::Transport(e.to_string()))?;
    Ok(())
}
