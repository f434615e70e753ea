//! Full-screen kiosk UI for the smart shelf.

pub mod common;
pub mod effects;
pub mod events;
pub mod features;
pub mod overlays;
pub mod render;
pub mod runtime;
pub mod screen;
pub mod state;
pub mod update;
pub mod view;

use std::io::{IsTerminal, Write, stderr};

use anyhow::Result;
pub use runtime::KioskRuntime;
use shelf_core::config::Config;
use shelf_core::gateway::GatewayClient;
use shelf_core::store::{FileCache, StateStore};

/// Runs the kiosk until the operator quits.
pub async fn run_kiosk(config: Config) -> Result<()> {
    // The kiosk renders a full-screen UI
    if !stderr().is_terminal() {
        anyhow::bail!(
            "The kiosk requires a terminal.\n\
             Use `shelf status` for a non-interactive snapshot."
        );
    }

    let gateway = GatewayClient::new(&config.gateway_url, config.timing.request_timeout())?;

    let mut store = StateStore::new(Box::new(FileCache::new(config.effective_cache_dir())));
    store.hydrate();

    let mut err = stderr();
    writeln!(err, "Smart Shelf")?;
    writeln!(err, "Gateway: {}", config.gateway_url)?;
    if let Some(shelf_id) = config.effective_shelf_id() {
        writeln!(err, "Shelf: {shelf_id}")?;
    }
    err.flush()?;

    let mut runtime = KioskRuntime::new(config, store, gateway)?;
    let result = runtime.run();
    runtime.clear_leds().await;
    drop(runtime);
    result?;

    // Terminal is restored by now
    writeln!(stderr(), "Goodbye!")?;

    Ok(())
}
