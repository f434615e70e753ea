//! Kiosk command handler.

use anyhow::Result;
use shelf_core::config::Config;
use shelf_core::logging;
use tracing::info;

pub async fn run(config: Config) -> Result<()> {
    // Held until the kiosk exits so buffered lines get flushed
    let _log_guard = logging::init_file(&config.logging)?;
    info!(gateway = %config.gateway_url, "starting kiosk");

    shelf_tui::run_kiosk(config).await
}
