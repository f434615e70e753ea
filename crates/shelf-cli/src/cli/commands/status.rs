//! One-shot Gateway status.

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table};
use shelf_core::config::Config;
use shelf_core::gateway::GatewayClient;
use shelf_core::model::{Cell, Job};
use tracing::warn;

fn queue_table(jobs: &[Job]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Job", "LOT", "Action", "Cell", "Trays"]);
    for job in jobs {
        table.add_row(vec![
            job.job_id.clone(),
            job.lot_no.clone(),
            job.place_flg.label().to_string(),
            job.location()
                .map_or_else(|| "?".to_string(), |loc| loc.to_string()),
            job.tray_count
                .map_or_else(|| "-".to_string(), |count| count.to_string()),
        ]);
    }
    table
}

fn occupancy(cells: &[Cell]) -> (usize, u32) {
    let occupied = cells.iter().filter(|cell| !cell.lots.is_empty()).count();
    let trays = cells.iter().map(Cell::tray_total).fold(0, u32::saturating_add);
    (occupied, trays)
}

pub async fn run(config: &Config) -> Result<()> {
    let client = GatewayClient::new(&config.gateway_url, config.timing.request_timeout())?;
    println!("Gateway: {}", config.gateway_url);

    match config.effective_shelf_id() {
        Some(id) => println!("Shelf: {id} (configured)"),
        None => match client.fetch_shelf_name().await {
            Ok(identity) => println!(
                "Shelf: {} {}",
                identity.shelf_id.as_deref().unwrap_or("?"),
                identity
                    .shelf_name
                    .as_deref()
                    .map(|name| format!("({name})"))
                    .unwrap_or_default()
            ),
            Err(e) => {
                warn!("shelf name lookup failed: {e:#}");
                println!("Shelf: unknown");
            }
        },
    }

    let queue = client.fetch_queue().await.context("fetch queue")?;
    if queue.is_empty() {
        println!("Queue: empty");
    } else {
        println!("Queue: {} job(s)", queue.len());
        println!("{}", queue_table(&queue));
    }

    let cells = client.fetch_shelf_state().await.context("fetch shelf state")?;
    let (occupied, trays) = occupancy(&cells);
    println!("Shelf state: {occupied} occupied cell(s), {trays} tray(s)");
    Ok(())
}
