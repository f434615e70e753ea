use shelf_core::gateway::GatewayClient;
use shelf_core::model::PlaceFlag;
use shelf_core::store::ShelfIdentity;
use tracing::{debug, info};

use crate::common::TaskId;
use crate::events::{BootstrapOutcome, TaskResult, UiEvent};

fn message(e: &anyhow::Error) -> String {
    format!("{e:#}")
}

fn completed(id: TaskId, result: TaskResult) -> UiEvent {
    UiEvent::TaskCompleted { id, result }
}

/// Startup sequence. Steps run in order; each failure is carried to the
/// reducer and never aborts the later steps.
pub async fn bootstrap(
    client: GatewayClient,
    task: TaskId,
    shelf_id: Option<String>,
    load_pending_jobs: bool,
) -> UiEvent {
    let identity = match shelf_id {
        Some(id) => Ok(ShelfIdentity {
            shelf_id: Some(id),
            shelf_name: None,
        }),
        None => client.fetch_shelf_name().await.map_err(|e| message(&e)),
    };
    let shelf_id = identity
        .as_ref()
        .ok()
        .and_then(|identity| identity.shelf_id.clone());
    info!(?shelf_id, "bootstrapping");

    let layout = client
        .fetch_config(shelf_id.as_deref())
        .await
        .map_err(|e| message(&e));

    let pending_jobs = match (load_pending_jobs, shelf_id.as_deref()) {
        (true, Some(id)) => Some(client.fetch_pending_jobs(id).await.map_err(|e| message(&e))),
        (true, None) => {
            debug!("no shelf id, skipping pending jobs");
            None
        }
        (false, _) => None,
    };

    let queue = client.fetch_queue().await.map_err(|e| message(&e));
    let shelf_state = client.fetch_shelf_state().await.map_err(|e| message(&e));

    completed(
        task,
        TaskResult::Bootstrap(Box::new(BootstrapOutcome {
            identity,
            layout,
            pending_jobs,
            queue,
            shelf_state,
        })),
    )
}

pub async fn sync_queue(client: GatewayClient, task: TaskId) -> UiEvent {
    let result = client.fetch_queue().await.map_err(|e| message(&e));
    completed(task, TaskResult::QueueSynced(result))
}

pub async fn refresh_shelf_state(client: GatewayClient, task: TaskId) -> UiEvent {
    let result = client.fetch_shelf_state().await.map_err(|e| message(&e));
    completed(task, TaskResult::ShelfRefreshed(result))
}

pub async fn complete_job(
    client: GatewayClient,
    task: TaskId,
    job_id: String,
    lot_no: String,
    then_select: Option<String>,
) -> UiEvent {
    let result = client.complete_job(&job_id).await.map_err(|e| message(&e));
    completed(
        task,
        TaskResult::JobCompleted {
            job_id,
            lot_no,
            then_select,
            result,
        },
    )
}

pub async fn lookup_lms(
    client: GatewayClient,
    task: TaskId,
    lot_no: String,
    place_flag: PlaceFlag,
    shelf_id: Option<String>,
) -> UiEvent {
    let result = client
        .lookup_correct_shelf(&lot_no, place_flag, shelf_id.as_deref())
        .await
        .map_err(|e| message(&e));
    completed(task, TaskResult::LmsLookedUp { lot_no, result })
}
