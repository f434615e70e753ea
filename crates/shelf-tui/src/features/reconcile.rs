//! Reconciliation with the Gateway.
//!
//! Applies bootstrap results, queue and shelf-state snapshots, and push
//! events. The Gateway is authoritative: queue and shelf state are always
//! replaced, never merged. Remote events may arrive while local flows are
//! in flight, so every handler re-reads the store instead of trusting
//! earlier assumptions.

use shelf_core::model::{Cell, Job, ShelfLayout};
use shelf_core::push::{JOB_ALREADY_COMPLETED, PushEvent, PushMessage};
use tracing::{debug, info, warn};

use crate::common::{TaskKind, TimerKind};
use crate::effects::UiEffect;
use crate::events::BootstrapOutcome;
use crate::features::navigation;
use crate::features::notifications::NotifyLevel;
use crate::overlays::{LmsAlertState, LmsLocationState, Overlay};
use crate::state::{KioskState, PushStatus};

// ============================================================================
// Bootstrap
// ============================================================================

/// Issues the startup sequence.
pub fn start_bootstrap(kiosk: &mut KioskState) -> Vec<UiEffect> {
    let task = kiosk.start_task(TaskKind::Bootstrap);
    vec![UiEffect::Bootstrap {
        task,
        shelf_id: kiosk.config.effective_shelf_id().map(str::to_string),
        load_pending_jobs: !kiosk.store.ui().pending_jobs_loaded,
    }]
}

/// Applies the startup results in order, then connects the push channel
/// (or starts polling when push is disabled).
pub fn apply_bootstrap(kiosk: &mut KioskState, outcome: BootstrapOutcome) -> Vec<UiEffect> {
    let BootstrapOutcome {
        identity,
        layout,
        pending_jobs,
        queue,
        shelf_state,
    } = outcome;

    match identity {
        Ok(identity) => {
            info!(shelf_id = ?identity.shelf_id, "shelf identity resolved");
            kiosk.store.set_identity(identity);
        }
        Err(e) => warn!(error = %e, "shelf identity unavailable"),
    }

    let layout = layout.unwrap_or_else(|e| {
        warn!(error = %e, "layout unavailable, using default grid");
        ShelfLayout::fallback()
    });
    kiosk.store.set_layout(layout);
    kiosk.store.initialize_shelf_state();

    if let Some(pending) = pending_jobs {
        match pending {
            Ok(jobs) => {
                let mut added = 0usize;
                for job in jobs {
                    if kiosk.store.add_to_queue(job) {
                        added += 1;
                    }
                }
                info!(added, "pending jobs loaded");
            }
            Err(e) => warn!(error = %e, "pending jobs unavailable"),
        }
        kiosk.store.ui_mut().pending_jobs_loaded = true;
    }

    match queue {
        Ok(jobs) => apply_queue(kiosk, jobs),
        Err(e) => warn!(error = %e, "queue sync failed, keeping cached queue"),
    }
    match shelf_state {
        Ok(cells) => kiosk.store.set_shelf_state(cells),
        Err(e) => warn!(error = %e, "shelf state refresh failed"),
    }

    if kiosk.config.push.enabled {
        vec![UiEffect::ConnectPush]
    } else {
        kiosk.push = PushStatus::Polling;
        vec![schedule_poll(kiosk)]
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Authoritative queue replace with desync resolution.
///
/// An active job missing from the Gateway's list is orphaned and cleared.
pub fn apply_queue(kiosk: &mut KioskState, jobs: Vec<Job>) {
    let orphaned = kiosk
        .active_job()
        .filter(|active| !jobs.iter().any(|job| job.job_id == active.job_id))
        .map(|active| active.lot_no.clone());
    if let Some(lot_no) = orphaned {
        warn!(%lot_no, "active job no longer in Gateway queue");
        kiosk.store.clear_active_job();
        kiosk.pending_completion = None;
        kiosk.timers.disarm(TimerKind::ScanConfirm);
        kiosk.notifications.clear_persistent();
        kiosk
            .notifications
            .warning(format!("Job {lot_no} is no longer queued"));
    }
    let dropped = kiosk.store.set_queue(jobs);
    debug!(queued = kiosk.store.queue().len(), dropped, "queue replaced");
}

pub fn handle_queue_result(kiosk: &mut KioskState, result: Result<Vec<Job>, String>) {
    match result {
        Ok(jobs) => apply_queue(kiosk, jobs),
        Err(e) => {
            warn!(error = %e, "queue sync failed");
            kiosk.notifications.error(format!("Queue sync failed: {e}"));
        }
    }
}

pub fn handle_shelf_result(kiosk: &mut KioskState, result: Result<Vec<Cell>, String>) {
    match result {
        Ok(cells) => kiosk.store.set_shelf_state(cells),
        Err(e) => {
            warn!(error = %e, "shelf state refresh failed");
            kiosk
                .notifications
                .error(format!("Shelf state refresh failed: {e}"));
        }
    }
}

// ============================================================================
// Push channel
// ============================================================================

pub fn handle_push_message(
    kiosk: &mut KioskState,
    overlay: &mut Option<Overlay>,
    message: PushMessage,
) -> Vec<UiEffect> {
    match message {
        PushMessage::Connected => {
            info!("push channel connected");
            kiosk.push = PushStatus::Live;
            kiosk.timers.disarm(TimerKind::Poll);
            vec![]
        }
        PushMessage::Disconnected => {
            if kiosk.push == PushStatus::Live {
                kiosk.notifications.warning("Gateway connection lost, reconnecting");
            }
            kiosk.push = PushStatus::Reconnecting;
            vec![]
        }
        PushMessage::GaveUp => {
            if kiosk.push == PushStatus::Polling {
                return vec![];
            }
            warn!("push channel gave up, polling instead");
            kiosk.push = PushStatus::Polling;
            kiosk
                .notifications
                .warning("Live updates unavailable, polling the Gateway");
            vec![schedule_poll(kiosk)]
        }
        PushMessage::Event(event) => handle_push_event(kiosk, overlay, event),
    }
}

fn schedule_poll(kiosk: &mut KioskState) -> UiEffect {
    let interval = kiosk.config.timing.poll_interval();
    kiosk.timers.schedule(TimerKind::Poll, interval)
}

/// Degraded-mode poll: re-sync the queue and shelf state, then re-arm.
pub fn handle_poll_timer(kiosk: &mut KioskState) -> Vec<UiEffect> {
    if kiosk.push != PushStatus::Polling {
        return vec![];
    }
    let mut effects = Vec::new();
    if !kiosk.tasks.shelf_refresh.is_running() {
        effects.push(UiEffect::RefreshShelfState {
            task: kiosk.start_task(TaskKind::ShelfRefresh),
        });
    }
    if !kiosk.tasks.queue_sync.is_running() && !kiosk.tasks.completion.is_running() {
        effects.push(UiEffect::SyncQueue {
            task: kiosk.start_task(TaskKind::QueueSync),
        });
    }
    effects.push(schedule_poll(kiosk));
    effects
}

pub fn handle_push_event(
    kiosk: &mut KioskState,
    overlay: &mut Option<Overlay>,
    event: PushEvent,
) -> Vec<UiEffect> {
    match event {
        PushEvent::InitialState { jobs, shelf_state } => {
            debug!(
                jobs = ?jobs.as_ref().map(Vec::len),
                cells = ?shelf_state.as_ref().map(Vec::len),
                "initial state"
            );
            if let Some(jobs) = jobs {
                // A fresh snapshot supersedes any queue fetch still in flight.
                kiosk.tasks.queue_sync.clear();
                apply_queue(kiosk, jobs);
            }
            if let Some(cells) = shelf_state {
                kiosk.tasks.shelf_refresh.clear();
                kiosk.store.set_shelf_state(cells);
            }
            vec![]
        }
        PushEvent::QueueUpdated(jobs) => {
            kiosk.tasks.queue_sync.clear();
            apply_queue(kiosk, jobs);
            vec![]
        }
        PushEvent::ShelfStateUpdated(cells) => {
            kiosk.tasks.shelf_refresh.clear();
            kiosk.store.set_shelf_state(cells);
            vec![]
        }
        PushEvent::NewJob(job) => {
            let lot_no = job.lot_no.clone();
            if kiosk.store.add_to_queue(job) {
                info!(%lot_no, "new job");
                kiosk.notifications.info(format!("New Lot: {lot_no}"));
                if kiosk.store.ui().show_main_with_queue {
                    navigation::go_to_queue_selection(kiosk);
                }
            }
            vec![]
        }
        PushEvent::JobsReloaded {
            message,
            loaded_count,
            skipped_count,
        } => {
            let level = if loaded_count > 0 {
                NotifyLevel::Success
            } else if skipped_count > 0 {
                NotifyLevel::Warning
            } else {
                NotifyLevel::Info
            };
            let text = if message.is_empty() {
                format!("Jobs reloaded ({loaded_count} loaded, {skipped_count} skipped)")
            } else {
                message
            };
            kiosk.notifications.push(level, text);
            vec![UiEffect::SyncQueue {
                task: kiosk.start_task(TaskKind::QueueSync),
            }]
        }
        PushEvent::JobCompleted {
            job_id,
            lot_no,
            shelf_state,
        } => handle_remote_completion(kiosk, job_id, lot_no, shelf_state),
        PushEvent::JobCanceled { lot_no } => {
            let removed = kiosk.store.remove_lot_from_queue(&lot_no);
            let was_active = kiosk.active_job().is_some_and(|job| job.has_lot(&lot_no));
            info!(%lot_no, removed, was_active, "job canceled remotely");
            if was_active {
                clear_active(kiosk);
                kiosk
                    .notifications
                    .warning(format!("Job for {lot_no} was canceled"));
            } else {
                kiosk.notifications.info(format!("Job canceled: {lot_no}"));
            }
            vec![UiEffect::SyncQueue {
                task: kiosk.start_task(TaskKind::QueueSync),
            }]
        }
        PushEvent::JobWarning { warning, message } => {
            if warning.as_deref() == Some(JOB_ALREADY_COMPLETED) && kiosk.active_job().is_some() {
                info!("active job already completed elsewhere");
                clear_active(kiosk);
            }
            kiosk.notifications.warning(message);
            vec![]
        }
        PushEvent::JobError {
            lot_no,
            location,
            message,
        } => {
            let text = match (lot_no, location) {
                (Some(lot), Some(location)) => format!("Lot {lot} must be placed at {location}"),
                _ => message.unwrap_or_else(|| "Job error".to_string()),
            };
            warn!(%text, "job error");
            kiosk.notifications.error(text);
            vec![]
        }
        PushEvent::SystemReset => {
            warn!("system reset");
            kiosk.store.reset();
            *overlay = None;
            kiosk.notifications.clear();
            reset_flows(kiosk);
            kiosk.notifications.warning("System reset");
            vec![]
        }
        PushEvent::Error { message } => {
            kiosk.notifications.error(message);
            vec![]
        }
        PushEvent::LmsResponse {
            lot_no,
            correct_shelf,
            message,
        } => {
            if overlay.as_ref().is_some_and(Overlay::is_confirm) {
                if let Some(message) = message {
                    kiosk.notifications.info(message);
                }
                return vec![];
            }
            *overlay = Some(match (lot_no, correct_shelf) {
                (Some(lot_no), Some(correct_shelf)) => Overlay::LmsLocation(LmsLocationState {
                    lot_no,
                    correct_shelf,
                }),
                (lot_no, _) => Overlay::LmsAlert(LmsAlertState {
                    title: "LMS".to_string(),
                    message: message
                        .or(lot_no)
                        .unwrap_or_else(|| "No location returned".to_string()),
                }),
            });
            vec![]
        }
    }
}

fn handle_remote_completion(
    kiosk: &mut KioskState,
    job_id: Option<String>,
    lot_no: Option<String>,
    shelf_state: Option<Vec<Cell>>,
) -> Vec<UiEffect> {
    if let Some(id) = job_id.as_deref() {
        kiosk.store.remove_from_queue(id);
    }
    let active_matches = kiosk.active_job().is_some_and(|active| match job_id.as_deref() {
        Some(id) => active.job_id == id,
        None => lot_no.as_deref().is_some_and(|lot| active.has_lot(lot)),
    });
    if active_matches {
        clear_active(kiosk);
    }
    info!(?job_id, ?lot_no, active_matches, "job completed remotely");

    // A queue fetch started earlier may still list the completed job.
    kiosk.tasks.queue_sync.clear();

    let label = lot_no.or(job_id).unwrap_or_default();
    kiosk.notifications.success(format!("Job {label} completed"));

    match shelf_state {
        Some(cells) => {
            kiosk.tasks.shelf_refresh.clear();
            kiosk.store.set_shelf_state(cells);
            vec![]
        }
        None => vec![UiEffect::RefreshShelfState {
            task: kiosk.start_task(TaskKind::ShelfRefresh),
        }],
    }
}

/// Clears the active job and any flow waiting on it.
fn clear_active(kiosk: &mut KioskState) {
    kiosk.store.clear_active_job();
    kiosk.pending_completion = None;
    kiosk.timers.disarm(TimerKind::ScanConfirm);
    kiosk.scan_input.clear();
    kiosk.notifications.clear_persistent();
}

/// Drops every in-flight flow after a reset. The poll timer survives.
fn reset_flows(kiosk: &mut KioskState) {
    kiosk.timers.disarm(TimerKind::AutoReturn);
    kiosk.timers.disarm(TimerKind::ScanConfirm);
    kiosk.timers.disarm(TimerKind::LmsLookup);
    kiosk.tasks.completion.clear();
    kiosk.tasks.queue_sync.clear();
    kiosk.tasks.shelf_refresh.clear();
    kiosk.tasks.lms_lookup.clear();
    kiosk.pending_completion = None;
    kiosk.pending_lookup = None;
    kiosk.lot_input.clear();
    kiosk.scan_input.clear();
    kiosk.highlight = 0;
}

#[cfg(test)]
mod tests {
    use shelf_core::config::Config;
    use shelf_core::model::PlaceFlag;
    use shelf_core::store::{ShelfIdentity, StateStore};

    use super::*;

    fn job(id: &str, lot: &str) -> Job {
        Job {
            job_id: id.to_string(),
            lot_no: lot.to_string(),
            level: 1,
            block: 2,
            place_flg: PlaceFlag::Pick,
            tray_count: None,
            error: false,
            error_type: None,
            error_message: None,
        }
    }

    fn kiosk() -> KioskState {
        KioskState::new(Config::default(), StateStore::in_memory())
    }

    #[test]
    fn test_bootstrap_falls_back_to_default_grid() {
        let mut kiosk = kiosk();
        let effects = apply_bootstrap(
            &mut kiosk,
            BootstrapOutcome {
                identity: Ok(ShelfIdentity::default()),
                layout: Err("down".to_string()),
                pending_jobs: Some(Ok(vec![job("P", "PPP111PPP.01")])),
                queue: Err("down".to_string()),
                shelf_state: Err("down".to_string()),
            },
        );

        assert_eq!(kiosk.store.layout(), &ShelfLayout::fallback());
        assert_eq!(
            kiosk.store.shelf_state().len(),
            ShelfLayout::fallback().empty_shelf_state().len()
        );
        assert!(kiosk.store.ui().pending_jobs_loaded);
        assert!(kiosk.store.find_in_queue("P").is_some());
        assert_eq!(effects, vec![UiEffect::ConnectPush]);
    }

    #[test]
    fn test_desynced_active_job_is_cleared() {
        let mut kiosk = kiosk();
        kiosk.store.set_active_job(Some(job("A", "ABC123DEF.01")));

        apply_queue(&mut kiosk, vec![job("B", "XYZ999ABC.02")]);

        assert!(kiosk.active_job().is_none());
        assert_eq!(kiosk.store.queue().len(), 1);
    }

    #[test]
    fn test_jobs_reloaded_resyncs_queue() {
        let mut kiosk = kiosk();
        let mut overlay = None;
        let effects = handle_push_event(
            &mut kiosk,
            &mut overlay,
            PushEvent::JobsReloaded {
                message: String::new(),
                loaded_count: 3,
                skipped_count: 0,
            },
        );
        assert!(matches!(effects.as_slice(), [UiEffect::SyncQueue { .. }]));
        assert_eq!(
            kiosk.notifications.last().map(|n| n.level),
            Some(NotifyLevel::Success)
        );
    }

    #[test]
    fn test_already_completed_warning_clears_active_job() {
        let mut kiosk = kiosk();
        let mut overlay = None;
        kiosk.store.set_active_job(Some(job("A", "ABC123DEF.01")));

        handle_push_event(
            &mut kiosk,
            &mut overlay,
            PushEvent::JobWarning {
                warning: Some(JOB_ALREADY_COMPLETED.to_string()),
                message: "Job already completed".to_string(),
            },
        );

        assert!(kiosk.active_job().is_none());
    }

    #[test]
    fn test_remote_completion_without_snapshot_refreshes() {
        let mut kiosk = kiosk();
        let mut overlay = None;
        kiosk.store.set_active_job(Some(job("A", "ABC123DEF.01")));

        let effects = handle_push_event(
            &mut kiosk,
            &mut overlay,
            PushEvent::JobCompleted {
                job_id: Some("A".to_string()),
                lot_no: None,
                shelf_state: None,
            },
        );

        assert!(kiosk.active_job().is_none());
        assert!(matches!(
            effects.as_slice(),
            [UiEffect::RefreshShelfState { .. }]
        ));
    }

    #[test]
    fn test_gave_up_starts_polling_once() {
        let mut kiosk = kiosk();
        let mut overlay = None;

        let first = handle_push_message(&mut kiosk, &mut overlay, PushMessage::GaveUp);
        let second = handle_push_message(&mut kiosk, &mut overlay, PushMessage::GaveUp);

        assert_eq!(kiosk.push, PushStatus::Polling);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());

        let polled = handle_poll_timer(&mut kiosk);
        assert_eq!(polled.len(), 3);
    }
}
