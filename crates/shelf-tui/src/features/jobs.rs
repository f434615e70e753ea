//! Job selection, barcode scans and completion.
//!
//! ```text
//! LOT input ── find_and_select_job_by_lot ──┬─ malformed   → LotWarning popup
//!                                           ├─ queued      → select_job / Confirm popup
//!                                           └─ not queued  → LmsAlert, LMS lookup after delay
//!
//! scan ── handle_scan ──┬─ other queued lot → find_and_select_job_by_lot
//!                       ├─ active lot       → acknowledge
//!                       ├─ target cell      → "correct", complete after delay
//!                       └─ other cell       → wrong-location error on the active job
//! ```
//!
//! None of these functions perform I/O. Network work is returned as effects
//! tagged with a task id; results come back through
//! [`handle_completion_result`] and [`handle_lms_result`].

use shelf_core::gateway::LmsLocation;
use shelf_core::model::PlaceFlag;
use shelf_core::utils::{is_valid_lot_number, parse_location_from_barcode, wrong_location_message};
use tracing::{debug, info, warn};

use crate::common::{TaskKind, TimerKind};
use crate::effects::UiEffect;
use crate::features::notifications::NotifyLevel;
use crate::overlays::{ConfirmState, LmsAlertState, LmsLocationState, LotWarningState, Overlay};
use crate::state::{KioskState, PendingLookup};

// ============================================================================
// Selection
// ============================================================================

/// Moves a queued job into the active slot.
///
/// Returns `false` (and notifies) when the id is not queued.
pub fn select_job(kiosk: &mut KioskState, job_id: &str) -> bool {
    let Some(job) = kiosk.store.activate_from_queue(job_id) else {
        warn!(job_id, "select_job: not in queue");
        kiosk.notifications.error("Job not found in queue");
        return false;
    };

    let location = job
        .location()
        .map_or_else(|| "?".to_string(), |loc| loc.to_string());
    let message = format!(
        "Selected {} ({}) at {}",
        job.lot_no,
        job.place_flg.label(),
        location
    );
    info!(job_id, lot_no = %job.lot_no, "job selected");

    let ui = kiosk.store.ui_mut();
    ui.show_main_with_queue = false;
    ui.auto_return_timer_active = false;
    ui.activity_detection_active = false;
    kiosk.timers.disarm(TimerKind::AutoReturn);

    kiosk.scan_input.clear();
    kiosk.lot_input.clear();
    kiosk.pending_completion = None;
    kiosk.timers.disarm(TimerKind::ScanConfirm);
    kiosk.notifications.clear_persistent();
    kiosk.notifications.info(message);
    true
}

/// Selects a job by LOT number.
///
/// A malformed LOT never touches the queue or the active job.
pub fn find_and_select_job_by_lot(
    kiosk: &mut KioskState,
    overlay: &mut Option<Overlay>,
    lot_no: &str,
) -> Vec<UiEffect> {
    let lot_no = lot_no.trim();
    if !is_valid_lot_number(lot_no) {
        debug!(lot_no, "rejected malformed LOT");
        *overlay = Some(Overlay::LotWarning(LotWarningState {
            input: lot_no.to_string(),
        }));
        return vec![];
    }

    let Some(queued) = kiosk.store.find_in_queue_by_lot(lot_no) else {
        return start_unknown_lot_flow(kiosk, overlay, lot_no);
    };
    let next_job_id = queued.job_id.clone();
    let next_lot = queued.lot_no.clone();

    let other_active = kiosk
        .store
        .active_job()
        .filter(|active| !active.has_lot(lot_no))
        .map(|active| (active.job_id.clone(), active.lot_no.clone()));

    if let Some((current_job_id, current_lot)) = other_active {
        *overlay = Some(Overlay::Confirm(ConfirmState {
            current_job_id,
            current_lot,
            next_job_id,
            next_lot,
        }));
    } else {
        select_job(kiosk, &next_job_id);
    }
    vec![]
}

/// Shows the "not in queue" alert and arms the delayed LMS lookup.
fn start_unknown_lot_flow(
    kiosk: &mut KioskState,
    overlay: &mut Option<Overlay>,
    lot_no: &str,
) -> Vec<UiEffect> {
    info!(lot_no, "LOT not in queue, asking LMS");
    *overlay = Some(Overlay::LmsAlert(LmsAlertState {
        title: "LOT not in job queue".to_string(),
        message: format!("{lot_no} has no job on this shelf. Checking LMS..."),
    }));
    let place_flag = kiosk
        .active_job()
        .map_or(PlaceFlag::Place, |job| job.place_flg);
    kiosk.pending_lookup = Some(PendingLookup {
        lot_no: lot_no.to_string(),
        place_flag,
    });
    let delay = kiosk.config.timing.lms_lookup_delay();
    vec![kiosk.timers.schedule(TimerKind::LmsLookup, delay)]
}

/// LMS delay elapsed: issue the lookup.
pub fn handle_lms_timer(kiosk: &mut KioskState) -> Vec<UiEffect> {
    let Some(pending) = kiosk.pending_lookup.take() else {
        return vec![];
    };
    let task = kiosk.start_task(TaskKind::LmsLookup);
    vec![UiEffect::LookupLms {
        task,
        lot_no: pending.lot_no,
        place_flag: pending.place_flag,
        shelf_id: kiosk.shelf_id(),
    }]
}

/// Presents an LMS answer. A pending confirmation keeps the screen; the
/// answer goes to a notification instead.
pub fn handle_lms_result(
    kiosk: &mut KioskState,
    overlay: &mut Option<Overlay>,
    lot_no: &str,
    result: Result<LmsLocation, String>,
) {
    let confirm_open = overlay.as_ref().is_some_and(Overlay::is_confirm);
    match result {
        Ok(location) => {
            info!(lot_no, shelf = %location.correct_shelf, "LMS location");
            if confirm_open {
                kiosk.notifications.info(format!(
                    "LMS: {} belongs on {}",
                    location.lot_no, location.correct_shelf
                ));
            } else {
                *overlay = Some(Overlay::LmsLocation(LmsLocationState {
                    lot_no: location.lot_no,
                    correct_shelf: location.correct_shelf,
                }));
            }
        }
        Err(message) => {
            warn!(lot_no, error = %message, "LMS lookup failed");
            if confirm_open {
                kiosk
                    .notifications
                    .warning(format!("LMS lookup failed: {message}"));
            } else {
                *overlay = Some(Overlay::LmsAlert(LmsAlertState {
                    title: "LMS lookup failed".to_string(),
                    message: format!("{lot_no}: {message}"),
                }));
            }
        }
    }
}

// ============================================================================
// Scanning
// ============================================================================

/// Handles one scan (or typed barcode) while a job is active.
pub fn handle_scan(
    kiosk: &mut KioskState,
    overlay: &mut Option<Overlay>,
    text: &str,
) -> Vec<UiEffect> {
    let text = text.trim();
    if text.is_empty() {
        return vec![];
    }
    let Some(active) = kiosk.store.active_job() else {
        return find_and_select_job_by_lot(kiosk, overlay, text);
    };

    if active.has_lot(text) {
        let lot = active.lot_no.clone();
        kiosk.notifications.success(format!("Confirmed LOT: {lot}"));
        return vec![];
    }
    if is_valid_lot_number(text) && kiosk.store.find_in_queue_by_lot(text).is_some() {
        return find_and_select_job_by_lot(kiosk, overlay, text);
    }

    let Some(scanned) = parse_location_from_barcode(text) else {
        debug!(text, "unparseable barcode");
        kiosk.notifications.warning("Invalid barcode format");
        return vec![];
    };
    let Some(expected) = active.location() else {
        return vec![];
    };
    let job_id = active.job_id.clone();

    if scanned == expected {
        info!(%job_id, location = %scanned, "correct location scanned");
        kiosk.store.update_active_job(|job| job.clear_error());
        kiosk.notifications.clear_persistent();
        kiosk.notifications.push_persistent(
            NotifyLevel::Success,
            "Correct location! Completing job...",
        );
        kiosk.pending_completion = Some(job_id);
        let delay = kiosk.config.timing.scan_confirm_delay();
        return vec![kiosk.timers.schedule(TimerKind::ScanConfirm, delay)];
    }

    let message = wrong_location_message(scanned, expected);
    warn!(%job_id, %scanned, %expected, "wrong location scanned");
    kiosk
        .store
        .update_active_job(|job| job.mark_wrong_location(message.clone()));
    kiosk.pending_completion = None;
    kiosk.timers.disarm(TimerKind::ScanConfirm);
    kiosk.notifications.clear_persistent();
    kiosk.notifications.push_persistent(
        NotifyLevel::Error,
        message,
    );
    vec![]
}

/// Scan-confirm delay elapsed: complete the job if it is still active.
pub fn handle_scan_confirm_timer(kiosk: &mut KioskState) -> Vec<UiEffect> {
    let Some(job_id) = kiosk.pending_completion.take() else {
        return vec![];
    };
    let still_active = kiosk
        .active_job()
        .is_some_and(|job| job.job_id == job_id && !job.error);
    if !still_active {
        debug!(%job_id, "scan confirm fired for a job that is no longer active");
        return vec![];
    }
    complete_current_job(kiosk, None)
}

// ============================================================================
// Completion
// ============================================================================

/// Sends the completion command for the active job.
///
/// `then_select` is selected once the completion succeeds.
pub fn complete_current_job(kiosk: &mut KioskState, then_select: Option<String>) -> Vec<UiEffect> {
    if kiosk.tasks.completion.is_running() {
        kiosk.notifications.info("A completion is already in progress");
        return vec![];
    }
    kiosk.store.update_active_job(|job| job.clear_error());
    let Some(job) = kiosk.store.active_job() else {
        return vec![];
    };
    let job_id = job.job_id.clone();
    let lot_no = job.lot_no.clone();
    info!(%job_id, %lot_no, "completing job");

    let task = kiosk.start_task(TaskKind::Completion);
    vec![UiEffect::CompleteJob {
        task,
        job_id,
        lot_no,
        then_select,
    }]
}

/// Applies a completion result.
///
/// Success clears the active job only if it is still the completed one,
/// then pulls exactly one fresh shelf-state snapshot. Failure leaves the
/// active job in place.
pub fn handle_completion_result(
    kiosk: &mut KioskState,
    job_id: &str,
    lot_no: &str,
    then_select: Option<String>,
    result: Result<(), String>,
) -> Vec<UiEffect> {
    kiosk.notifications.clear_persistent();

    if let Err(message) = result {
        warn!(job_id, error = %message, "completion failed");
        kiosk
            .notifications
            .error(format!("Completion failed: {message}"));
        return vec![];
    }

    if kiosk
        .active_job()
        .is_some_and(|job| job.job_id == job_id)
    {
        kiosk.store.clear_active_job();
    } else {
        debug!(job_id, "active job changed while completing");
    }
    kiosk.store.remove_from_queue(job_id);
    kiosk.notifications.success(format!("Job {lot_no} completed"));

    // A queue fetch started before the completion may still list this job.
    kiosk.tasks.queue_sync.clear();
    let task = kiosk.start_task(TaskKind::ShelfRefresh);
    let mut effects = vec![UiEffect::RefreshShelfState { task }];

    if let Some(next) = then_select
        && !select_job(kiosk, &next)
    {
        effects.push(UiEffect::SyncQueue {
            task: kiosk.start_task(TaskKind::QueueSync),
        });
    }
    effects
}
