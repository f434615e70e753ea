//! View navigation and the auto-return timer.
//!
//! The auto-return timer only runs in Main-with-queue mode. Activity while
//! armed does not re-arm the timer per event; it bumps `last_activity`, and
//! a fire that comes early re-arms itself for the remaining window.

use tracing::{debug, info};

use crate::common::{TaskKind, TimerKind};
use crate::effects::UiEffect;
use crate::state::KioskState;

/// QueueSelection → Main-with-queue. Arms the auto-return timer.
pub fn go_back_to_main(kiosk: &mut KioskState) -> Vec<UiEffect> {
    if kiosk.store.queue().is_empty() && kiosk.active_job().is_none() {
        return vec![];
    }
    let ui = kiosk.store.ui_mut();
    ui.show_main_with_queue = true;
    ui.auto_return_timer_active = true;
    ui.activity_detection_active = true;
    kiosk.timers.touch();
    let window = kiosk.config.timing.auto_return();
    debug!(?window, "auto-return armed");
    vec![kiosk.timers.schedule(TimerKind::AutoReturn, window)]
}

/// Main-with-queue → QueueSelection. Tears the timer down.
pub fn go_to_queue_selection(kiosk: &mut KioskState) {
    let ui = kiosk.store.ui_mut();
    ui.show_main_with_queue = false;
    ui.auto_return_timer_active = false;
    ui.activity_detection_active = false;
    kiosk.timers.disarm(TimerKind::AutoReturn);
}

/// ActiveJob → queue. The job goes back to the end of the queue with its
/// error flags cleared.
pub fn go_back_to_queue(kiosk: &mut KioskState) {
    if let Some(job) = kiosk.store.return_active_to_queue() {
        info!(job_id = %job.job_id, "job returned to queue");
    }
    kiosk.pending_completion = None;
    kiosk.timers.disarm(TimerKind::ScanConfirm);
    kiosk.scan_input.clear();
    kiosk.notifications.clear_persistent();
}

/// Manual refresh: shelf state, then queue. Ignored while either is running.
pub fn refresh(kiosk: &mut KioskState) -> Vec<UiEffect> {
    if kiosk.tasks.queue_sync.is_running() || kiosk.tasks.shelf_refresh.is_running() {
        kiosk.notifications.info("Refresh already in progress");
        return vec![];
    }
    kiosk.notifications.info("Refreshing...");
    vec![
        UiEffect::RefreshShelfState {
            task: kiosk.start_task(TaskKind::ShelfRefresh),
        },
        UiEffect::SyncQueue {
            task: kiosk.start_task(TaskKind::QueueSync),
        },
    ]
}

/// Records user activity. Only meaningful while auto-return is armed.
pub fn note_activity(kiosk: &mut KioskState) {
    if kiosk.store.ui().activity_detection_active {
        kiosk.timers.touch();
    }
}

/// Auto-return fired. Returns to QueueSelection after a full idle window,
/// otherwise re-arms for the rest of it.
pub fn handle_auto_return_timer(kiosk: &mut KioskState) -> Vec<UiEffect> {
    if !kiosk.store.ui().show_main_with_queue {
        return vec![];
    }
    let window = kiosk.config.timing.auto_return();
    let idle = kiosk.timers.idle_for();
    if idle < window {
        return vec![kiosk.timers.schedule(TimerKind::AutoReturn, window - idle)];
    }
    debug!("auto-return to queue selection");
    go_to_queue_selection(kiosk);
    vec![]
}
