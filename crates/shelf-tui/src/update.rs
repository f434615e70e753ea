//! Kiosk reducer (update function).
//!
//! All state mutations happen here. The runtime calls `update(app, event)`
//! and executes the returned effects.
//!
//! Every path ends in [`view::sync_view`], so the view and the LED plan are
//! re-evaluated after each mutation, whatever its source.

use std::time::Instant;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use shelf_core::store::View;
use tracing::debug;

use crate::common::TimerKind;
use crate::effects::UiEffect;
use crate::events::{TaskResult, UiEvent};
use crate::features::{jobs, navigation, reconcile};
use crate::overlays::{OverlayAction, OverlayTransition};
use crate::state::{AppState, KioskState};
use crate::view;

/// The main reducer function.
///
/// Takes the current state and an event, mutates state, and returns effects
/// for the runtime to execute.
pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    let mut effects = match event {
        UiEvent::Init => reconcile::start_bootstrap(&mut app.kiosk),
        UiEvent::Tick => {
            app.kiosk.notifications.prune(Instant::now());
            vec![]
        }
        UiEvent::Frame { width, height } => {
            app.kiosk.size = (width, height);
            vec![]
        }
        UiEvent::Terminal(term_event) => handle_terminal_event(app, term_event),
        UiEvent::TaskCompleted { id, result } => {
            let kind = result.kind();
            if app.kiosk.tasks.state_mut(kind).finish_if_active(id) {
                handle_task_result(app, result)
            } else {
                debug!(?kind, ?id, "dropping stale task result");
                vec![]
            }
        }
        UiEvent::Push(message) => {
            reconcile::handle_push_message(&mut app.kiosk, &mut app.overlay, message)
        }
        UiEvent::TimerFired { kind, generation } => {
            if app.kiosk.timers.accept(kind, generation) {
                handle_timer(&mut app.kiosk, kind)
            } else {
                debug!(?kind, generation, "dropping stale timer fire");
                vec![]
            }
        }
    };

    effects.extend(view::sync_view(&mut app.kiosk));
    effects
}

fn handle_task_result(app: &mut AppState, result: TaskResult) -> Vec<UiEffect> {
    let kiosk = &mut app.kiosk;
    match result {
        TaskResult::Bootstrap(outcome) => reconcile::apply_bootstrap(kiosk, *outcome),
        TaskResult::QueueSynced(result) => {
            reconcile::handle_queue_result(kiosk, result);
            vec![]
        }
        TaskResult::ShelfRefreshed(result) => {
            reconcile::handle_shelf_result(kiosk, result);
            vec![]
        }
        TaskResult::JobCompleted {
            job_id,
            lot_no,
            then_select,
            result,
        } => jobs::handle_completion_result(kiosk, &job_id, &lot_no, then_select, result),
        TaskResult::LmsLookedUp { lot_no, result } => {
            jobs::handle_lms_result(kiosk, &mut app.overlay, &lot_no, result);
            vec![]
        }
    }
}

fn handle_timer(kiosk: &mut KioskState, kind: TimerKind) -> Vec<UiEffect> {
    match kind {
        TimerKind::AutoReturn => navigation::handle_auto_return_timer(kiosk),
        TimerKind::ScanConfirm => jobs::handle_scan_confirm_timer(kiosk),
        TimerKind::LmsLookup => jobs::handle_lms_timer(kiosk),
        TimerKind::Poll => reconcile::handle_poll_timer(kiosk),
    }
}

// ============================================================================
// Terminal input
// ============================================================================

fn handle_terminal_event(app: &mut AppState, event: Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            navigation::note_activity(&mut app.kiosk);
            handle_key(app, key)
        }
        Event::Mouse(_) => {
            navigation::note_activity(&mut app.kiosk);
            vec![]
        }
        Event::Paste(text) => {
            navigation::note_activity(&mut app.kiosk);
            if app.overlay.is_none() {
                let text: String = text.chars().filter(|c| !c.is_control()).collect();
                if let Some(input) = active_input(&mut app.kiosk) {
                    input.push_str(&text);
                }
            }
            vec![]
        }
        _ => vec![],
    }
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.kiosk.should_quit = true;
        return vec![UiEffect::Quit];
    }

    if let Some(overlay) = app.overlay.as_mut() {
        let update = overlay.handle_key(&app.kiosk, key);
        if update.transition == OverlayTransition::Close {
            app.overlay = None;
        }
        return update
            .action
            .map(|action| handle_overlay_action(app, action))
            .unwrap_or_default();
    }

    if key.code == KeyCode::F(5) {
        return navigation::refresh(&mut app.kiosk);
    }

    match app.kiosk.store.ui().current_view {
        View::Main => handle_main_key(&mut app.kiosk, key),
        View::QueueSelection => handle_queue_key(app, key),
        View::ActiveJob => handle_active_job_key(app, key),
    }
}

fn handle_overlay_action(app: &mut AppState, action: OverlayAction) -> Vec<UiEffect> {
    let kiosk = &mut app.kiosk;
    match action {
        OverlayAction::CompleteAndSwitch {
            current_job_id,
            next_job_id,
        } => {
            debug!(%current_job_id, %next_job_id, "complete and switch");
            jobs::complete_current_job(kiosk, Some(next_job_id))
        }
        OverlayAction::ContinueCurrent { lot_no } => {
            kiosk.notifications.info(format!("Continuing {lot_no}"));
            vec![]
        }
        OverlayAction::SelectJob { job_id, lot_no } => {
            if kiosk.store.find_in_queue(&job_id).is_none() {
                kiosk
                    .notifications
                    .warning(format!("{lot_no} is no longer queued"));
                return vec![];
            }
            // Asks again if yet another job became active meanwhile.
            jobs::find_and_select_job_by_lot(kiosk, &mut app.overlay, &lot_no)
        }
    }
}

fn handle_main_key(kiosk: &mut KioskState, key: KeyEvent) -> Vec<UiEffect> {
    if !kiosk.store.ui().show_main_with_queue {
        return vec![];
    }
    if matches!(key.code, KeyCode::Tab | KeyCode::Enter) {
        navigation::go_to_queue_selection(kiosk);
    }
    vec![]
}

fn handle_queue_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    let kiosk = &mut app.kiosk;
    match key.code {
        KeyCode::Up => {
            kiosk.highlight = kiosk.highlight.saturating_sub(1);
            vec![]
        }
        KeyCode::Down => {
            let last = kiosk.store.queue().len().saturating_sub(1);
            kiosk.highlight = (kiosk.highlight + 1).min(last);
            vec![]
        }
        KeyCode::Enter => {
            if !kiosk.lot_input.trim().is_empty() {
                let lot_no = std::mem::take(&mut kiosk.lot_input);
                return jobs::find_and_select_job_by_lot(kiosk, &mut app.overlay, &lot_no);
            }
            let highlighted = view::ordered_queue(kiosk.store.queue())
                .get(kiosk.highlight)
                .map(|job| job.job_id.clone());
            if let Some(job_id) = highlighted {
                jobs::select_job(kiosk, &job_id);
            }
            vec![]
        }
        KeyCode::Esc => {
            if kiosk.lot_input.is_empty() {
                navigation::go_back_to_main(kiosk)
            } else {
                kiosk.lot_input.clear();
                vec![]
            }
        }
        KeyCode::Backspace => {
            kiosk.lot_input.pop();
            vec![]
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            kiosk.lot_input.push(c);
            vec![]
        }
        _ => vec![],
    }
}

fn handle_active_job_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    let kiosk = &mut app.kiosk;
    match key.code {
        KeyCode::Enter => {
            let text = std::mem::take(&mut kiosk.scan_input);
            jobs::handle_scan(kiosk, &mut app.overlay, &text)
        }
        KeyCode::Esc => {
            navigation::go_back_to_queue(kiosk);
            vec![]
        }
        KeyCode::Backspace => {
            kiosk.scan_input.pop();
            vec![]
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            kiosk.scan_input.push(c);
            vec![]
        }
        _ => vec![],
    }
}

/// The text input the current view types into.
fn active_input(kiosk: &mut KioskState) -> Option<&mut String> {
    match kiosk.store.ui().current_view {
        View::QueueSelection => Some(&mut kiosk.lot_input),
        View::ActiveJob => Some(&mut kiosk.scan_input),
        View::Main => None,
    }
}

#[cfg(test)]
mod tests {
    use shelf_core::config::Config;
    use shelf_core::gateway::{LedCommand, LmsLocation};
    use shelf_core::model::{Job, JobErrorKind, PlaceFlag};
    use shelf_core::push::{PushEvent, PushMessage};
    use shelf_core::store::StateStore;

    use super::*;
    use crate::common::TaskId;
    use crate::overlays::{ConfirmState, Overlay};

    fn job(id: &str, lot: &str, level: u32, block: u32, place_flg: PlaceFlag) -> Job {
        Job {
            job_id: id.to_string(),
            lot_no: lot.to_string(),
            level,
            block,
            place_flg,
            tray_count: None,
            error: false,
            error_type: None,
            error_message: None,
        }
    }

    fn app_with_queue(jobs: Vec<Job>) -> AppState {
        let mut app = AppState::new(Config::default(), StateStore::in_memory());
        app.kiosk.store.set_queue(jobs);
        view::sync_view(&mut app.kiosk);
        app
    }

    fn press(app: &mut AppState, code: KeyCode) -> Vec<UiEffect> {
        update(
            app,
            UiEvent::Terminal(Event::Key(KeyEvent::new(code, KeyModifiers::NONE))),
        )
    }

    fn type_and_submit(app: &mut AppState, text: &str) -> Vec<UiEffect> {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
        press(app, KeyCode::Enter)
    }

    fn active_id(app: &AppState) -> Option<&str> {
        app.kiosk.active_job().map(|job| job.job_id.as_str())
    }

    fn fire_scheduled(app: &mut AppState, effects: &[UiEffect], wanted: TimerKind) -> Vec<UiEffect> {
        let generation = effects
            .iter()
            .find_map(|effect| match effect {
                UiEffect::ScheduleTimer {
                    kind, generation, ..
                } if *kind == wanted => Some(*generation),
                _ => None,
            })
            .expect("timer scheduled");
        update(
            app,
            UiEvent::TimerFired {
                kind: wanted,
                generation,
            },
        )
    }

    fn completion_task(effects: &[UiEffect]) -> TaskId {
        effects
            .iter()
            .find_map(|effect| match effect {
                UiEffect::CompleteJob { task, .. } => Some(*task),
                _ => None,
            })
            .expect("completion issued")
    }

    fn count_refreshes(effects: &[UiEffect]) -> usize {
        effects
            .iter()
            .filter(|effect| matches!(effect, UiEffect::RefreshShelfState { .. }))
            .count()
    }

    #[test]
    fn test_lot_entry_selects_queued_job() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        assert_eq!(app.kiosk.store.ui().current_view, View::QueueSelection);

        let effects = type_and_submit(&mut app, "ABC123DEF.01");

        assert!(app.kiosk.store.queue().is_empty());
        assert_eq!(active_id(&app), Some("A"));
        assert_eq!(app.kiosk.store.ui().current_view, View::ActiveJob);
        assert!(effects.iter().any(|effect| matches!(
            effect,
            UiEffect::ApplyLed(LedCommand::Single(_))
        )));
    }

    #[test]
    fn test_malformed_lot_mutates_nothing() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);

        type_and_submit(&mut app, "bad-format");

        assert!(matches!(app.overlay, Some(Overlay::LotWarning(_))));
        assert_eq!(app.kiosk.store.queue().len(), 1);
        assert!(app.kiosk.active_job().is_none());
    }

    #[test]
    fn test_enter_without_input_selects_highlighted_job() {
        let mut app = app_with_queue(vec![
            job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Pick),
            job("B", "XYZ999ABC.02", 2, 3, PlaceFlag::Place),
        ]);

        // Place jobs are listed first.
        press(&mut app, KeyCode::Enter);

        assert_eq!(active_id(&app), Some("B"));
        assert!(app.kiosk.store.find_in_queue("B").is_none());
    }

    #[test]
    fn test_correct_scan_completes_after_delay() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 2, 3, PlaceFlag::Place)]);
        type_and_submit(&mut app, "ABC123DEF.01");

        let scheduled = type_and_submit(&mut app, "L2B3");
        assert!(!app.kiosk.active_job().is_some_and(|job| job.error));

        let effects = fire_scheduled(&mut app, &scheduled, TimerKind::ScanConfirm);
        let task = completion_task(&effects);

        let effects = update(
            &mut app,
            UiEvent::TaskCompleted {
                id: task,
                result: TaskResult::JobCompleted {
                    job_id: "A".to_string(),
                    lot_no: "ABC123DEF.01".to_string(),
                    then_select: None,
                    result: Ok(()),
                },
            },
        );

        assert!(app.kiosk.active_job().is_none());
        assert_eq!(count_refreshes(&effects), 1);
        assert!(effects.contains(&UiEffect::ApplyLed(LedCommand::Clear)));
    }

    #[test]
    fn test_failed_completion_keeps_active_job() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 2, 3, PlaceFlag::Place)]);
        type_and_submit(&mut app, "ABC123DEF.01");
        let scheduled = type_and_submit(&mut app, "2-3");
        let effects = fire_scheduled(&mut app, &scheduled, TimerKind::ScanConfirm);
        let task = completion_task(&effects);

        let effects = update(
            &mut app,
            UiEvent::TaskCompleted {
                id: task,
                result: TaskResult::JobCompleted {
                    job_id: "A".to_string(),
                    lot_no: "ABC123DEF.01".to_string(),
                    then_select: None,
                    result: Err("Job already completed".to_string()),
                },
            },
        );

        assert_eq!(active_id(&app), Some("A"));
        assert_eq!(count_refreshes(&effects), 0);
        assert!(!app.kiosk.tasks.completion.is_running());
    }

    #[test]
    fn test_wrong_scan_marks_error_with_both_cells() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        type_and_submit(&mut app, "ABC123DEF.01");

        let effects = type_and_submit(&mut app, "L2B3");

        let active = app.kiosk.active_job().expect("still active");
        assert!(active.error);
        assert_eq!(active.error_type, Some(JobErrorKind::WrongLocation));
        let message = active.error_message.as_deref().unwrap_or_default();
        assert!(message.find("L2-B3") < message.find("L1-B1"));
        assert!(effects.iter().any(|effect| matches!(
            effect,
            UiEffect::ApplyLed(LedCommand::Batch { spots, .. }) if spots.len() == 2
        )));
        assert!(!app.kiosk.timers.slot(TimerKind::ScanConfirm).is_armed());
    }

    #[test]
    fn test_unparseable_scan_only_warns() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        type_and_submit(&mut app, "ABC123DEF.01");

        let effects = type_and_submit(&mut app, "???");

        assert!(effects.is_empty());
        assert!(!app.kiosk.active_job().is_some_and(|job| job.error));
    }

    #[test]
    fn test_scanning_other_queued_lot_asks_for_confirmation() {
        let mut app = app_with_queue(vec![
            job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place),
            job("B", "XYZ999ABC.02", 2, 3, PlaceFlag::Place),
        ]);
        type_and_submit(&mut app, "ABC123DEF.01");

        type_and_submit(&mut app, "XYZ999ABC.02");
        assert!(matches!(app.overlay, Some(Overlay::Confirm(_))));
        assert_eq!(active_id(&app), Some("A"));

        let effects = press(&mut app, KeyCode::Char('y'));
        assert!(app.overlay.is_none());
        let task = completion_task(&effects);

        update(
            &mut app,
            UiEvent::TaskCompleted {
                id: task,
                result: TaskResult::JobCompleted {
                    job_id: "A".to_string(),
                    lot_no: "ABC123DEF.01".to_string(),
                    then_select: Some("B".to_string()),
                    result: Ok(()),
                },
            },
        );

        assert_eq!(active_id(&app), Some("B"));
        assert!(app.kiosk.store.queue().is_empty());
    }

    #[test]
    fn test_declining_confirmation_keeps_current_job() {
        let mut app = app_with_queue(vec![
            job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place),
            job("B", "XYZ999ABC.02", 2, 3, PlaceFlag::Place),
        ]);
        type_and_submit(&mut app, "ABC123DEF.01");
        type_and_submit(&mut app, "XYZ999ABC.02");

        let effects = press(&mut app, KeyCode::Char('n'));

        assert!(app.overlay.is_none());
        assert_eq!(active_id(&app), Some("A"));
        assert!(app.kiosk.store.find_in_queue("B").is_some());
        assert!(!effects.iter().any(|e| matches!(e, UiEffect::CompleteJob { .. })));
    }

    #[test]
    fn test_remote_cancel_of_active_lot_clears_it() {
        let mut app = app_with_queue(vec![job("A", "XYZ999ABC.02", 1, 1, PlaceFlag::Pick)]);
        type_and_submit(&mut app, "XYZ999ABC.02");
        assert_eq!(active_id(&app), Some("A"));

        update(
            &mut app,
            UiEvent::Push(PushMessage::Event(PushEvent::JobCanceled {
                lot_no: "XYZ999ABC.02".to_string(),
            })),
        );

        assert!(app.kiosk.active_job().is_none());
        assert!(app.kiosk.notifications.iter().any(|n| {
            n.level == crate::features::notifications::NotifyLevel::Warning
        }));
    }

    #[test]
    fn test_stale_queue_result_is_dropped() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        let first = navigation::refresh(&mut app.kiosk);
        let stale = first
            .iter()
            .find_map(|effect| match effect {
                UiEffect::SyncQueue { task } => Some(*task),
                _ => None,
            })
            .expect("sync issued");
        // A push snapshot supersedes the in-flight fetch.
        update(
            &mut app,
            UiEvent::Push(PushMessage::Event(PushEvent::QueueUpdated(vec![job(
                "B",
                "XYZ999ABC.02",
                2,
                2,
                PlaceFlag::Place,
            )]))),
        );

        update(
            &mut app,
            UiEvent::TaskCompleted {
                id: stale,
                result: TaskResult::QueueSynced(Ok(vec![])),
            },
        );

        assert!(app.kiosk.store.find_in_queue("B").is_some());
    }

    #[test]
    fn test_active_job_never_in_queue_after_new_job_push() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        type_and_submit(&mut app, "ABC123DEF.01");

        update(
            &mut app,
            UiEvent::Push(PushMessage::Event(PushEvent::NewJob(job(
                "A",
                "ABC123DEF.01",
                1,
                1,
                PlaceFlag::Place,
            )))),
        );

        assert!(app.kiosk.store.find_in_queue("A").is_none());
    }

    #[test]
    fn test_escape_paths_and_auto_return() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);

        let effects = press(&mut app, KeyCode::Esc);
        assert_eq!(app.kiosk.store.ui().current_view, View::Main);
        assert!(app.kiosk.store.ui().show_main_with_queue);

        // Pretend the operator has been idle for the whole window.
        app.kiosk.timers.last_activity =
            Instant::now() - app.kiosk.config.timing.auto_return();
        fire_scheduled(&mut app, &effects, TimerKind::AutoReturn);
        assert_eq!(app.kiosk.store.ui().current_view, View::QueueSelection);
        assert!(!app.kiosk.store.ui().auto_return_timer_active);
    }

    #[test]
    fn test_go_back_to_queue_requeues_without_error() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        type_and_submit(&mut app, "ABC123DEF.01");
        type_and_submit(&mut app, "L3B3");

        press(&mut app, KeyCode::Esc);

        assert!(app.kiosk.active_job().is_none());
        let requeued = app.kiosk.store.find_in_queue("A").expect("requeued");
        assert!(!requeued.error);
        assert_eq!(app.kiosk.store.ui().current_view, View::QueueSelection);
    }

    #[test]
    fn test_identical_led_plans_are_not_resent() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);

        let effects = update(&mut app, UiEvent::Tick);

        assert!(effects.is_empty());
    }

    #[test]
    fn test_system_reset_wipes_everything() {
        let mut app = app_with_queue(vec![
            job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place),
            job("B", "XYZ999ABC.02", 2, 3, PlaceFlag::Place),
        ]);
        type_and_submit(&mut app, "ABC123DEF.01");

        update(
            &mut app,
            UiEvent::Push(PushMessage::Event(PushEvent::SystemReset)),
        );

        assert!(app.kiosk.active_job().is_none());
        assert!(app.kiosk.store.queue().is_empty());
        assert_eq!(app.kiosk.store.ui().current_view, View::Main);
    }

    fn push(app: &mut AppState, event: PushEvent) -> Vec<UiEffect> {
        update(app, UiEvent::Push(PushMessage::Event(event)))
    }

    fn lms_task(effects: &[UiEffect]) -> TaskId {
        effects
            .iter()
            .find_map(|effect| match effect {
                UiEffect::LookupLms { task, .. } => Some(*task),
                _ => None,
            })
            .expect("LMS lookup issued")
    }

    fn lms_result(app: &mut AppState, task: TaskId, result: Result<LmsLocation, String>) {
        update(
            app,
            UiEvent::TaskCompleted {
                id: task,
                result: TaskResult::LmsLookedUp {
                    lot_no: "QQQ111QQQ.09".to_string(),
                    result,
                },
            },
        );
    }

    /// Submits a lot the queue doesn't know and waits out the LMS delay.
    fn start_lms_lookup(app: &mut AppState) -> TaskId {
        let scheduled = type_and_submit(app, "QQQ111QQQ.09");
        assert!(matches!(app.overlay, Some(Overlay::LmsAlert(_))));
        let effects = fire_scheduled(app, &scheduled, TimerKind::LmsLookup);
        lms_task(&effects)
    }

    fn confirm_overlay() -> Overlay {
        Overlay::Confirm(ConfirmState {
            current_job_id: "A".to_string(),
            current_lot: "ABC123DEF.01".to_string(),
            next_job_id: "B".to_string(),
            next_lot: "XYZ999ABC.02".to_string(),
        })
    }

    #[test]
    fn test_new_job_leaves_main_with_queue() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        let armed = press(&mut app, KeyCode::Esc);
        assert!(app.kiosk.store.ui().show_main_with_queue);

        push(
            &mut app,
            PushEvent::NewJob(job("B", "XYZ999ABC.02", 2, 3, PlaceFlag::Pick)),
        );

        let ui = app.kiosk.store.ui();
        assert_eq!(ui.current_view, View::QueueSelection);
        assert!(!ui.show_main_with_queue);
        assert!(!ui.auto_return_timer_active);
        assert!(!ui.activity_detection_active);
        assert!(!app.kiosk.timers.slot(TimerKind::AutoReturn).is_armed());

        // The timer armed before the new job no longer counts.
        app.kiosk.timers.last_activity =
            Instant::now() - app.kiosk.config.timing.auto_return();
        let effects = fire_scheduled(&mut app, &armed, TimerKind::AutoReturn);
        assert!(!effects.iter().any(|e| matches!(e, UiEffect::ScheduleTimer { .. })));
        assert_eq!(app.kiosk.store.ui().current_view, View::QueueSelection);
    }

    #[test]
    fn test_new_job_with_queued_id_is_ignored() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        let before = app.kiosk.notifications.len();

        push(
            &mut app,
            PushEvent::NewJob(job("A", "XYZ999ABC.02", 3, 3, PlaceFlag::Pick)),
        );

        assert_eq!(app.kiosk.store.queue().len(), 1);
        assert_eq!(app.kiosk.store.queue()[0].lot_no, "ABC123DEF.01");
        assert_eq!(app.kiosk.notifications.len(), before);
    }

    #[test]
    fn test_lms_answer_shows_location() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        let task = start_lms_lookup(&mut app);

        lms_result(
            &mut app,
            task,
            Ok(LmsLocation {
                lot_no: "QQQ111QQQ.09".to_string(),
                correct_shelf: "PC7".to_string(),
            }),
        );

        let Some(Overlay::LmsLocation(state)) = &app.overlay else {
            panic!("expected LMS location, got {:?}", app.overlay);
        };
        assert_eq!(state.correct_shelf, "PC7");
        assert_eq!(app.kiosk.store.queue().len(), 1);
        assert!(app.kiosk.active_job().is_none());
    }

    #[test]
    fn test_lms_failure_shows_alert() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        let task = start_lms_lookup(&mut app);

        lms_result(&mut app, task, Err("timeout".to_string()));

        let Some(Overlay::LmsAlert(state)) = &app.overlay else {
            panic!("expected LMS alert, got {:?}", app.overlay);
        };
        assert_eq!(state.title, "LMS lookup failed");
        assert!(state.message.contains("timeout"));
    }

    #[test]
    fn test_lms_answer_does_not_cover_confirmation() {
        let mut app = app_with_queue(vec![job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place)]);
        let task = start_lms_lookup(&mut app);
        app.overlay = Some(confirm_overlay());

        lms_result(
            &mut app,
            task,
            Ok(LmsLocation {
                lot_no: "QQQ111QQQ.09".to_string(),
                correct_shelf: "PC7".to_string(),
            }),
        );

        assert!(matches!(app.overlay, Some(Overlay::Confirm(_))));
        assert!(app.kiosk.notifications.iter().any(|n| n.message.contains("PC7")));
    }

    #[test]
    fn test_lms_response_push() {
        let mut app = app_with_queue(vec![]);

        push(
            &mut app,
            PushEvent::LmsResponse {
                lot_no: Some("QQQ111QQQ.09".to_string()),
                correct_shelf: Some("PC7".to_string()),
                message: None,
            },
        );
        assert!(matches!(
            &app.overlay,
            Some(Overlay::LmsLocation(state)) if state.correct_shelf == "PC7"
        ));

        push(
            &mut app,
            PushEvent::LmsResponse {
                lot_no: None,
                correct_shelf: None,
                message: Some("Lot unknown to LMS".to_string()),
            },
        );
        assert!(matches!(
            &app.overlay,
            Some(Overlay::LmsAlert(state)) if state.message == "Lot unknown to LMS"
        ));

        app.overlay = Some(confirm_overlay());
        push(
            &mut app,
            PushEvent::LmsResponse {
                lot_no: Some("QQQ111QQQ.09".to_string()),
                correct_shelf: Some("PC7".to_string()),
                message: Some("Lot belongs on PC7".to_string()),
            },
        );
        assert!(matches!(app.overlay, Some(Overlay::Confirm(_))));
        assert!(
            app.kiosk
                .notifications
                .iter()
                .any(|n| n.message == "Lot belongs on PC7")
        );
    }

    #[test]
    fn test_confirming_after_remote_completion_selects_scanned_job() {
        let mut app = app_with_queue(vec![
            job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place),
            job("B", "XYZ999ABC.02", 2, 3, PlaceFlag::Place),
        ]);
        type_and_submit(&mut app, "ABC123DEF.01");
        type_and_submit(&mut app, "XYZ999ABC.02");
        assert!(matches!(app.overlay, Some(Overlay::Confirm(_))));

        push(
            &mut app,
            PushEvent::JobCompleted {
                job_id: Some("A".to_string()),
                lot_no: Some("ABC123DEF.01".to_string()),
                shelf_state: Some(vec![]),
            },
        );
        assert!(app.kiosk.active_job().is_none());

        let effects = press(&mut app, KeyCode::Char('y'));

        assert!(app.overlay.is_none());
        assert_eq!(active_id(&app), Some("B"));
        assert!(!effects.iter().any(|e| matches!(e, UiEffect::CompleteJob { .. })));
    }

    #[test]
    fn test_confirming_for_job_gone_from_queue_warns() {
        let mut app = app_with_queue(vec![
            job("A", "ABC123DEF.01", 1, 1, PlaceFlag::Place),
            job("B", "XYZ999ABC.02", 2, 3, PlaceFlag::Place),
        ]);
        type_and_submit(&mut app, "ABC123DEF.01");
        type_and_submit(&mut app, "XYZ999ABC.02");
        push(
            &mut app,
            PushEvent::JobCanceled {
                lot_no: "ABC123DEF.01".to_string(),
            },
        );
        push(
            &mut app,
            PushEvent::JobCanceled {
                lot_no: "XYZ999ABC.02".to_string(),
            },
        );

        press(&mut app, KeyCode::Char('y'));

        assert!(app.overlay.is_none());
        assert!(app.kiosk.active_job().is_none());
        assert!(
            app.kiosk
                .notifications
                .iter()
                .any(|n| n.message.contains("no longer queued"))
        );
    }
}
