//! View selection and the LED plan.
//!
//! Both are pure functions of the active job, the queue and the
//! `show_main_with_queue` flag. [`sync_view`] is called at the end of every
//! reducer path: it records the selected view in the store and emits an LED
//! command when the plan changed.

use shelf_core::gateway::{LedCommand, LedSpot, Rgb};
use shelf_core::model::{Job, PlaceFlag};
use shelf_core::store::View;
use shelf_core::utils::wrong_location_from_message;
use tracing::debug;

use crate::effects::UiEffect;
use crate::state::KioskState;

/// Chooses the screen.
///
/// | main-with-queue | active job | queue non-empty | view           |
/// |-----------------|------------|-----------------|----------------|
/// | yes             | any        | any             | Main           |
/// | no              | yes        | any             | ActiveJob      |
/// | no              | no         | yes             | QueueSelection |
/// | no              | no         | no              | Main (idle)    |
pub fn select_view(active: Option<&Job>, queue: &[Job], show_main_with_queue: bool) -> View {
    if show_main_with_queue {
        View::Main
    } else if active.is_some() {
        View::ActiveJob
    } else if !queue.is_empty() {
        View::QueueSelection
    } else {
        View::Main
    }
}

/// LED state for a view.
pub fn led_plan(active: Option<&Job>, queue: &[Job], show_main_with_queue: bool) -> LedCommand {
    match select_view(active, queue, show_main_with_queue) {
        View::ActiveJob => active.map_or(LedCommand::Clear, active_job_leds),
        View::QueueSelection => queue_leds(queue, Rgb::QUEUE),
        View::Main if show_main_with_queue => queue_leds(queue, Rgb::QUEUE_DIM),
        View::Main => LedCommand::Clear,
    }
}

fn active_job_leds(job: &Job) -> LedCommand {
    let Some(target) = job.location() else {
        return LedCommand::Clear;
    };

    let wrong = job
        .error
        .then(|| job.error_message.as_deref().and_then(wrong_location_from_message))
        .flatten()
        .filter(|wrong| *wrong != target);
    if let Some(wrong) = wrong {
        return LedCommand::Batch {
            spots: vec![
                LedSpot {
                    location: wrong,
                    color: Rgb::WRONG,
                },
                LedSpot {
                    location: target,
                    color: Rgb::CORRECT,
                },
            ],
            clear_first: true,
        };
    }

    let color = match job.place_flg {
        PlaceFlag::Place => Rgb::PLACE,
        PlaceFlag::Pick => Rgb::PICK,
    };
    LedCommand::Single(LedSpot {
        location: target,
        color,
    })
}

fn queue_leds(queue: &[Job], color: Rgb) -> LedCommand {
    let mut spots: Vec<LedSpot> = Vec::new();
    for location in queue.iter().filter_map(Job::location) {
        if !spots.iter().any(|spot| spot.location == location) {
            spots.push(LedSpot { location, color });
        }
    }
    if spots.is_empty() {
        LedCommand::Clear
    } else {
        LedCommand::Batch {
            spots,
            clear_first: true,
        }
    }
}

/// Queue in display order: place jobs first, then pick jobs, each in queue
/// order. The QueueSelection highlight indexes into this list.
pub fn ordered_queue(queue: &[Job]) -> Vec<&Job> {
    let place = queue.iter().filter(|job| job.place_flg == PlaceFlag::Place);
    let pick = queue.iter().filter(|job| job.place_flg == PlaceFlag::Pick);
    place.chain(pick).collect()
}

/// Re-evaluates the view after a state change.
///
/// Records the view in the store, keeps the queue highlight in range, and
/// returns an `ApplyLed` effect when the LED plan differs from the last one
/// sent.
pub fn sync_view(kiosk: &mut KioskState) -> Vec<UiEffect> {
    let show_main = kiosk.store.ui().show_main_with_queue;
    let view = select_view(kiosk.store.active_job(), kiosk.store.queue(), show_main);
    if kiosk.store.ui().current_view != view {
        debug!(?view, "view changed");
        kiosk.store.ui_mut().current_view = view;
    }

    let queue_len = kiosk.store.queue().len();
    if kiosk.highlight >= queue_len {
        kiosk.highlight = queue_len.saturating_sub(1);
    }

    let plan = led_plan(kiosk.store.active_job(), kiosk.store.queue(), show_main);
    if kiosk.last_led.as_ref() == Some(&plan) {
        return Vec::new();
    }
    kiosk.last_led = Some(plan.clone());
    vec![UiEffect::ApplyLed(plan)]
}

#[cfg(test)]
mod tests {
    use shelf_core::model::Location;
    use shelf_core::utils::wrong_location_message;

    use super::*;

    fn job(id: &str, level: u32, block: u32, place_flg: PlaceFlag) -> Job {
        Job {
            job_id: id.to_string(),
            lot_no: format!("ABC123DE{id}.01"),
            level,
            block,
            place_flg,
            tray_count: None,
            error: false,
            error_type: None,
            error_message: None,
        }
    }

    fn at(level: u32, block: u32) -> Location {
        Location::new(level, block).unwrap()
    }

    #[test]
    fn test_select_view_table() {
        let active = job("A", 1, 1, PlaceFlag::Place);
        let queue = vec![job("B", 2, 2, PlaceFlag::Pick)];

        assert_eq!(select_view(Some(&active), &queue, true), View::Main);
        assert_eq!(select_view(None, &[], true), View::Main);
        assert_eq!(select_view(Some(&active), &queue, false), View::ActiveJob);
        assert_eq!(select_view(Some(&active), &[], false), View::ActiveJob);
        assert_eq!(select_view(None, &queue, false), View::QueueSelection);
        assert_eq!(select_view(None, &[], false), View::Main);
    }

    #[test]
    fn test_led_plan_is_deterministic() {
        let queue = vec![
            job("A", 1, 1, PlaceFlag::Place),
            job("B", 2, 3, PlaceFlag::Pick),
        ];
        assert_eq!(led_plan(None, &queue, false), led_plan(None, &queue, false));
        assert_eq!(
            led_plan(None, &queue, false),
            LedCommand::Batch {
                spots: vec![
                    LedSpot {
                        location: at(1, 1),
                        color: Rgb::QUEUE
                    },
                    LedSpot {
                        location: at(2, 3),
                        color: Rgb::QUEUE
                    },
                ],
                clear_first: true,
            }
        );
    }

    #[test]
    fn test_led_plan_main_with_queue_uses_dim_color() {
        let queue = vec![job("A", 1, 1, PlaceFlag::Place), job("B", 1, 1, PlaceFlag::Pick)];
        let LedCommand::Batch { spots, .. } = led_plan(None, &queue, true) else {
            panic!("expected batch");
        };
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].color, Rgb::QUEUE_DIM);
        assert_eq!(led_plan(None, &[], false), LedCommand::Clear);
    }

    #[test]
    fn test_led_plan_active_job_colors() {
        let place = job("A", 2, 3, PlaceFlag::Place);
        let pick = job("B", 1, 4, PlaceFlag::Pick);

        assert_eq!(
            led_plan(Some(&place), &[], false),
            LedCommand::Single(LedSpot {
                location: at(2, 3),
                color: Rgb::PLACE
            })
        );
        assert_eq!(
            led_plan(Some(&pick), &[], false),
            LedCommand::Single(LedSpot {
                location: at(1, 4),
                color: Rgb::PICK
            })
        );
    }

    #[test]
    fn test_led_plan_wrong_location_dual_color() {
        let mut active = job("A", 1, 1, PlaceFlag::Place);
        active.mark_wrong_location(wrong_location_message(at(2, 3), at(1, 1)));

        assert_eq!(
            led_plan(Some(&active), &[], false),
            LedCommand::Batch {
                spots: vec![
                    LedSpot {
                        location: at(2, 3),
                        color: Rgb::WRONG
                    },
                    LedSpot {
                        location: at(1, 1),
                        color: Rgb::CORRECT
                    },
                ],
                clear_first: true,
            }
        );
    }

    #[test]
    fn test_ordered_queue_places_first() {
        let queue = vec![
            job("A", 1, 1, PlaceFlag::Pick),
            job("B", 1, 2, PlaceFlag::Place),
            job("C", 1, 3, PlaceFlag::Pick),
        ];
        let ids: Vec<&str> = ordered_queue(&queue)
            .iter()
            .map(|job| job.job_id.as_str())
            .collect();
        assert_eq!(ids, ["B", "A", "C"]);
    }
}
