//! Overlay modules for the kiosk.
//!
//! Overlays are modal popups that take keyboard input before the views do.
//! Each overlay owns its state, key handler and render function.
//!
//! - `confirm.rs`: switch-job confirmation (complete current / continue)
//! - `lot_warning.rs`: malformed LOT number warning
//! - `lms.rs`: LMS location result and LMS alerts
//! - `render_utils.rs`: shared popup rendering

pub mod confirm;
pub mod lms;
pub mod lot_warning;
pub mod render_utils;

pub use confirm::ConfirmState;
use crossterm::event::KeyEvent;
pub use lms::{LmsAlertState, LmsLocationState};
pub use lot_warning::LotWarningState;
use ratatui::Frame;
use ratatui::layout::Rect;

use crate::state::KioskState;

// ============================================================================
// OverlayAction / OverlayTransition / OverlayUpdate
// ============================================================================

/// Orchestrator actions requested by an overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayAction {
    /// Complete `current_job_id`, then select `next_job_id`.
    CompleteAndSwitch {
        current_job_id: String,
        next_job_id: String,
    },
    /// Keep working the current job.
    ContinueCurrent { lot_no: String },
    /// The current job went away while the question was open; go straight
    /// to the scanned one.
    SelectJob { job_id: String, lot_no: String },
}

/// Transition returned by overlay key handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTransition {
    Stay,
    Close,
}

/// Update returned by overlay key handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayUpdate {
    pub transition: OverlayTransition,
    pub action: Option<OverlayAction>,
}

impl OverlayUpdate {
    pub fn stay() -> Self {
        Self {
            transition: OverlayTransition::Stay,
            action: None,
        }
    }

    pub fn close() -> Self {
        Self {
            transition: OverlayTransition::Close,
            action: None,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: OverlayAction) -> Self {
        self.action = Some(action);
        self
    }
}

// ============================================================================
// Overlay
// ============================================================================

#[derive(Debug, Clone)]
pub enum Overlay {
    Confirm(ConfirmState),
    LotWarning(LotWarningState),
    LmsLocation(LmsLocationState),
    LmsAlert(LmsAlertState),
}

impl Overlay {
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        match self {
            Overlay::Confirm(c) => c.render(frame, area),
            Overlay::LotWarning(w) => w.render(frame, area),
            Overlay::LmsLocation(l) => l.render(frame, area),
            Overlay::LmsAlert(a) => a.render(frame, area),
        }
    }

    pub fn handle_key(&mut self, kiosk: &KioskState, key: KeyEvent) -> OverlayUpdate {
        match self {
            Overlay::Confirm(c) => c.handle_key(kiosk, key),
            Overlay::LotWarning(_) | Overlay::LmsLocation(_) | Overlay::LmsAlert(_) => {
                dismiss_on_any_key(key)
            }
        }
    }

    pub fn is_confirm(&self) -> bool {
        matches!(self, Overlay::Confirm(_))
    }
}

/// Information popups close on any key.
fn dismiss_on_any_key(_key: KeyEvent) -> OverlayUpdate {
    OverlayUpdate::close()
}

// ============================================================================
// OverlayExt - Extension trait for Option<Overlay>
// ============================================================================

pub trait OverlayExt {
    /// Renders the overlay if one is active.
    fn render(&self, frame: &mut Frame, area: Rect);
}

impl OverlayExt for Option<Overlay> {
    fn render(&self, frame: &mut Frame, area: Rect) {
        if let Some(overlay) = self {
            overlay.render(frame, area);
        }
    }
}
