use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use super::render_utils::{InputHint, OverlayConfig, render_body, render_overlay};
use super::{OverlayAction, OverlayUpdate};
use crate::state::KioskState;

/// Asks whether to finish the current job before switching to another lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmState {
    pub current_job_id: String,
    pub current_lot: String,
    pub next_job_id: String,
    pub next_lot: String,
}

impl ConfirmState {
    pub fn handle_key(&mut self, kiosk: &KioskState, key: KeyEvent) -> OverlayUpdate {
        let still_current = kiosk
            .active_job()
            .is_some_and(|job| job.job_id == self.current_job_id);

        match key.code {
            KeyCode::Char('y' | 'Y') | KeyCode::Enter => {
                if !still_current {
                    return OverlayUpdate::close().with_action(OverlayAction::SelectJob {
                        job_id: self.next_job_id.clone(),
                        lot_no: self.next_lot.clone(),
                    });
                }
                OverlayUpdate::close().with_action(OverlayAction::CompleteAndSwitch {
                    current_job_id: self.current_job_id.clone(),
                    next_job_id: self.next_job_id.clone(),
                })
            }
            KeyCode::Char('n' | 'N') | KeyCode::Esc => {
                OverlayUpdate::close().with_action(OverlayAction::ContinueCurrent {
                    lot_no: self.current_lot.clone(),
                })
            }
            _ => OverlayUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [
            InputHint::new("y", "complete & switch"),
            InputHint::new("n", "continue current"),
        ];
        let layout = render_overlay(
            frame,
            area,
            &OverlayConfig {
                title: "Switch job?",
                border_color: Color::Yellow,
                width: 60,
                height: 9,
                hints: &hints,
            },
        );

        let bold = Style::default().add_modifier(Modifier::BOLD);
        let lines = vec![
            Line::from(vec![
                Span::raw("Current: "),
                Span::styled(self.current_lot.clone(), bold),
            ]),
            Line::from(vec![
                Span::raw("Scanned: "),
                Span::styled(self.next_lot.clone(), bold.fg(Color::Cyan)),
            ]),
            Line::from(""),
            Line::from("Complete the current job first?"),
        ];
        render_body(frame, layout.body, lines);
    }
}
