use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use super::render_utils::{InputHint, OverlayConfig, render_body, render_overlay};

const DISMISS: [InputHint<'static>; 1] = [InputHint {
    key: "any key",
    action: "dismiss",
}];

/// Where the LMS says a lot belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmsLocationState {
    pub lot_no: String,
    pub correct_shelf: String,
}

impl LmsLocationState {
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let layout = render_overlay(
            frame,
            area,
            &OverlayConfig {
                title: "LMS location",
                border_color: Color::Cyan,
                width: 50,
                height: 9,
                hints: &DISMISS,
            },
        );

        let lines = vec![
            Line::from(vec![
                Span::raw("LOT "),
                Span::styled(
                    self.lot_no.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(" belongs on"),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                self.correct_shelf.clone(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
        ];
        render_body(frame, layout.body, lines);
    }
}

/// Titled alert: "not in queue" while the LMS lookup is pending, or a
/// lookup failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmsAlertState {
    pub title: String,
    pub message: String,
}

impl LmsAlertState {
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let layout = render_overlay(
            frame,
            area,
            &OverlayConfig {
                title: &self.title,
                border_color: Color::Yellow,
                width: 56,
                height: 8,
                hints: &DISMISS,
            },
        );
        render_body(frame, layout.body, vec![Line::from(self.message.clone())]);
    }
}
