use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use super::render_utils::{InputHint, OverlayConfig, render_body, render_overlay};

/// Shown when a typed or scanned LOT number is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotWarningState {
    pub input: String,
}

impl LotWarningState {
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [InputHint::new("any key", "dismiss")];
        let layout = render_overlay(
            frame,
            area,
            &OverlayConfig {
                title: "Invalid LOT number",
                border_color: Color::Red,
                width: 56,
                height: 9,
                hints: &hints,
            },
        );

        let lines = vec![
            Line::from(Span::styled(
                self.input.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Expected 9 letters or digits, a dot, and 2 digits"),
            Line::from(Span::styled(
                "e.g. ABC123DEF.01",
                Style::default().fg(Color::DarkGray),
            )),
        ];
        render_body(frame, layout.body, lines);
    }
}
