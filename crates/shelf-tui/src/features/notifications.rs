//! Operator notifications.
//!
//! Transient notifications expire after the configured TTL (pruned on
//! Tick). Persistent ones stay until a flow clears them, e.g. the
//! "correct location" banner that lives until the completion resolves.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::common::truncate_with_ellipsis;

/// Oldest entries are dropped past this many.
const MAX_NOTIFICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotifyLevel {
    pub fn color(self) -> Color {
        match self {
            NotifyLevel::Info => Color::Cyan,
            NotifyLevel::Success => Color::Green,
            NotifyLevel::Warning => Color::Yellow,
            NotifyLevel::Error => Color::Red,
        }
    }

    fn icon(self) -> &'static str {
        match self {
            NotifyLevel::Info => "i",
            NotifyLevel::Success => "✓",
            NotifyLevel::Warning => "!",
            NotifyLevel::Error => "✗",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotifyLevel,
    pub message: String,
    pub persistent: bool,
    expires_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    items: VecDeque<Notification>,
    ttl: Duration,
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            ttl,
        }
    }

    pub fn push(&mut self, level: NotifyLevel, message: impl Into<String>) {
        self.insert(level, message.into(), false);
    }

    pub fn push_persistent(&mut self, level: NotifyLevel, message: impl Into<String>) {
        self.insert(level, message.into(), true);
    }

    fn insert(&mut self, level: NotifyLevel, message: String, persistent: bool) {
        let expires_at = (!persistent).then(|| Instant::now() + self.ttl);
        self.items.push_back(Notification {
            level,
            message,
            persistent,
            expires_at,
        });
        while self.items.len() > MAX_NOTIFICATIONS {
            self.items.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(NotifyLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NotifyLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(NotifyLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NotifyLevel::Error, message);
    }

    pub fn clear_persistent(&mut self) {
        self.items.retain(|n| !n.persistent);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drops expired transient notifications.
    pub fn prune(&mut self, now: Instant) {
        self.items
            .retain(|n| n.expires_at.is_none_or(|deadline| deadline > now));
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&Notification> {
        self.items.back()
    }
}

/// Renders the notification stack in the top-right corner.
pub fn render_notifications(notifications: &Notifications, frame: &mut Frame, area: Rect) {
    if notifications.is_empty() || area.width < 20 {
        return;
    }
    let width = (area.width / 2).clamp(20, 60);
    let inner_width = width.saturating_sub(4) as usize;
    let mut y = area.y + 1;

    for notification in notifications.iter().rev() {
        if y + 3 > area.y + area.height {
            break;
        }
        let color = notification.level.color();
        let popup = Rect::new(area.x + area.width - width - 1, y, width, 3);
        frame.render_widget(Clear, popup);
        let text = truncate_with_ellipsis(&notification.message, inner_width.saturating_sub(2));
        let line = Line::from(vec![
            Span::styled(
                format!("{} ", notification.level.icon()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw(text),
        ]);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color));
        frame.render_widget(Paragraph::new(line).block(block), popup);
        y += 3;
    }
}
