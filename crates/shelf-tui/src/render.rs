//! Pure view/render functions for the kiosk.
//!
//! Functions here:
//! - Take `&AppState` by immutable reference
//! - Draw to a ratatui Frame
//! - Never mutate state or return effects
//!
//! The view to draw is the one recorded by `view::sync_view`; rendering
//! never re-decides it.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use shelf_core::model::{Job, Location, PlaceFlag};
use shelf_core::store::View;
use shelf_core::utils::wrong_location_from_message;

use crate::common::{center, truncate_with_ellipsis};
use crate::features::notifications::render_notifications;
use crate::overlays::OverlayExt;
use crate::state::{AppState, KioskState, PushStatus};
use crate::view::ordered_queue;

const HEADER_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 1;

/// Width of the side panel in QueueSelection and ActiveJob.
const SIDE_PANEL_PERCENT: u16 = 40;

const PLACE_COLOR: Color = Color::Blue;
const PICK_COLOR: Color = Color::Rgb(255, 165, 0);

/// Renders the entire kiosk to the frame.
pub fn render(app: &AppState, frame: &mut Frame) {
    let area = frame.area();
    let kiosk = &app.kiosk;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(area);

    render_header(kiosk, frame, chunks[0]);

    match kiosk.store.ui().current_view {
        View::Main => render_grid(kiosk, frame, chunks[1]),
        View::QueueSelection => {
            let (grid, side) = split_side_panel(chunks[1]);
            render_grid(kiosk, frame, grid);
            render_queue_panel(kiosk, frame, side);
        }
        View::ActiveJob => {
            let (grid, side) = split_side_panel(chunks[1]);
            render_grid(kiosk, frame, grid);
            render_active_job_panel(kiosk, frame, side);
        }
    }

    render_footer(kiosk, frame, chunks[2]);
    render_notifications(&kiosk.notifications, frame, chunks[1]);
    app.overlay.render(frame, area);
}

fn split_side_panel(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(100 - SIDE_PANEL_PERCENT),
            Constraint::Percentage(SIDE_PANEL_PERCENT),
        ])
        .split(area);
    (chunks[0], chunks[1])
}

fn flag_color(flag: PlaceFlag) -> Color {
    match flag {
        PlaceFlag::Place => PLACE_COLOR,
        PlaceFlag::Pick => PICK_COLOR,
    }
}

// ============================================================================
// Header / footer
// ============================================================================

fn render_header(kiosk: &KioskState, frame: &mut Frame, area: Rect) {
    let identity = kiosk.store.identity();
    let shelf = kiosk
        .shelf_id()
        .unwrap_or_else(|| "unassigned".to_string());
    let name = identity
        .shelf_name
        .as_deref()
        .map(|name| format!(" ({name})"))
        .unwrap_or_default();

    let push_color = match kiosk.push {
        PushStatus::Live => Color::Green,
        PushStatus::Connecting | PushStatus::Reconnecting => Color::Yellow,
        PushStatus::Polling => Color::Red,
    };
    let queued = kiosk.store.queue().len();
    let badge_style = if queued > 0 {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let line = Line::from(vec![
        Span::styled(
            format!("Shelf {shelf}{name}"),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format!("● {}", kiosk.push.label()), Style::default().fg(push_color)),
        Span::raw("  "),
        Span::styled(format!(" Queue: {queued} "), badge_style),
        Span::raw("  "),
        Span::styled(
            Local::now().format("%H:%M:%S").to_string(),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Smart Shelf ");
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_footer(kiosk: &KioskState, frame: &mut Frame, area: Rect) {
    let ui = kiosk.store.ui();
    let hints = match ui.current_view {
        View::Main if ui.show_main_with_queue => "Tab queue • F5 refresh • Ctrl+C quit",
        View::Main => "Waiting for jobs • F5 refresh • Ctrl+C quit",
        View::QueueSelection => {
            "Scan/type LOT + Enter • ↑↓ select • Enter pick highlighted • Esc shelf view • F5 refresh"
        }
        View::ActiveJob => "Scan cell barcode + Enter • Esc back to queue • F5 refresh",
    };
    let para = Paragraph::new(Line::from(Span::styled(
        hints,
        Style::default().fg(Color::DarkGray),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(para, area);
}

// ============================================================================
// Shelf grid
// ============================================================================

/// Cell highlight, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellMark {
    Wrong,
    Target(PlaceFlag),
    Queued,
    None,
}

fn cell_mark(kiosk: &KioskState, view: View, location: Location) -> CellMark {
    if let Some(active) = kiosk.active_job()
        && view == View::ActiveJob
    {
        let wrong = active
            .error
            .then(|| active.error_message.as_deref().and_then(wrong_location_from_message))
            .flatten();
        if wrong == Some(location) {
            return CellMark::Wrong;
        }
        if active.location() == Some(location) {
            return CellMark::Target(active.place_flg);
        }
        return CellMark::None;
    }
    if view != View::ActiveJob
        && kiosk
            .store
            .queue()
            .iter()
            .any(|job| job.location() == Some(location))
    {
        return CellMark::Queued;
    }
    CellMark::None
}

/// Draws the shelf, highest level on top.
fn render_grid(kiosk: &KioskState, frame: &mut Frame, area: Rect) {
    let layout = kiosk.store.layout();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Shelf ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let levels: Vec<(u32, u32)> = layout
        .levels
        .iter()
        .rev()
        .map(|(level, blocks)| (*level, *blocks))
        .collect();
    if levels.is_empty() || inner.height == 0 {
        return;
    }

    let max_blocks = layout.max_blocks().max(1);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, levels.len() as u32); levels.len()])
        .split(inner);
    let view = kiosk.store.ui().current_view;

    for ((level, blocks), row) in levels.into_iter().zip(rows.iter()) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, max_blocks); max_blocks as usize])
            .split(*row);
        for (block, column) in (1..=blocks).zip(columns.iter()) {
            let Some(location) = Location::new(level, block) else {
                continue;
            };
            render_cell(kiosk, frame, *column, location, cell_mark(kiosk, view, location));
        }
    }
}

fn render_cell(kiosk: &KioskState, frame: &mut Frame, area: Rect, location: Location, mark: CellMark) {
    let capacity = kiosk.store.layout().capacity(location);
    let trays = kiosk.store.cell(location).map_or(0, |cell| cell.tray_total());

    let (border, bold) = match mark {
        CellMark::Wrong => (Color::Red, true),
        CellMark::Target(flag) => (flag_color(flag), true),
        CellMark::Queued => (Color::Cyan, false),
        CellMark::None => (Color::DarkGray, false),
    };
    let fill_color = if capacity > 0 && trays >= capacity {
        Color::Red
    } else if trays > 0 {
        Color::White
    } else {
        Color::DarkGray
    };

    let mut border_style = Style::default().fg(border);
    if bold {
        border_style = border_style.add_modifier(Modifier::BOLD);
    }
    let cell_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = cell_block.inner(area);
    frame.render_widget(cell_block, area);

    let width = inner.width as usize;
    let lines = vec![
        Line::from(Span::styled(
            center(&location.to_string(), width),
            Style::default().fg(border),
        )),
        Line::from(Span::styled(
            center(&format!("{trays}/{capacity}"), width),
            Style::default().fg(fill_color),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

// ============================================================================
// Side panels
// ============================================================================

fn job_line(job: &Job, highlighted: bool, width: usize) -> ListItem<'static> {
    let location = job
        .location()
        .map_or_else(|| "?".to_string(), |loc| loc.to_string());
    let text = truncate_with_ellipsis(&format!("{}  {}", job.lot_no, location), width);
    let marker = if highlighted { "▶ " } else { "  " };
    let mut style = Style::default().fg(flag_color(job.place_flg));
    if highlighted {
        style = style.add_modifier(Modifier::REVERSED);
    }
    ListItem::new(Line::from(vec![
        Span::raw(marker),
        Span::styled(text, style),
    ]))
}

fn render_queue_panel(kiosk: &KioskState, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(50),
            Constraint::Length(3),
        ])
        .split(area);

    let ordered = ordered_queue(kiosk.store.queue());
    let width = area.width.saturating_sub(6) as usize;
    let mut place = Vec::new();
    let mut pick = Vec::new();
    for (index, job) in ordered.iter().enumerate() {
        let item = job_line(job, index == kiosk.highlight, width);
        match job.place_flg {
            PlaceFlag::Place => place.push(item),
            PlaceFlag::Pick => pick.push(item),
        }
    }

    let place_title = format!(" Place ({}) ", place.len());
    let pick_title = format!(" Pick ({}) ", pick.len());
    frame.render_widget(
        List::new(place).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PLACE_COLOR))
                .title(place_title),
        ),
        chunks[0],
    );
    frame.render_widget(
        List::new(pick).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PICK_COLOR))
                .title(pick_title),
        ),
        chunks[1],
    );
    render_input_line(frame, chunks[2], " LOT ", &kiosk.lot_input);
}

fn render_active_job_panel(kiosk: &KioskState, frame: &mut Frame, area: Rect) {
    let Some(job) = kiosk.active_job() else {
        return;
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    let action_color = flag_color(job.place_flg);
    let location = job
        .location()
        .map_or_else(|| "?".to_string(), |loc| loc.to_string());
    let mut info = vec![
        Line::from(vec![
            Span::styled(
                job.place_flg.label().to_uppercase(),
                Style::default()
                    .fg(action_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  {}", job.lot_no)),
        ]),
        Line::from(vec![
            Span::raw("Cell: "),
            Span::styled(location, Style::default().add_modifier(Modifier::BOLD)),
        ]),
    ];
    if let Some(trays) = job.tray_count {
        info.push(Line::from(format!("Trays: {trays}")));
    }
    if job.error
        && let Some(message) = &job.error_message
    {
        info.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }
    frame.render_widget(
        Paragraph::new(info).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(action_color))
                .title(" Active job "),
        ),
        chunks[0],
    );

    let lots: Vec<ListItem> = job
        .location()
        .and_then(|loc| kiosk.store.cell(loc))
        .map(|cell| {
            cell.lots
                .iter()
                .map(|lot| {
                    let style = if job.has_lot(&lot.lot_no) {
                        Style::default().fg(action_color).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    ListItem::new(Line::from(Span::styled(
                        format!("{}  ×{}", lot.lot_no, lot.tray_count),
                        style,
                    )))
                })
                .collect()
        })
        .unwrap_or_default();
    let empty = lots.is_empty();
    let cell_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Cell contents ");
    if empty {
        frame.render_widget(
            Paragraph::new(Span::styled("empty", Style::default().fg(Color::DarkGray)))
                .block(cell_block),
            chunks[1],
        );
    } else {
        frame.render_widget(List::new(lots).block(cell_block), chunks[1]);
    }

    render_input_line(frame, chunks[2], " Scan ", &kiosk.scan_input);
}

fn render_input_line(frame: &mut Frame, area: Rect, title: &str, text: &str) {
    let width = area.width.saturating_sub(4) as usize;
    let line = Line::from(vec![
        Span::raw(truncate_with_ellipsis(text, width.saturating_sub(1))),
        Span::styled("█", Style::default().fg(Color::Cyan)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title.to_string());
    frame.render_widget(Paragraph::new(line).block(block), area);
}
