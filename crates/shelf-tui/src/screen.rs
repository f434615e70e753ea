//! Ownership of the kiosk screen.
//!
//! The kiosk switches the terminal into a handful of modes on start and
//! must switch all of them back on quit or panic, newest first, or the
//! console is left unusable for the next login.

use std::io::{self, Stdout};
use std::panic;
use std::sync::Once;

use anyhow::{Context, Result};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

pub type KioskTerminal = Terminal<CrosstermBackend<Stdout>>;

/// A terminal mode the kiosk turns on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Raw,
    AlternateScreen,
    /// Keyboard-wedge scanners paste whole barcodes.
    ScannerPaste,
    /// Any touch or click counts as operator activity.
    TouchActivity,
}

impl Mode {
    fn set(self, on: bool) -> io::Result<()> {
        let mut out = io::stdout();
        match (self, on) {
            (Mode::Raw, true) => enable_raw_mode(),
            (Mode::Raw, false) => disable_raw_mode(),
            (Mode::AlternateScreen, true) => execute!(out, EnterAlternateScreen),
            (Mode::AlternateScreen, false) => execute!(out, LeaveAlternateScreen),
            (Mode::ScannerPaste, true) => execute!(out, EnableBracketedPaste),
            (Mode::ScannerPaste, false) => execute!(out, DisableBracketedPaste),
            (Mode::TouchActivity, true) => execute!(out, EnableMouseCapture),
            (Mode::TouchActivity, false) => execute!(out, DisableMouseCapture),
        }
    }
}

const SCREEN_MODES: [Mode; 2] = [Mode::Raw, Mode::AlternateScreen];
const INPUT_MODES: [Mode; 2] = [Mode::ScannerPaste, Mode::TouchActivity];

/// Every mode in the order it is switched off.
fn release_order() -> impl Iterator<Item = Mode> {
    SCREEN_MODES.into_iter().chain(INPUT_MODES).rev()
}

fn switch_on(modes: &[Mode]) -> Result<()> {
    for mode in modes {
        mode.set(true)
            .with_context(|| format!("Failed to switch on {mode:?} mode"))?;
    }
    Ok(())
}

/// Switches modes off, carrying on past failures. Returns the first one.
fn switch_off(modes: impl Iterator<Item = Mode>) -> Result<()> {
    let mut first_failure = None;
    for mode in modes {
        if let Err(e) = mode.set(false) {
            first_failure.get_or_insert_with(|| {
                anyhow::Error::new(e).context(format!("Failed to switch off {mode:?} mode"))
            });
        }
    }
    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Takes over the screen: panic guard first, then raw mode and the
/// alternate screen.
pub fn open() -> Result<KioskTerminal> {
    guard_against_panics();
    if let Err(e) = switch_on(&SCREEN_MODES) {
        let _ = close();
        return Err(e);
    }
    Terminal::new(CrosstermBackend::new(io::stdout())).context("Failed to create terminal")
}

/// Starts listening for scanner pastes and touches.
pub fn capture_input() -> Result<()> {
    switch_on(&INPUT_MODES)
}

pub fn release_input() -> Result<()> {
    switch_off(INPUT_MODES.into_iter().rev())
}

/// Hands the console back. Safe to call more than once.
pub fn close() -> Result<()> {
    switch_off(release_order())
}

fn guard_against_panics() {
    static GUARD: Once = Once::new();
    GUARD.call_once(|| {
        let report = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let _ = close();
            report(info);
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_released_before_screen() {
        let order: Vec<Mode> = release_order().collect();
        assert_eq!(
            order,
            [
                Mode::TouchActivity,
                Mode::ScannerPaste,
                Mode::AlternateScreen,
                Mode::Raw
            ]
        );
    }
}
