//! Kiosk runtime - owns terminal, runs event loop, executes effects.
//!
//! This is the "Elm runtime" boundary: all side effects happen here.
//! The reducer stays pure and produces effects; this module executes them.
//!
//! ## Inbox Pattern
//!
//! - Handlers, timers and the push forwarder send `UiEvent`s to `inbox_tx`
//! - The runtime drains `inbox_rx` each loop iteration
//!
//! LED commands bypass the inbox: they go to a single worker task that
//! applies them in order, so a slow Gateway never reorders LED states.
//!
//! Structure:
//! - `mod.rs`: Core runtime (KioskRuntime, event loop, effect dispatch)
//! - `inbox.rs`: Inbox channel types
//! - `handlers/`: Effect handler implementations (Gateway calls, LEDs, push)

mod handlers;
mod inbox;

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use inbox::{UiEventReceiver, UiEventSender};
use shelf_core::config::Config;
use shelf_core::gateway::{GatewayClient, LedCommand};
use shelf_core::store::StateStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::screen::{self, KioskTerminal};
use crate::state::AppState;
use crate::{render, update};

/// Interval between Tick events (clock, notification expiry).
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound on how long one terminal poll blocks.
pub const POLL_DURATION: Duration = Duration::from_millis(50);

/// How long quitting waits for the Gateway to switch the LEDs off.
pub const LED_CLEAR_TIMEOUT: Duration = Duration::from_secs(2);

/// Full-screen kiosk runtime.
///
/// Owns the terminal and state. Runs the event loop and executes effects.
/// Terminal state is restored on drop or panic.
pub struct KioskRuntime {
    terminal: KioskTerminal,
    pub state: AppState,
    gateway: GatewayClient,
    inbox_tx: UiEventSender,
    inbox_rx: UiEventReceiver,
    led_tx: mpsc::UnboundedSender<LedCommand>,
    /// Stops the push channel on shutdown.
    cancel: CancellationToken,
    last_tick: Instant,
}

impl KioskRuntime {
    /// Creates the runtime. Must be called from within a tokio runtime.
    pub fn new(config: Config, store: StateStore, gateway: GatewayClient) -> Result<Self> {
        let terminal = screen::open().context("Failed to take over the screen")?;

        let state = AppState::new(config, store);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let (led_tx, led_rx) = mpsc::unbounded_channel();
        tokio::spawn(handlers::led_worker(gateway.clone(), led_rx));

        Ok(Self {
            terminal,
            state,
            gateway,
            inbox_tx,
            inbox_rx,
            led_tx,
            cancel: CancellationToken::new(),
            last_tick: Instant::now(),
        })
    }

    /// Runs the main event loop.
    pub fn run(&mut self) -> Result<()> {
        screen::capture_input()?;

        self.dispatch_event(UiEvent::Init);
        let result = self.event_loop();

        let _ = screen::release_input();
        self.shutdown();
        result
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut dirty = true;

        while !self.state.kiosk.should_quit {
            let mut events = self.collect_events()?;

            let size = self.terminal.size()?;
            events.insert(
                0,
                UiEvent::Frame {
                    width: size.width,
                    height: size.height,
                },
            );
            if events.len() > 1 {
                dirty = true;
            }

            for event in events {
                let effects = update::update(&mut self.state, event);
                self.execute_effects(effects);
            }

            if dirty {
                self.terminal.draw(|frame| {
                    render::render(&self.state, frame);
                })?;
                dirty = false;
            }
        }

        Ok(())
    }

    /// Stops background tasks.
    fn shutdown(&mut self) {
        self.cancel.cancel();
    }

    /// Switches every LED off. Awaited after `run` returns, since the
    /// event loop holds the thread the LED worker would need.
    pub async fn clear_leds(&self) -> bool {
        handlers::clear_on_exit(&self.gateway, LED_CLEAR_TIMEOUT).await
    }

    // ========================================================================
    // Event Collection
    // ========================================================================

    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        while let Ok(ev) = self.inbox_rx.try_recv() {
            events.push(ev);
        }

        let time_until_tick = TICK_INTERVAL.saturating_sub(self.last_tick.elapsed());
        let poll_duration = if events.is_empty() {
            time_until_tick.min(POLL_DURATION)
        } else {
            Duration::ZERO
        };

        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            // Scanners type fast; take everything already buffered.
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if self.last_tick.elapsed() >= TICK_INTERVAL {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    // ========================================================================
    // Effect Dispatch
    // ========================================================================

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn dispatch_event(&mut self, event: UiEvent) {
        let effects = update::update(&mut self.state, event);
        if !effects.is_empty() {
            self.execute_effects(effects);
        }
    }

    /// Spawns an async handler and sends its result to the inbox.
    fn spawn_effect<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = UiEvent> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(f().await);
        });
    }

    fn execute_effect(&mut self, effect: UiEffect) {
        match effect {
            UiEffect::Quit => {
                self.state.kiosk.should_quit = true;
            }
            UiEffect::Bootstrap {
                task,
                shelf_id,
                load_pending_jobs,
            } => {
                let client = self.gateway.clone();
                self.spawn_effect(move || {
                    handlers::bootstrap(client, task, shelf_id, load_pending_jobs)
                });
            }
            UiEffect::SyncQueue { task } => {
                let client = self.gateway.clone();
                self.spawn_effect(move || handlers::sync_queue(client, task));
            }
            UiEffect::RefreshShelfState { task } => {
                let client = self.gateway.clone();
                self.spawn_effect(move || handlers::refresh_shelf_state(client, task));
            }
            UiEffect::CompleteJob {
                task,
                job_id,
                lot_no,
                then_select,
            } => {
                let client = self.gateway.clone();
                self.spawn_effect(move || {
                    handlers::complete_job(client, task, job_id, lot_no, then_select)
                });
            }
            UiEffect::LookupLms {
                task,
                lot_no,
                place_flag,
                shelf_id,
            } => {
                let client = self.gateway.clone();
                self.spawn_effect(move || {
                    handlers::lookup_lms(client, task, lot_no, place_flag, shelf_id)
                });
            }
            UiEffect::ApplyLed(command) => {
                debug!(?command, "LED");
                let _ = self.led_tx.send(command);
            }
            UiEffect::ConnectPush => match self.gateway.push_url() {
                Ok(url) => {
                    let config = self.state.kiosk.config.push.clone();
                    let inbox = self.inbox_tx.clone();
                    let cancel = self.cancel.child_token();
                    tokio::spawn(handlers::push_channel(url, config, inbox, cancel));
                }
                Err(e) => {
                    warn!("push channel unavailable: {e:#}");
                    self.dispatch_event(handlers::push_unavailable());
                }
            },
            UiEffect::ScheduleTimer {
                kind,
                generation,
                after,
            } => {
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(UiEvent::TimerFired { kind, generation });
                });
            }
        }
    }
}

impl Drop for KioskRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
        let _ = screen::close();
    }
}
