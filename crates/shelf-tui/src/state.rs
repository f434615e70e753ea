//! Application state composition.
//!
//! ```text
//! AppState
//! ├── kiosk: KioskState
//! │   ├── store: StateStore        (active job, queue, shelf state, UI flags)
//! │   ├── notifications            (operator messages)
//! │   ├── task_seq / tasks         (stale-result guards)
//! │   ├── timers                   (auto-return, scan confirm, LMS delay, poll)
//! │   ├── push: PushStatus         (live, reconnecting, polling)
//! │   └── inputs + highlight       (LOT input, scanner input, queue cursor)
//! └── overlay: Option<Overlay>     (modal popups)
//! ```
//!
//! The overlay lives beside `KioskState` so overlay key handlers can take
//! `&mut self` and `&KioskState` at the same time.

use shelf_core::config::Config;
use shelf_core::gateway::LedCommand;
use shelf_core::model::{Job, PlaceFlag};
use shelf_core::store::StateStore;

use crate::common::{TaskId, TaskKind, TaskSeq, Tasks, Timers};
use crate::features::notifications::Notifications;
use crate::overlays::Overlay;

pub struct AppState {
    pub kiosk: KioskState,
    pub overlay: Option<Overlay>,
}

impl AppState {
    pub fn new(config: Config, store: StateStore) -> Self {
        Self {
            kiosk: KioskState::new(config, store),
            overlay: None,
        }
    }
}

/// Push channel health as shown in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushStatus {
    #[default]
    Connecting,
    Live,
    Reconnecting,
    /// Reconnect budget exhausted (or push disabled): polling instead.
    Polling,
}

impl PushStatus {
    pub fn label(self) -> &'static str {
        match self {
            PushStatus::Connecting => "connecting",
            PushStatus::Live => "live",
            PushStatus::Reconnecting => "reconnecting",
            PushStatus::Polling => "polling",
        }
    }
}

/// A lot waiting for its delayed LMS lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLookup {
    pub lot_no: String,
    pub place_flag: PlaceFlag,
}

pub struct KioskState {
    pub should_quit: bool,
    pub config: Config,
    pub store: StateStore,
    pub notifications: Notifications,
    pub task_seq: TaskSeq,
    pub tasks: Tasks,
    pub timers: Timers,
    pub push: PushStatus,
    /// LOT number typed or scanned in QueueSelection.
    pub lot_input: String,
    /// Scanner input in ActiveJob.
    pub scan_input: String,
    /// Cursor into [`crate::view::ordered_queue`].
    pub highlight: usize,
    /// Job id whose completion waits on the scan-confirm delay.
    pub pending_completion: Option<String>,
    pub pending_lookup: Option<PendingLookup>,
    /// Last LED command sent; identical plans are not resent.
    pub last_led: Option<LedCommand>,
    /// Last known terminal size.
    pub size: (u16, u16),
}

impl KioskState {
    pub fn new(config: Config, store: StateStore) -> Self {
        let notifications = Notifications::new(config.timing.notification_ttl());
        Self {
            should_quit: false,
            config,
            store,
            notifications,
            task_seq: TaskSeq::default(),
            tasks: Tasks::default(),
            timers: Timers::default(),
            push: PushStatus::default(),
            lot_input: String::new(),
            scan_input: String::new(),
            highlight: 0,
            pending_completion: None,
            pending_lookup: None,
            last_led: None,
            size: (0, 0),
        }
    }

    /// Allocates a task id and records it as the active task of `kind`.
    pub fn start_task(&mut self, kind: TaskKind) -> TaskId {
        let id = self.task_seq.next_id();
        self.tasks.state_mut(kind).start(id);
        id
    }

    /// Shelf id for Gateway calls: configured, then fetched.
    pub fn shelf_id(&self) -> Option<String> {
        self.config
            .effective_shelf_id()
            .map(str::to_string)
            .or_else(|| self.store.identity().shelf_id.clone())
    }

    pub fn active_job(&self) -> Option<&Job> {
        self.store.active_job()
    }
}
