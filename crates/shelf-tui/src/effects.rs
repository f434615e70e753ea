//! UI effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! They represent I/O, task spawning and timer scheduling only; the reducer
//! never performs I/O directly.

use std::time::Duration;

use shelf_core::gateway::LedCommand;
use shelf_core::model::PlaceFlag;

use crate::common::{TaskId, TimerKind};

/// Effects returned by the reducer for the runtime to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    /// Quit the application.
    Quit,

    /// Run the startup sequence against the Gateway.
    Bootstrap {
        task: TaskId,
        /// Configured shelf id; fetched from the Gateway when `None`.
        shelf_id: Option<String>,
        load_pending_jobs: bool,
    },

    /// Fetch the authoritative queue.
    SyncQueue { task: TaskId },

    /// Fetch the authoritative shelf-state snapshot.
    RefreshShelfState { task: TaskId },

    /// Send the completion command for a job.
    CompleteJob {
        task: TaskId,
        job_id: String,
        lot_no: String,
        /// Job to select once the completion succeeds.
        then_select: Option<String>,
    },

    /// Ask the LMS where a lot belongs.
    LookupLms {
        task: TaskId,
        lot_no: String,
        place_flag: PlaceFlag,
        shelf_id: Option<String>,
    },

    /// Push a new LED state. Fire-and-forget.
    ApplyLed(LedCommand),

    /// Connect the push channel.
    ConnectPush,

    /// Send `TimerFired { kind, generation }` after `after`.
    ScheduleTimer {
        kind: TimerKind,
        generation: u64,
        after: Duration,
    },
}
