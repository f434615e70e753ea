//! UI event types.
//!
//! Everything the reducer reacts to arrives as a [`UiEvent`]: terminal
//! input, ticks, task results from the inbox, push-channel messages and
//! timer fires.

use shelf_core::gateway::LmsLocation;
use shelf_core::model::{Cell, Job, ShelfLayout};
use shelf_core::push::PushMessage;
use shelf_core::store::ShelfIdentity;

use crate::common::{TaskId, TaskKind, TimerKind};

#[derive(Debug)]
pub enum UiEvent {
    /// Emitted once after the runtime is set up.
    Init,
    Tick,
    Frame {
        width: u16,
        height: u16,
    },
    Terminal(crossterm::event::Event),
    TaskCompleted {
        id: TaskId,
        result: TaskResult,
    },
    Push(PushMessage),
    TimerFired {
        kind: TimerKind,
        generation: u64,
    },
}

/// Result of the startup sequence. Each step is independent; failures are
/// carried as messages so the reducer can log them.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub identity: Result<ShelfIdentity, String>,
    /// `Err` means every layout source failed; the fallback grid applies.
    pub layout: Result<ShelfLayout, String>,
    /// `None` when pending jobs were not requested.
    pub pending_jobs: Option<Result<Vec<Job>, String>>,
    pub queue: Result<Vec<Job>, String>,
    pub shelf_state: Result<Vec<Cell>, String>,
}

#[derive(Debug, Clone)]
pub enum TaskResult {
    Bootstrap(Box<BootstrapOutcome>),
    QueueSynced(Result<Vec<Job>, String>),
    ShelfRefreshed(Result<Vec<Cell>, String>),
    JobCompleted {
        job_id: String,
        lot_no: String,
        then_select: Option<String>,
        result: Result<(), String>,
    },
    LmsLookedUp {
        lot_no: String,
        result: Result<LmsLocation, String>,
    },
}

impl TaskResult {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskResult::Bootstrap(_) => TaskKind::Bootstrap,
            TaskResult::QueueSynced(_) => TaskKind::QueueSync,
            TaskResult::ShelfRefreshed(_) => TaskKind::ShelfRefresh,
            TaskResult::JobCompleted { .. } => TaskKind::Completion,
            TaskResult::LmsLookedUp { .. } => TaskKind::LmsLookup,
        }
    }
}
