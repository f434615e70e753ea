//! Shared helpers for the kiosk UI.

pub mod task;
pub mod text;
pub mod timer;

pub use task::{TaskId, TaskKind, TaskSeq, TaskState, Tasks};
pub use text::{center, truncate_with_ellipsis};
pub use timer::{TimerKind, Timers};
