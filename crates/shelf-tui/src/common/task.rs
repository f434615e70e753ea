//! Async task bookkeeping.
//!
//! Every network-backed effect carries a [`TaskId`]. The reducer records the
//! id as the active task of its kind when it issues the effect; a result is
//! applied only if its id is still the active one. Issuing a newer task of
//! the same kind (or clearing the slot) turns older in-flight results stale.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

#[derive(Debug, Default)]
pub struct TaskSeq {
    next: u64,
}

impl TaskSeq {
    pub fn next_id(&mut self) -> TaskId {
        let id = TaskId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Bootstrap,
    QueueSync,
    ShelfRefresh,
    Completion,
    LmsLookup,
}

/// Task lifecycle state (stored in `KioskState`, mutated only by the reducer).
#[derive(Debug, Default, Clone)]
pub struct TaskState {
    pub active: Option<TaskId>,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn start(&mut self, id: TaskId) {
        self.active = Some(id);
    }

    pub fn finish_if_active(&mut self, id: TaskId) -> bool {
        let ok = self.active == Some(id);
        if ok {
            self.active = None;
        }
        ok
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

#[derive(Debug, Default, Clone)]
pub struct Tasks {
    pub bootstrap: TaskState,
    pub queue_sync: TaskState,
    pub shelf_refresh: TaskState,
    pub completion: TaskState,
    pub lms_lookup: TaskState,
}

impl Tasks {
    pub fn state_mut(&mut self, kind: TaskKind) -> &mut TaskState {
        match kind {
            TaskKind::Bootstrap => &mut self.bootstrap,
            TaskKind::QueueSync => &mut self.queue_sync,
            TaskKind::ShelfRefresh => &mut self.shelf_refresh,
            TaskKind::Completion => &mut self.completion,
            TaskKind::LmsLookup => &mut self.lms_lookup,
        }
    }
}
