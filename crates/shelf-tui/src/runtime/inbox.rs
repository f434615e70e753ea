//! Inbox channel types.
//!
//! Every async handler, timer and the push forwarder send `UiEvent`s into
//! one unbounded channel; the runtime drains it each loop iteration.

use tokio::sync::mpsc;

use crate::events::UiEvent;

pub type UiEventSender = mpsc::UnboundedSender<UiEvent>;
pub type UiEventReceiver = mpsc::UnboundedReceiver<UiEvent>;
