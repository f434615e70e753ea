//! Effect handlers for the kiosk runtime.
//!
//! These functions perform I/O. They do NOT mutate state; each returns the
//! `UiEvent` the runtime sends to the inbox.
//!
//! ```ignore
//! // Handler: pure async, returns UiEvent
//! pub async fn sync_queue(client: GatewayClient, task: TaskId) -> UiEvent { ... }
//!
//! // Runtime: spawns and sends to inbox
//! self.spawn_effect(move || handlers::sync_queue(client, task));
//! ```

pub mod gateway;
pub mod led;
pub mod push;

pub use gateway::*;
pub use led::*;
pub use push::*;
