use shelf_core::config::PushConfig;
use shelf_core::push::{PushMessage, run_push_channel};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::events::UiEvent;
use crate::runtime::inbox::UiEventSender;

/// Runs the push channel and forwards its messages to the inbox.
pub async fn push_channel(
    url: Url,
    config: PushConfig,
    inbox: UiEventSender,
    cancel: CancellationToken,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if inbox.send(UiEvent::Push(message)).is_err() {
                break;
            }
        }
    });

    run_push_channel(url, config, tx, cancel).await;
    let _ = forward.await;
}

/// Reported when the push URL cannot be derived from the gateway URL.
pub fn push_unavailable() -> UiEvent {
    UiEvent::Push(PushMessage::GaveUp)
}
