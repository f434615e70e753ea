//! Gateway push channel (WebSocket).
//!
//! Frames are JSON objects `{"type": "...", "payload": {...}}`. A few older
//! kinds carry their fields at the top level instead of under `payload`;
//! field lookup checks both.
//!
//! The connection loop reconnects with a fixed backoff and gives up after a
//! bounded number of consecutive failures, reporting [`PushMessage::GaveUp`]
//! so the caller can fall back to polling.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PushConfig;
use crate::model::{Cell, Job, Location, lenient_string, lenient_u32};

/// Warning kind sent when a job was completed elsewhere.
pub const JOB_ALREADY_COMPLETED: &str = "JOB_ALREADY_COMPLETED";

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Snapshot sent on connect. Either part may be missing.
    InitialState {
        jobs: Option<Vec<Job>>,
        shelf_state: Option<Vec<Cell>>,
    },
    NewJob(Job),
    /// The Gateway reloaded its job list; the queue must be re-fetched.
    JobsReloaded {
        message: String,
        loaded_count: u32,
        skipped_count: u32,
    },
    JobCompleted {
        job_id: Option<String>,
        lot_no: Option<String>,
        shelf_state: Option<Vec<Cell>>,
    },
    JobCanceled {
        lot_no: String,
    },
    JobWarning {
        warning: Option<String>,
        message: String,
    },
    JobError {
        lot_no: Option<String>,
        location: Option<Location>,
        message: Option<String>,
    },
    SystemReset,
    ShelfStateUpdated(Vec<Cell>),
    QueueUpdated(Vec<Job>),
    Error {
        message: String,
    },
    LmsResponse {
        lot_no: Option<String>,
        correct_shelf: Option<String>,
        message: Option<String>,
    },
}

/// What the connection loop reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    Connected,
    Disconnected,
    Event(PushEvent),
    /// Reconnect budget exhausted; the loop has stopped.
    GaveUp,
}

/// Looks a field up under `payload` first, then at the top level.
fn field<'a>(frame: &'a Value, name: &str) -> Option<&'a Value> {
    frame
        .get("payload")
        .and_then(|payload| payload.get(name))
        .or_else(|| frame.get(name))
        .filter(|value| !value.is_null())
}

fn string_field(frame: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| field(frame, name).and_then(lenient_string))
}

fn cells_field(frame: &Value, name: &str) -> Option<Vec<Cell>> {
    field(frame, name)
        .and_then(Value::as_array)
        .map(|cells| Cell::decode_list(cells.clone()))
}

fn jobs_field(frame: &Value, names: &[&str]) -> Option<Vec<Job>> {
    names.iter().find_map(|name| {
        field(frame, name)
            .and_then(Value::as_array)
            .map(|jobs| Job::decode_list(jobs.clone()))
    })
}

/// Parses one text frame.
///
/// Returns `Ok(None)` for well-formed frames of an unknown kind (and for
/// known kinds missing their required payload); `Err` for non-JSON text.
pub fn parse_frame(text: &str) -> Result<Option<PushEvent>> {
    let frame: Value = serde_json::from_str(text).context("push frame is not JSON")?;
    let Some(kind) = frame.get("type").and_then(Value::as_str) else {
        debug!("push frame without type");
        return Ok(None);
    };

    let event = match kind {
        "initial_state" => Some(PushEvent::InitialState {
            jobs: jobs_field(&frame, &["jobs"]),
            shelf_state: cells_field(&frame, "shelf_state"),
        }),
        "new_job" => frame
            .get("payload")
            .cloned()
            .and_then(|payload| serde_json::from_value::<Job>(payload).ok())
            .map(PushEvent::NewJob),
        "jobs_reloaded" => Some(PushEvent::JobsReloaded {
            message: string_field(&frame, &["message"]).unwrap_or_else(|| "Jobs reloaded".to_string()),
            loaded_count: field(&frame, "loaded_count").and_then(lenient_u32).unwrap_or(0),
            skipped_count: field(&frame, "skipped_count").and_then(lenient_u32).unwrap_or(0),
        }),
        "job_completed" => Some(PushEvent::JobCompleted {
            job_id: string_field(&frame, &["completedJobId", "jobId"]),
            lot_no: string_field(&frame, &["lot_no"]).or_else(|| {
                frame
                    .get("job_data")
                    .and_then(|data| data.get("lot_no"))
                    .and_then(lenient_string)
            }),
            shelf_state: cells_field(&frame, "shelf_state"),
        }),
        "job_canceled" => {
            string_field(&frame, &["lot_no"]).map(|lot_no| PushEvent::JobCanceled { lot_no })
        }
        "job_warning" => Some(PushEvent::JobWarning {
            warning: string_field(&frame, &["warning"]),
            message: string_field(&frame, &["message"]).unwrap_or_else(|| "Job warning".to_string()),
        }),
        "job_error" => Some(PushEvent::JobError {
            lot_no: string_field(&frame, &["lot_no"]),
            location: field(&frame, "level")
                .and_then(lenient_u32)
                .zip(field(&frame, "block").and_then(lenient_u32))
                .and_then(|(level, block)| Location::new(level, block)),
            message: string_field(&frame, &["message", "error"]),
        }),
        "system_reset" => Some(PushEvent::SystemReset),
        "shelf_state_updated" => cells_field(&frame, "shelf_state").map(PushEvent::ShelfStateUpdated),
        "queue_updated" => jobs_field(&frame, &["queue", "jobs"]).map(PushEvent::QueueUpdated),
        "error" => Some(PushEvent::Error {
            message: string_field(&frame, &["message", "error"])
                .unwrap_or_else(|| "Gateway reported an error".to_string()),
        }),
        "lms_response" => {
            let data = field(&frame, "lms_data").unwrap_or(&frame);
            let pick = |names: &[&str]| {
                names.iter().find_map(|name| {
                    data.get(name)
                        .or_else(|| field(&frame, name))
                        .and_then(lenient_string)
                })
            };
            Some(PushEvent::LmsResponse {
                lot_no: pick(&["lotNo", "lot_no"]),
                correct_shelf: pick(&["correctShelf", "correct_shelf"]),
                message: pick(&["message", "error"]),
            })
        }
        other => {
            debug!(kind = other, "ignoring unknown push event");
            None
        }
    };
    if event.is_none() {
        debug!(kind, "push frame had no usable payload");
    }
    Ok(event)
}

/// Runs the push connection until cancelled or the reconnect budget runs out.
///
/// A successful connection resets the failure count.
pub async fn run_push_channel(
    url: Url,
    config: PushConfig,
    tx: mpsc::UnboundedSender<PushMessage>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let connect = tokio::select! {
            () = cancel.cancelled() => return,
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        match connect {
            Ok((mut stream, _response)) => {
                info!(%url, "push channel connected");
                failures = 0;
                if tx.send(PushMessage::Connected).is_err() {
                    return;
                }

                loop {
                    let next = tokio::select! {
                        () = cancel.cancelled() => return,
                        next = stream.next() => next,
                    };
                    match next {
                        Some(Ok(Message::Text(text))) => match parse_frame(text.as_str()) {
                            Ok(Some(event)) => {
                                if tx.send(PushMessage::Event(event)).is_err() {
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => warn!("dropping malformed push frame: {e:#}"),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "push channel closed by gateway");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("push channel error: {e}");
                            break;
                        }
                        None => break,
                    }
                }

                if tx.send(PushMessage::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => warn!(%url, "push channel connect failed: {e}"),
        }

        failures += 1;
        if failures > config.max_reconnect_attempts {
            warn!(
                attempts = config.max_reconnect_attempts,
                "push channel giving up, switching to polling"
            );
            let _ = tx.send(PushMessage::GaveUp);
            return;
        }

        debug!(failures, "push channel reconnecting");
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(config.reconnect_backoff()) => {}
        }
    }
}
