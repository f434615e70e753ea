//! HTTP client for the shelf Gateway.
//!
//! Every call is a single request with no retries. Callers decide how a
//! failure degrades (cached values, fallback layout, user notification).

mod led;
mod types;

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
pub use led::{LedCommand, LedSpot, Rgb};
use led::{LedBatchBody, LedPositionBody};
use reqwest::Response;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
pub use types::{DEFAULT_SHELF_ID, LmsLocation};
use types::{
    CheckShelfRequest, CheckShelfResponse, ErrorBody, LayoutRequest, LayoutResponse,
    PendingJobsResponse, QueueResponse, ShelfConfigResponse, ShelfIdRequest, ShelfNameResponse,
    ShelfStateResponse,
};
use url::Url;

use crate::model::{Cell, Job, PlaceFlag, ShelfLayout};
use crate::store::ShelfIdentity;

#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    /// Creates a client for `base_url` (e.g. `http://127.0.0.1:8000`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url.trim()).with_context(|| format!("Invalid gateway URL '{base_url}'"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!("Gateway URL must be http or https, got '{}'", base_url.scheme());
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Push channel endpoint: same host, `ws`/`wss` scheme, `/ws` path.
    pub fn push_url(&self) -> Result<Url> {
        let mut url = self.endpoint("ws")?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        url.set_scheme(scheme)
            .map_err(|()| anyhow!("Cannot derive push URL from {}", self.base_url))?;
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid endpoint path '{path}'"))
    }

    // ------------------------------------------------------------------------
    // Shelf identity and layout
    // ------------------------------------------------------------------------

    /// `GET /api/shelf/name`.
    pub async fn fetch_shelf_name(&self) -> Result<ShelfIdentity> {
        let response: ShelfNameResponse = self.get("api/shelf/name").await?;
        let shelf_id = response
            .shelf_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if !response.success || shelf_id.is_none() {
            bail!("Gateway did not report a shelf id");
        }
        Ok(ShelfIdentity {
            shelf_id,
            shelf_name: response.shelf_name.filter(|name| !name.trim().is_empty()),
        })
    }

    /// Loads the shelf layout: the Gateway layout endpoint first, then the
    /// static config endpoint. Errors only when both fail; the caller falls
    /// back to [`ShelfLayout::fallback`].
    pub async fn fetch_config(&self, shelf_id: Option<&str>) -> Result<ShelfLayout> {
        match self.fetch_layout(shelf_id.unwrap_or(DEFAULT_SHELF_ID)).await {
            Ok(layout) => return Ok(layout),
            Err(e) => warn!("Gateway layout unavailable, trying static config: {e:#}"),
        }
        self.fetch_static_config().await
    }

    /// `POST /api/shelf/layout`.
    pub async fn fetch_layout(&self, shelf_id: &str) -> Result<ShelfLayout> {
        let request = LayoutRequest {
            shelf_id,
            update_flg: "0",
            slots: Default::default(),
        };
        let response: LayoutResponse = self.post("api/shelf/layout", &request).await?;
        response
            .into_layout()
            .ok_or_else(|| anyhow!("Gateway layout response had no usable slots"))
    }

    /// `GET /api/shelf/config`.
    pub async fn fetch_static_config(&self) -> Result<ShelfLayout> {
        let response: ShelfConfigResponse = self.get("api/shelf/config").await?;
        ShelfLayout::from_config(&response.config, &response.cell_capacities)
            .ok_or_else(|| anyhow!("Shelf config response had no levels"))
    }

    // ------------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------------

    /// `GET /api/queue`. Authoritative list; invalid entries are dropped.
    pub async fn fetch_queue(&self) -> Result<Vec<Job>> {
        let response: QueueResponse = self.get("api/queue").await?;
        Ok(Job::decode_list(response.into_values()))
    }

    /// `POST /api/pending-jobs`.
    pub async fn fetch_pending_jobs(&self, shelf_id: &str) -> Result<Vec<Job>> {
        let response: PendingJobsResponse = self
            .post("api/pending-jobs", &ShelfIdRequest { shelf_id })
            .await?;
        if !response.success {
            bail!("Gateway refused to list pending jobs");
        }
        Ok(Job::decode_list(response.jobs))
    }

    /// `POST /command/{jobId}/complete`.
    ///
    /// A repeated completion of an already-completed job comes back as an
    /// error like any other failure.
    pub async fn complete_job(&self, job_id: &str) -> Result<()> {
        let url = self
            .base_url
            .join("command/")
            .and_then(|url| url.join(&format!("{}/complete", urlencode_segment(job_id))))
            .with_context(|| format!("Invalid job id '{job_id}'"))?;
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .context("Completion request failed")?;
        Self::ensure_success(response).await?;
        debug!(job_id, "job completion acknowledged");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Shelf state and LMS
    // ------------------------------------------------------------------------

    /// `GET /api/shelf/state`. Authoritative full snapshot.
    pub async fn fetch_shelf_state(&self) -> Result<Vec<Cell>> {
        let response: ShelfStateResponse = self.get("api/shelf/state").await?;
        Ok(Cell::decode_list(response.shelf_state))
    }

    /// `POST /api/lms/check-shelf`. Read-only lookup.
    pub async fn lookup_correct_shelf(
        &self,
        lot_no: &str,
        place_flag: PlaceFlag,
        shelf_id: Option<&str>,
    ) -> Result<LmsLocation> {
        let request = CheckShelfRequest {
            lot_no,
            place_flg: place_flag.as_wire(),
            shelf_id: shelf_id.unwrap_or(DEFAULT_SHELF_ID),
        };
        let response: CheckShelfResponse = self.post("api/lms/check-shelf", &request).await?;
        if !response.success {
            bail!(
                "{}",
                response
                    .error
                    .unwrap_or_else(|| "LMS has no location for this lot".to_string())
            );
        }
        let correct_shelf = match response.correct_shelf {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Null) | None => bail!("LMS response did not name a shelf"),
            Some(other) => other.to_string(),
        };
        Ok(LmsLocation {
            lot_no: response.lot_no.unwrap_or_else(|| lot_no.to_string()),
            correct_shelf,
        })
    }

    // ------------------------------------------------------------------------
    // LEDs
    // ------------------------------------------------------------------------

    /// Sends an LED command. Callers treat failures as log-only.
    pub async fn apply_led(&self, command: &LedCommand) -> Result<()> {
        match command {
            LedCommand::Clear => self.clear_led().await,
            LedCommand::Single(spot) => {
                self.post_unit("api/led", &LedPositionBody::from(spot))
                    .await
            }
            LedCommand::Batch { spots, clear_first } => {
                let body = LedBatchBody {
                    positions: spots.iter().map(LedPositionBody::from).collect(),
                    clear_first: *clear_first,
                };
                self.post_unit("api/led", &body).await
            }
        }
    }

    /// `POST /api/led/clear`.
    pub async fn clear_led(&self) -> Result<()> {
        let url = self.endpoint("api/led/clear")?;
        let response = self
            .http
            .post(url)
            .send()
            .await
            .context("LED clear request failed")?;
        Self::ensure_success(response).await
    }

    // ------------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------------

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET /{path} failed"))?;
        Self::decode(response)
            .await
            .with_context(|| format!("GET /{path}"))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST /{path} failed"))?;
        Self::decode(response)
            .await
            .with_context(|| format!("POST /{path}"))
    }

    /// POST where only the status matters.
    async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST /{path} failed"))?;
        Self::ensure_success(response)
            .await
            .with_context(|| format!("POST /{path}"))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .context("Failed to read gateway response")?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        serde_json::from_slice(&bytes).context("Failed to decode gateway response")
    }

    async fn ensure_success(response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let bytes = response.bytes().await.unwrap_or_default();
        Err(status_error(status, &bytes))
    }
}

/// Builds an error from a non-2xx response, using the body's message if any.
fn status_error(status: reqwest::StatusCode, body: &[u8]) -> anyhow::Error {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message());
    match message {
        Some(message) => anyhow!("Gateway returned {status}: {message}"),
        None => anyhow!("Gateway returned {status}"),
    }
}

/// Percent-encodes characters that would break out of a path segment.
fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
