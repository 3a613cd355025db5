use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use oracle_protocol::frame::CONTENT_TYPE;
use oracle_protocol::{
    AgentEvent, ArtifactDownloadRequest, ArtifactListing, RunRequest, RunResponse, SessionId,
    paths,
};
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{ClientError, ClientResult};
use crate::handle::StreamHandle;
use crate::sse::parse_agent_stream;

/// One item of a decoded plan stream.
///
/// A stream yields any number of `Event`s followed by exactly one `Done`
/// or `Error`, then ends.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    Event(AgentEvent),
    Done,
    Error(String),
}

impl StreamSignal {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Event(_))
    }
}

pub type EventStream = BoxStream<'static, StreamSignal>;

/// Callbacks driven by [`PlanClient::open`].
pub trait StreamObserver: Send + 'static {
    fn on_event(&mut self, event: AgentEvent);
    fn on_done(&mut self);
    fn on_error(&mut self, message: String);
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Upper bound for non-streaming calls. Streams are never timed out.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// A downloaded artifact body with the headers the gateway passed through.
#[derive(Debug, Clone)]
pub struct ArtifactDownload {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Bytes,
}

/// HTTP client for the gateway's plan endpoints.
#[derive(Debug, Clone)]
pub struct PlanClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl PlanClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Lazy stream of decoded events for one goal submission.
    ///
    /// Validation happens here, synchronously; nothing is sent until the
    /// stream is first polled. Dropping the stream closes the connection.
    pub fn events(&self, request: &RunRequest) -> ClientResult<EventStream> {
        request.validate()?;

        let http = self.http.clone();
        let url = self.url(paths::STREAM);
        let body = request.clone();

        let events = stream! {
            let response = match http
                .post(&url)
                .header(ACCEPT, CONTENT_TYPE)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    yield StreamSignal::Error(format!("failed to open plan stream: {error}"));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let detail = error_detail(response).await;
                warn!(status = status.as_u16(), %detail, "plan stream rejected");
                yield StreamSignal::Event(AgentEvent::error(format!(
                    "request failed with status {}: {detail}",
                    status.as_u16()
                )));
                yield StreamSignal::Done;
                return;
            }

            info!(%url, "plan stream opened");
            let mut events = parse_agent_stream(response.bytes_stream());
            let mut decoded = 0_u64;
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) if event.is_terminal() => {
                        debug!(decoded, "terminal event received");
                        yield StreamSignal::Done;
                        return;
                    }
                    Ok(event) => {
                        decoded += 1;
                        yield StreamSignal::Event(event);
                    }
                    Err(error) => {
                        warn!(%error, decoded, "plan stream failed");
                        yield StreamSignal::Error(error.to_string());
                        return;
                    }
                }
            }

            debug!(decoded, "plan stream closed without terminal event");
            yield StreamSignal::Done;
        };

        Ok(events.boxed())
    }

    /// Drive a plan stream into `observer` on a background task.
    ///
    /// The returned handle cancels the stream. A cancelled stream ends
    /// silently: the observer sees neither `on_done` nor `on_error`.
    pub fn open<O>(&self, request: &RunRequest, mut observer: O) -> ClientResult<StreamHandle>
    where
        O: StreamObserver,
    {
        let mut events = self.events(request)?;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            loop {
                let signal = tokio::select! {
                    biased;
                    () = cancelled.cancelled() => {
                        debug!("plan stream cancelled by caller");
                        return;
                    }
                    signal = events.next() => signal,
                };

                match signal {
                    Some(StreamSignal::Event(event)) => observer.on_event(event),
                    Some(StreamSignal::Done) | None => {
                        observer.on_done();
                        return;
                    }
                    Some(StreamSignal::Error(message)) => {
                        if !cancelled.is_cancelled() {
                            observer.on_error(message);
                        }
                        return;
                    }
                }
            }
        });

        Ok(StreamHandle::new(token, task))
    }

    /// Non-streaming submission: the whole plan in one response.
    #[instrument(skip(self, request), fields(domain = %request.domain))]
    pub async fn run(&self, request: &RunRequest) -> ClientResult<RunResponse> {
        request.validate()?;
        let response = self
            .http
            .post(self.url(paths::RUN))
            .timeout(self.config.request_timeout)
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn list_artifacts(&self, session_id: &SessionId) -> ClientResult<ArtifactListing> {
        let response = self
            .http
            .get(self.url(&format!("{}/{session_id}", paths::ARTIFACTS)))
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, request), fields(artifact_id = %request.artifact_id))]
    pub async fn download_artifact(
        &self,
        request: &ArtifactDownloadRequest,
    ) -> ClientResult<ArtifactDownload> {
        request.validate()?;
        let response = self
            .http
            .post(self.url(paths::DOWNLOAD_ARTIFACT))
            .timeout(self.config.request_timeout)
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let content_type = header(reqwest::header::CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);
        Ok(ArtifactDownload {
            content_type,
            content_disposition,
            body: response.bytes().await?,
        })
    }
}

async fn ensure_success(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        detail: error_detail(response).await,
    })
}

/// Extract `error` / `detail` from a JSON error body, else the raw text.
async fn error_detail(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            ["error", "detail"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_owned))
        })
        .unwrap_or(text)
}
