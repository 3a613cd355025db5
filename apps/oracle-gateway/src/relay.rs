//! Plan stream relay.
//!
//! Response headers are committed before the upstream call is made. Upstream
//! bytes are then copied through chunk for chunk, never re-framed. A failure
//! before the first upstream byte becomes a single `error` frame followed by
//! a clean close. Dropping the downstream body drops the upstream response,
//! which closes that connection.

use std::io;

use async_stream::stream;
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use oracle_protocol::{RunRequest, error_frame, frame};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::config::upstream;
use crate::error::ApiResult;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Logs the outcome of one relay, including a downstream disconnect.
struct RelayGuard {
    relay_id: Uuid,
    forwarded_bytes: usize,
    chunks: usize,
    finished: bool,
}

impl RelayGuard {
    fn new(relay_id: Uuid) -> Self {
        Self {
            relay_id,
            forwarded_bytes: 0,
            chunks: 0,
            finished: false,
        }
    }

    fn record(&mut self, chunk: &Bytes) {
        self.forwarded_bytes += chunk.len();
        self.chunks += 1;
    }

    fn finish(&mut self, outcome: &'static str) {
        self.finished = true;
        info!(
            relay_id = %self.relay_id,
            outcome,
            chunks = self.chunks,
            forwarded_bytes = self.forwarded_bytes,
            "relay finished"
        );
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        if !self.finished {
            info!(
                relay_id = %self.relay_id,
                chunks = self.chunks,
                forwarded_bytes = self.forwarded_bytes,
                "downstream disconnected; upstream call cancelled"
            );
        }
    }
}

pub async fn stream_plan(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    request.validate()?;

    let relay_id = Uuid::new_v4();
    info!(%relay_id, domain = %request.domain, "opening plan relay");
    let body = relay_body(
        state.http.clone(),
        state.config.upstream(upstream::STREAM),
        request,
        relay_id,
    );

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(frame::CONTENT_TYPE)),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (CONNECTION, HeaderValue::from_static("keep-alive")),
            (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

fn relay_body(
    http: reqwest::Client,
    url: String,
    request: RunRequest,
    relay_id: Uuid,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    stream! {
        let mut guard = RelayGuard::new(relay_id);

        let response = match http
            .post(&url)
            .header(reqwest::header::ACCEPT, frame::CONTENT_TYPE)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(%relay_id, %error, "upstream stream call failed");
                yield Ok(Bytes::from(error_frame(format!("orchestrator unreachable: {error}"))));
                guard.finish("upstream_unreachable");
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = crate::error::upstream_detail(&body);
            warn!(%relay_id, status = status.as_u16(), %detail, "upstream rejected stream");
            yield Ok(Bytes::from(error_frame(format!(
                "orchestrator returned {}: {detail}",
                status.as_u16()
            ))));
            guard.finish("upstream_rejected");
            return;
        }

        let mut upstream = response.bytes_stream();
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    guard.record(&bytes);
                    debug!(%relay_id, len = bytes.len(), "forwarding chunk");
                    yield Ok(bytes);
                }
                Err(error) if guard.chunks == 0 => {
                    warn!(%relay_id, %error, "upstream failed before first byte");
                    let message = format!("orchestrator stream failed: {error}");
                    yield Ok(Bytes::from(error_frame(message)));
                    guard.finish("upstream_failed");
                    return;
                }
                Err(error) => {
                    // abort the downstream connection; a frame here could split a line
                    warn!(%relay_id, %error, "upstream failed mid-stream");
                    guard.finish("upstream_interrupted");
                    yield Err(io::Error::other(error));
                    return;
                }
            }
        }
        guard.finish("completed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use futures_util::StreamExt;
    use oracle_client::{ClientConfig, PlanClient, StreamSignal};
    use oracle_protocol::{AgentEvent, RunRequest, SessionId, encode_frame, paths};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use crate::config::{GatewayConfig, upstream};
    use crate::testing::{serve, spawn_gateway};

    #[derive(Clone, Default)]
    struct Outcome {
        events: Arc<Mutex<Vec<AgentEvent>>>,
        done: Arc<Mutex<usize>>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl oracle_client::StreamObserver for Outcome {
        fn on_event(&mut self, event: AgentEvent) {
            self.events.lock().push(event);
        }
        fn on_done(&mut self) {
            *self.done.lock() += 1;
        }
        fn on_error(&mut self, message: String) {
            self.errors.lock().push(message);
        }
    }

    #[tokio::test]
    async fn blank_goal_is_rejected_before_upstream() {
        let calls = Arc::new(Mutex::new(0_u32));
        let counted = Arc::clone(&calls);
        let upstream_url = serve(Router::new().route(
            upstream::STREAM,
            post(move || {
                *counted.lock() += 1;
                async { "" }
            }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;

        let response = reqwest::Client::new()
            .post(format!("{gateway}{}", paths::STREAM))
            .json(&serde_json::json!({ "goal": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let missing = reqwest::Client::new()
            .post(format!("{gateway}{}", paths::STREAM))
            .json(&serde_json::json!({ "domain": "legal" }))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(*calls.lock(), 0);
    }

    #[tokio::test]
    async fn upstream_bytes_pass_through_verbatim() {
        let body = format!(
            "{}: comment line\n\n{}{}",
            encode_frame(&AgentEvent::Session {
                session_id: SessionId::from_string("abc"),
            }),
            "data: {\"type\":\"future_kind\"}\n\n",
            encode_frame(&AgentEvent::Done),
        );
        let expected = body.clone();
        let upstream_url = serve(Router::new().route(
            upstream::STREAM,
            post(move || async move { body }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;

        let response = reqwest::Client::new()
            .post(format!("{gateway}{}", paths::STREAM))
            .json(&RunRequest::new("plan"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert_eq!(response.headers()["cache-control"], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");
        assert_eq!(response.text().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn unreachable_upstream_becomes_one_error_frame() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let gateway = spawn_gateway(GatewayConfig::new(format!("http://{addr}"))).await;

        let client = PlanClient::new(ClientConfig::new(gateway)).unwrap();
        let signals: Vec<StreamSignal> = client
            .events(&RunRequest::new("plan"))
            .unwrap()
            .collect()
            .await;

        assert_eq!(signals.len(), 2);
        assert!(matches!(
            &signals[0],
            StreamSignal::Event(AgentEvent::Error { content })
                if content.contains("orchestrator unreachable")
        ));
        assert_eq!(signals[1], StreamSignal::Done);
    }

    #[tokio::test]
    async fn upstream_error_status_becomes_error_frame() {
        let upstream_url = serve(Router::new().route(
            upstream::STREAM,
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    axum::Json(serde_json::json!({ "detail": "model overloaded" })),
                )
            }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;

        let text = reqwest::Client::new()
            .post(format!("{gateway}{}", paths::STREAM))
            .json(&RunRequest::new("plan"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(
            text,
            oracle_protocol::error_frame("orchestrator returned 503: model overloaded")
        );
    }

    #[tokio::test]
    async fn client_cancel_terminates_the_upstream_call() {
        let (tx, rx) = mpsc::channel::<Result<String, std::io::Error>>(4);
        let rx = Arc::new(Mutex::new(Some(rx)));
        let upstream_url = serve(Router::new().route(
            upstream::STREAM,
            post(move || {
                let rx = rx.lock().take();
                async move {
                    match rx {
                        Some(rx) => Response::new(Body::from_stream(ReceiverStream::new(rx))),
                        None => StatusCode::CONFLICT.into_response(),
                    }
                }
            }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;

        let client = PlanClient::new(ClientConfig::new(gateway)).unwrap();
        let outcome = Outcome::default();
        let handle = client.open(&RunRequest::new("plan"), outcome.clone()).unwrap();

        let thinking = || {
            Ok(encode_frame(&AgentEvent::Thinking {
                content: "still working".to_owned(),
            }))
        };
        tx.send(thinking()).await.unwrap();
        for _ in 0..100 {
            if !outcome.events.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(outcome.events.lock().len(), 1);

        handle.cancel();
        handle.join().await;

        // once the gateway drops its upstream response, the producer's
        // writes start failing and its body receiver is dropped
        tokio::time::timeout(Duration::from_secs(10), async {
            while tx.send(thinking()).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
        assert!(outcome.errors.lock().is_empty());
        assert_eq!(*outcome.done.lock(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_mid_stream_reaches_the_client_as_one_error() {
        let (tx, rx) = mpsc::channel::<Result<String, std::io::Error>>(4);
        let rx = Arc::new(Mutex::new(Some(rx)));
        let upstream_url = serve(Router::new().route(
            upstream::STREAM,
            post(move || {
                let rx = rx.lock().take();
                async move {
                    match rx {
                        Some(rx) => Response::new(Body::from_stream(ReceiverStream::new(rx))),
                        None => StatusCode::CONFLICT.into_response(),
                    }
                }
            }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;

        let client = PlanClient::new(ClientConfig::new(gateway)).unwrap();
        let outcome = Outcome::default();
        let handle = client.open(&RunRequest::new("plan"), outcome.clone()).unwrap();

        tx.send(Ok(encode_frame(&AgentEvent::Thinking {
            content: "halfway".to_owned(),
        })))
        .await
        .unwrap();
        for _ in 0..100 {
            if !outcome.events.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(Err(std::io::Error::other("boom"))).await.unwrap();
        tokio::time::timeout(Duration::from_secs(10), handle.join())
            .await
            .unwrap();

        assert_eq!(outcome.events.lock().len(), 1);
        assert_eq!(*outcome.done.lock(), 0);
        let errors = outcome.errors.lock().clone();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].starts_with("plan stream interrupted"));
    }
}
