//! Request/response pass-through to the orchestrator.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use oracle_protocol::{
    ArtifactDownloadRequest, AssessRequest, AssessResponse, RunRequest, SessionId,
};
use oracle_risk::RuleBasedScorer;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::AppState;
use crate::config::upstream;
use crate::error::{ApiError, ApiResult};

pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "oracle-gateway",
        "upstream": state.config.orchestrator_url,
    }))
}

/// Copy status, selected headers and body from an upstream success.
async fn pass_through(response: reqwest::Response, headers: &[HeaderName]) -> ApiResult<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "orchestrator returned an error");
        return Err(ApiError::upstream(status, &body));
    }

    let mut kept = HeaderMap::new();
    for name in headers {
        if let Some(value) = response.headers().get(name) {
            kept.insert(name.clone(), value.clone());
        }
    }
    let body = response.bytes().await.map_err(ApiError::bad_gateway)?;
    Ok((status, kept, body).into_response())
}

#[instrument(skip(state, payload))]
pub async fn run_plan(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    request.validate()?;

    let response = state
        .http
        .post(state.config.upstream(upstream::RUN))
        .timeout(state.config.request_timeout)
        .json(&request)
        .send()
        .await
        .map_err(ApiError::bad_gateway)?;
    pass_through(response, &[CONTENT_TYPE]).await
}

#[instrument(skip(state, payload))]
pub async fn assess_ride(
    State(state): State<AppState>,
    payload: Result<Json<AssessRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    let sent = state
        .http
        .post(state.config.upstream(upstream::ASSESS))
        .timeout(state.config.request_timeout)
        .json(&request)
        .send()
        .await;

    match sent {
        Ok(response) => pass_through(response, &[CONTENT_TYPE]).await,
        Err(error) if state.config.risk_fallback => {
            warn!(%error, "orchestrator unreachable; scoring locally");
            let scored: AssessResponse = RuleBasedScorer.assess(&request);
            info!(score = scored.risk.score, level = %scored.risk.level, "fallback score");
            Ok(Json(scored).into_response())
        }
        Err(error) => Err(ApiError::bad_gateway(error)),
    }
}

#[instrument(skip(state), fields(session_id = %session_id))]
pub async fn list_artifacts(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Response> {
    if session_id.is_blank() {
        return Err(ApiError::bad_request("session_id must not be blank"));
    }
    let response = state
        .http
        .get(state.config.upstream(&format!("{}/{session_id}", upstream::ARTIFACTS)))
        .timeout(state.config.request_timeout)
        .send()
        .await
        .map_err(ApiError::bad_gateway)?;
    pass_through(response, &[CONTENT_TYPE]).await
}

#[instrument(skip(state, payload))]
pub async fn download_artifact(
    State(state): State<AppState>,
    payload: Result<Json<ArtifactDownloadRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    request.validate()?;

    let response = state
        .http
        .post(state.config.upstream(upstream::DOWNLOAD_ARTIFACT))
        .timeout(state.config.request_timeout)
        .json(&request)
        .send()
        .await
        .map_err(ApiError::bad_gateway)?;
    pass_through(response, &[CONTENT_TYPE, CONTENT_DISPOSITION]).await
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "no such route" })))
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use oracle_client::{ClientConfig, ClientError, PlanClient};
    use oracle_protocol::{
        ArtifactDownloadRequest, ArtifactId, AssessRequest, AssessResponse, BehaviourFlag,
        RideForm, RiskLevel, RunRequest, SessionId, paths,
    };
    use serde_json::{Value, json};

    use crate::config::{GatewayConfig, upstream};
    use crate::testing::{serve, spawn_gateway};

    fn unreachable_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn health_reports_upstream() {
        let gateway = spawn_gateway(GatewayConfig::new("http://orchestrator:8000")).await;
        let body: Value = reqwest::get(format!("{gateway}{}", paths::HEALTH))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["upstream"], "http://orchestrator:8000");
    }

    #[tokio::test]
    async fn run_relays_the_whole_plan() {
        let upstream_url = serve(Router::new().route(
            upstream::RUN,
            post(|Json(request): Json<RunRequest>| async move {
                Json(json!({
                    "session_id": "s-9",
                    "plan": { "goal": request.goal, "executive_summary": "do it" },
                    "events": [{ "type": "thinking", "content": "x" }, { "type": "mystery" }],
                }))
            }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;
        let client = PlanClient::new(ClientConfig::new(gateway)).unwrap();

        let response = client.run(&RunRequest::new("open a bakery")).await.unwrap();
        assert_eq!(response.session_id, SessionId::from_string("s-9"));
        assert_eq!(response.plan.goal, "open a bakery");
        assert_eq!(response.events.len(), 2);
        assert_eq!(response.decoded_events().len(), 1);
    }

    #[tokio::test]
    async fn upstream_status_and_detail_are_preserved() {
        let upstream_url = serve(Router::new().route(
            &format!("{}/{{session_id}}", upstream::ARTIFACTS),
            get(|| async {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": "Session not found" })))
            }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;
        let client = PlanClient::new(ClientConfig::new(gateway)).unwrap();

        let err = client
            .list_artifacts(&SessionId::from_string("missing"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { status: 404, ref detail } if detail == "Session not found"
        ));
    }

    #[tokio::test]
    async fn artifact_listing_passes_through() {
        let upstream_url = serve(Router::new().route(
            &format!("{}/{{session_id}}", upstream::ARTIFACTS),
            get(|Path(session_id): Path<String>| async move {
                Json(json!({ "session_id": session_id, "artifacts": [], "count": 0 }))
            }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;
        let client = PlanClient::new(ClientConfig::new(gateway)).unwrap();

        let listing = client
            .list_artifacts(&SessionId::from_string("s-1"))
            .await
            .unwrap();
        assert_eq!(listing.session_id, SessionId::from_string("s-1"));
        assert_eq!(listing.count, 0);
    }

    #[tokio::test]
    async fn download_keeps_content_headers() {
        let upstream_url = serve(Router::new().route(
            upstream::DOWNLOAD_ARTIFACT,
            post(|Json(request): Json<ArtifactDownloadRequest>| async move {
                let filename = request.filename_for("budget");
                (
                    [
                        (CONTENT_TYPE, "text/markdown; charset=utf-8".to_owned()),
                        (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
                    ],
                    "# Budget\n",
                )
            }),
        ))
        .await;
        let gateway = spawn_gateway(GatewayConfig::new(upstream_url)).await;
        let client = PlanClient::new(ClientConfig::new(gateway)).unwrap();

        let download = client
            .download_artifact(&ArtifactDownloadRequest::new(
                ArtifactId::from_string("0123456789abcdef"),
                SessionId::from_string("s-1"),
            ))
            .await
            .unwrap();
        assert_eq!(download.content_type.as_deref(), Some("text/markdown; charset=utf-8"));
        assert_eq!(
            download.content_disposition.as_deref(),
            Some("attachment; filename=\"budget_01234567.md\"")
        );
        assert_eq!(&download.body[..], b"# Budget\n");
    }

    #[tokio::test]
    async fn blank_download_ids_are_rejected() {
        let gateway = spawn_gateway(GatewayConfig::new(unreachable_url())).await;
        let response = reqwest::Client::new()
            .post(format!("{gateway}{}", paths::DOWNLOAD_ARTIFACT))
            .json(&json!({ "artifact_id": " ", "session_id": "s-1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn risky_ride() -> AssessRequest {
        AssessRequest::new(
            RideForm::default(),
            [BehaviourFlag::RouteDeviation, BehaviourFlag::DoorsLocked],
        )
    }

    #[tokio::test]
    async fn assess_without_fallback_is_bad_gateway() {
        let gateway = spawn_gateway(GatewayConfig::new(unreachable_url())).await;
        let response = reqwest::Client::new()
            .post(format!("{gateway}{}", paths::ASSESS))
            .json(&risky_ride())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn assess_falls_back_to_rules_when_enabled() {
        let config = GatewayConfig {
            risk_fallback: true,
            ..GatewayConfig::new(unreachable_url())
        };
        let gateway = spawn_gateway(config).await;
        let response: AssessResponse = reqwest::Client::new()
            .post(format!("{gateway}{}", paths::ASSESS))
            .json(&risky_ride())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        // 10 unknown driver + 20 + 15
        assert_eq!(response.risk.score, 45);
        assert_eq!(response.risk.level, RiskLevel::Moderate);
    }
}
