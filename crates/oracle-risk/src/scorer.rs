use std::time::Duration;

use async_trait::async_trait;
use oracle_protocol::{AssessRequest, AssessResponse, paths};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::ScoreError;

/// A stateless scoring call: one ride snapshot in, one assessment out.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score(&self, request: &AssessRequest) -> Result<AssessResponse, ScoreError>;
}

#[async_trait]
impl<S: RiskScorer + ?Sized> RiskScorer for std::sync::Arc<S> {
    async fn score(&self, request: &AssessRequest) -> Result<AssessResponse, ScoreError> {
        (**self).score(request).await
    }
}

/// Scores by POSTing to a scoring endpoint.
#[derive(Debug, Clone)]
pub struct HttpRiskScorer {
    http: reqwest::Client,
    url: String,
}

impl HttpRiskScorer {
    /// Scorer for the gateway's assess route under `base_url`.
    pub fn for_gateway(base_url: &str, timeout: Duration) -> Result<Self, ScoreError> {
        Self::new(
            format!("{}{}", base_url.trim_end_matches('/'), paths::ASSESS),
            timeout,
        )
    }

    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ScoreError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RiskScorer for HttpRiskScorer {
    #[instrument(
        skip(self, request),
        fields(
            url = %self.url,
            flags = request.behaviour_flags.len(),
            area = %request.form.area_type
        )
    )]
    async fn score(&self, request: &AssessRequest) -> Result<AssessResponse, ScoreError> {
        let response = self.http.post(&self.url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| {
                    body.get("detail")
                        .or_else(|| body.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                })
                .unwrap_or(text);
            return Err(ScoreError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        let assessed: AssessResponse = response.json().await?;
        debug!(score = assessed.risk.score, level = %assessed.risk.level, "ride scored");
        Ok(assessed)
    }
}
