//! Request and response bodies for the plan endpoints.

use crate::error::{ProtocolError, ProtocolResult};
use crate::event::{AgentEvent, Artifact, Plan};
use crate::ids::{ArtifactId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_domain() -> String {
    "general".to_owned()
}

/// A goal submission, shared by the streaming and non-streaming endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Missing decodes as blank so `validate` reports it.
    #[serde(default)]
    pub goal: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub extra_context: Map<String, Value>,
}

impl RunRequest {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            domain: default_domain(),
            session_id: None,
            extra_context: Map::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_context.insert(key.into(), value);
        self
    }

    /// Rejects a missing or whitespace-only goal.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.goal.trim().is_empty() {
            return Err(ProtocolError::BlankField { field: "goal" });
        }
        Ok(())
    }
}

/// Response of the non-streaming run endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub session_id: SessionId,
    pub plan: Plan,
    /// Raw event log; kept as JSON so one unfamiliar entry cannot fail the body.
    #[serde(default)]
    pub events: Vec<Value>,
}

impl RunResponse {
    /// Events that decode to a known [`AgentEvent`], in order.
    pub fn decoded_events(&self) -> Vec<AgentEvent> {
        self.events
            .iter()
            .filter_map(|raw| serde_json::from_value(raw.clone()).ok())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDownloadRequest {
    pub artifact_id: ArtifactId,
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ArtifactDownloadRequest {
    pub fn new(artifact_id: ArtifactId, session_id: SessionId) -> Self {
        Self {
            artifact_id,
            session_id,
            filename: None,
        }
    }

    pub fn validate(&self) -> ProtocolResult<()> {
        if self.artifact_id.is_blank() {
            return Err(ProtocolError::BlankField {
                field: "artifact_id",
            });
        }
        if self.session_id.is_blank() {
            return Err(ProtocolError::BlankField {
                field: "session_id",
            });
        }
        Ok(())
    }

    /// Requested filename, or `<kind>_<first 8 chars of id>.md`.
    pub fn filename_for(&self, artifact_kind: &str) -> String {
        match self.filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => {
                let prefix: String = self.artifact_id.as_str().chars().take(8).collect();
                format!("{artifact_kind}_{prefix}.md")
            }
        }
    }
}

/// Artifacts recorded for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactListing {
    pub session_id: SessionId,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub count: usize,
}
