//! Agent event taxonomy carried by the plan stream.
//!
//! Every frame decodes to exactly one [`AgentEvent`]. The discriminant is the
//! `"type"` field; unknown tags are a decode failure, so a new event kind is a
//! compile-time addition rather than a silently ignored string.

use crate::ids::{ArtifactId, SessionId, SubtaskId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Discriminated union of all events the upstream planner emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Upstream assigned or confirmed the session identifier.
    Session { session_id: SessionId },
    /// Free-text reasoning trace.
    Thinking { content: String },
    /// A tool invocation is starting.
    Acting {
        #[serde(default)]
        tool: String,
        #[serde(default)]
        content: String,
    },
    /// A tool call completed.
    ToolResult {
        tool: String,
        #[serde(default)]
        data: Map<String, Value>,
    },
    IntentAnalyzed { intent: IntentProfile },
    PlanDecomposed { subtasks: Vec<SubTask> },
    SubtaskStart {
        subtask_id: SubtaskId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    SubtaskComplete {
        subtask_id: SubtaskId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact_type: Option<String>,
    },
    ArtifactReady { artifact: Artifact },
    /// Plan quality evaluation.
    Critic {
        #[serde(default)]
        content: String,
        #[serde(default)]
        scores: CriticScores,
        #[serde(default = "default_passed")]
        passed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verdict: Option<String>,
    },
    /// Final structured plan.
    Result { plan: Box<Plan> },
    /// Upstream or transport failure message.
    Error { content: String },
    /// Terminal marker; no further frames follow.
    Done,
}

fn default_passed() -> bool {
    true
}

impl AgentEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Session { .. } => EventType::Session,
            Self::Thinking { .. } => EventType::Thinking,
            Self::Acting { .. } => EventType::Acting,
            Self::ToolResult { .. } => EventType::ToolResult,
            Self::IntentAnalyzed { .. } => EventType::IntentAnalyzed,
            Self::PlanDecomposed { .. } => EventType::PlanDecomposed,
            Self::SubtaskStart { .. } => EventType::SubtaskStart,
            Self::SubtaskComplete { .. } => EventType::SubtaskComplete,
            Self::ArtifactReady { .. } => EventType::ArtifactReady,
            Self::Critic { .. } => EventType::Critic,
            Self::Result { .. } => EventType::Result,
            Self::Error { .. } => EventType::Error,
            Self::Done => EventType::Done,
        }
    }

    /// Whether this event unambiguously ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }
}

/// Fieldless mirror of the [`AgentEvent`] discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Session,
    Thinking,
    Acting,
    ToolResult,
    IntentAnalyzed,
    PlanDecomposed,
    SubtaskStart,
    SubtaskComplete,
    ArtifactReady,
    Critic,
    Result,
    Error,
    Done,
}

impl EventType {
    /// Canonical phase order used for progress derivation.
    pub const PHASES: [EventType; 9] = [
        EventType::Session,
        EventType::IntentAnalyzed,
        EventType::PlanDecomposed,
        EventType::Thinking,
        EventType::Acting,
        EventType::ToolResult,
        EventType::ArtifactReady,
        EventType::Critic,
        EventType::Result,
    ];

    /// Position in [`Self::PHASES`], if this type is a canonical phase.
    pub fn phase_index(self) -> Option<usize> {
        Self::PHASES.iter().position(|phase| *phase == self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Thinking => "thinking",
            Self::Acting => "acting",
            Self::ToolResult => "tool_result",
            Self::IntentAnalyzed => "intent_analyzed",
            Self::PlanDecomposed => "plan_decomposed",
            Self::SubtaskStart => "subtask_start",
            Self::SubtaskComplete => "subtask_complete",
            Self::ArtifactReady => "artifact_ready",
            Self::Critic => "critic",
            Self::Result => "result",
            Self::Error => "error",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of the submitted goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentProfile {
    pub plan_type: String,
    pub urgency: String,
    #[serde(default)]
    pub sub_intents: Vec<String>,
    #[serde(default)]
    pub required_agents: Vec<String>,
    #[serde(default)]
    pub required_artifacts: Vec<String>,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub raw_goal: String,
}

/// Lifecycle of one subtask as seen by the client.
///
/// Ordered by progress: a status only ever moves to a higher rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    #[default]
    Pending,
    Active,
    Complete,
    Failed,
}

impl SubtaskStatus {
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::Complete | Self::Failed => 2,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: SubtaskId,
    pub description: String,
    /// `"artifact_generator"` or the name of a registered tool.
    pub agent_type: String,
    #[serde(default)]
    pub status: SubtaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_artifact_type: Option<String>,
}

impl SubTask {
    pub fn new(
        id: SubtaskId,
        description: impl Into<String>,
        agent_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            agent_type: agent_type.into(),
            status: SubtaskStatus::Pending,
            expected_artifact_type: None,
        }
    }

    pub fn produces_artifact(&self) -> bool {
        self.agent_type == "artifact_generator"
    }
}

/// One generated document. Immutable once created, identified by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_format")]
    pub format: String,
    /// Seconds since UNIX epoch.
    #[serde(default)]
    pub created_at: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_format() -> String {
    "markdown".to_owned()
}

/// Critic scores, each on the planner's 0..10 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticScores {
    #[serde(default)]
    pub feasibility: f64,
    #[serde(default)]
    pub risk_coverage: f64,
    #[serde(default)]
    pub timeline_realism: f64,
}

/// Final structured plan. Opaque beyond its shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub situation_analysis: String,
    #[serde(default)]
    pub subgoals: Vec<Value>,
    #[serde(default)]
    pub immediate_actions: Vec<Value>,
    #[serde(default)]
    pub roadmap: Vec<Value>,
    #[serde(default)]
    pub key_resources: Vec<Value>,
    #[serde(default)]
    pub risk_mitigation: Vec<Value>,
    #[serde(default)]
    pub success_metrics: Vec<Value>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub tool_insights: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentProfile>,
}

impl Plan {
    /// Structural presence check: the synthesis sections a renderer needs.
    pub fn is_complete(&self) -> bool {
        !self.executive_summary.trim().is_empty()
            && !self.immediate_actions.is_empty()
            && !self.roadmap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_event_decodes() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"type":"session","session_id":"abc"}"#).unwrap();
        assert_eq!(
            event,
            AgentEvent::Session {
                session_id: SessionId::from_string("abc")
            }
        );
    }

    #[test]
    fn done_has_no_payload() {
        let json = serde_json::to_string(&AgentEvent::Done).unwrap();
        assert_eq!(json, r#"{"type":"done"}"#);
        assert!(AgentEvent::Done.is_terminal());
    }

    #[test]
    fn unknown_type_is_a_decode_error() {
        let result = serde_json::from_str::<AgentEvent>(r#"{"type":"telemetry","x":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn subtask_events_accept_upstream_extras() {
        let start: AgentEvent = serde_json::from_value(json!({
            "type": "subtask_start",
            "subtask_id": 2,
            "description": "Analyse resume",
        }))
        .unwrap();
        assert!(matches!(start, AgentEvent::SubtaskStart { subtask_id: 2, .. }));

        let complete: AgentEvent = serde_json::from_value(json!({
            "type": "subtask_complete",
            "subtask_id": 2,
            "artifact_type": null,
        }))
        .unwrap();
        assert!(matches!(
            complete,
            AgentEvent::SubtaskComplete {
                subtask_id: 2,
                artifact_type: None
            }
        ));
    }

    #[test]
    fn plan_decomposed_defaults_status_to_pending() {
        let event: AgentEvent = serde_json::from_value(json!({
            "type": "plan_decomposed",
            "subtasks": [
                {"id": 1, "description": "Find grants", "agent_type": "grant_finder"},
                {"id": 2, "description": "Draft letter", "agent_type": "artifact_generator",
                 "input_data": {}, "expected_artifact_type": "complaint_letter"}
            ]
        }))
        .unwrap();
        let AgentEvent::PlanDecomposed { subtasks } = event else {
            panic!("expected plan_decomposed");
        };
        assert_eq!(subtasks.len(), 2);
        assert!(subtasks.iter().all(|s| s.status == SubtaskStatus::Pending));
        assert!(subtasks[1].produces_artifact());
    }

    #[test]
    fn critic_event_with_partial_scores() {
        let event: AgentEvent = serde_json::from_value(json!({
            "type": "critic",
            "content": "solid",
            "scores": {"feasibility": 8},
            "passed": false,
            "verdict": "REVISE",
        }))
        .unwrap();
        let AgentEvent::Critic { scores, passed, .. } = event else {
            panic!("expected critic");
        };
        assert_eq!(scores.feasibility, 8.0);
        assert_eq!(scores.risk_coverage, 0.0);
        assert!(!passed);
    }

    #[test]
    fn result_event_embeds_artifacts() {
        let event: AgentEvent = serde_json::from_value(json!({
            "type": "result",
            "plan": {
                "goal": "get a job",
                "domain": "career",
                "executive_summary": "summary",
                "immediate_actions": [{"action": "update resume"}],
                "roadmap": [{"phase": "week 1"}],
                "artifacts": [{
                    "id": "a1", "type": "resume_draft", "title": "Resume",
                    "domain": "career", "content": "# Resume", "format": "markdown",
                    "created_at": 1700000000.5, "metadata": {}
                }],
                "tool_insights": {}
            }
        }))
        .unwrap();
        let AgentEvent::Result { plan } = event else {
            panic!("expected result");
        };
        assert!(plan.is_complete());
        assert_eq!(plan.artifacts[0].id.as_str(), "a1");
        assert_eq!(plan.artifacts[0].kind, "resume_draft");
        assert_eq!(plan.artifacts[0].created_at, 1_700_000_000.5);
    }

    #[test]
    fn phase_index_follows_canonical_order() {
        assert_eq!(EventType::Session.phase_index(), Some(0));
        assert_eq!(EventType::Thinking.phase_index(), Some(3));
        assert_eq!(EventType::Result.phase_index(), Some(8));
        assert_eq!(EventType::SubtaskStart.phase_index(), None);
        assert_eq!(EventType::Done.phase_index(), None);
    }

    #[test]
    fn status_rank_is_monotonic() {
        assert!(SubtaskStatus::Pending.rank() < SubtaskStatus::Active.rank());
        assert!(SubtaskStatus::Active.rank() < SubtaskStatus::Complete.rank());
        assert!(SubtaskStatus::Failed.is_finished());
    }
}
