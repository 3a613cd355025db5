//! # oracle-protocol: plan stream wire contracts
//!
//! Shared types for everything that crosses a process boundary: the agent
//! event taxonomy, the stream frame format, plan/artifact payloads and
//! the ride-risk scoring contract.
//!
//! No tokio, axum or reqwest here: the gateway, the client library and the
//! risk monitor all depend on this crate.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (SessionId, ArtifactId)
//! - [`event`]: AgentEvent sum type, SubTask, Artifact, Plan
//! - [`frame`]: Frame encoding and payload decoding
//! - [`request`]: Run/artifact request and response bodies
//! - [`risk`]: Ride form, scoring request/response
//! - [`error`]: ProtocolError (validation)

pub mod error;
pub mod event;
pub mod frame;
pub mod ids;
pub mod request;
pub mod risk;

pub use error::{ProtocolError, ProtocolResult};
pub use event::{
    AgentEvent, Artifact, CriticScores, EventType, IntentProfile, Plan, SubTask, SubtaskStatus,
};
pub use frame::{decode_data, encode_frame, error_frame};
pub use ids::{ArtifactId, SessionId, SubtaskId};
pub use request::{ArtifactDownloadRequest, ArtifactListing, RunRequest, RunResponse};
pub use risk::{
    AreaType, AssessRequest, AssessResponse, BehaviourFlag, EscalationStep, Helpline, RideForm,
    RiskAssessment, RiskLevel, SafeExitStrategy, SafetyAdvice, SafetyCard, TimeOfDay,
};

/// Endpoint paths shared by the gateway and its clients.
pub mod paths {
    pub const STREAM: &str = "/api/stream";
    pub const RUN: &str = "/api/run";
    pub const ASSESS: &str = "/api/cab-safety/assess";
    pub const ARTIFACTS: &str = "/api/artifacts";
    pub const DOWNLOAD_ARTIFACT: &str = "/api/download-artifact";
    pub const HEALTH: &str = "/healthz";
}
