//! # oracle-client
//!
//! Consumer side of the plan stream. [`PlanClient`] turns a goal into a
//! decoded event stream, framed by [`sse`]. [`reducer`] folds events into
//! [`PlanState`] and [`PlanSession`] keeps exactly one stream live at a time.

pub mod client;
pub mod error;
pub mod handle;
pub mod reducer;
pub mod session;
pub mod sse;

pub use client::{
    ArtifactDownload, ClientConfig, EventStream, PlanClient, StreamObserver, StreamSignal,
};
pub use error::{ClientError, ClientResult};
pub use handle::StreamHandle;
pub use reducer::{CriticResult, PlanAction, PlanState, fold, reduce};
pub use session::PlanSession;
pub use sse::{AgentEventStream, parse_agent_stream};
