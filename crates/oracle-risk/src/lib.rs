//! # oracle-risk
//!
//! Ride-risk monitoring. A [`RiskScorer`] answers one stateless scoring call;
//! [`RiskMonitor`] layers the assess / monitor / reassess / close lifecycle,
//! snapshot history and summaries on top of it.
//!
//! - [`scorer`]: the scoring port and its HTTP implementation
//! - [`rules`]: deterministic weighted scorer
//! - [`advice`]: level-keyed safety advice
//! - [`updates`]: named de-escalation updates
//! - [`monitor`]: the session state machine

pub mod advice;
pub mod error;
pub mod monitor;
pub mod rules;
pub mod scorer;
pub mod updates;

pub use error::{RiskError, RiskResult, ScoreError};
pub use monitor::{MonitorMode, ReassessOutcome, RiskMonitor, RiskSnapshot, SessionSummary};
pub use rules::RuleBasedScorer;
pub use scorer::{HttpRiskScorer, RiskScorer};
pub use updates::{SituationUpdate, UpdateEffect};
