//! Stateful ride-risk session on top of a stateless scorer.
//!
//! ```text
//! assessing --assess--> monitoring --close--> closed
//!                        |      ^
//!                        +------+ reassess
//! ```
//!
//! `start_new` returns to `assessing` from any mode. Every method takes
//! `&mut self`, so scoring calls against one monitor never overlap.

use std::collections::BTreeSet;
use std::fmt;

use oracle_protocol::{AssessRequest, AssessResponse, BehaviourFlag, RideForm, RiskLevel};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{RiskError, RiskResult};
use crate::scorer::RiskScorer;
use crate::updates::{SituationUpdate, UpdateEffect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMode {
    Assessing,
    Monitoring,
    Closed,
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assessing => "assessing",
            Self::Monitoring => "monitoring",
            Self::Closed => "closed",
        })
    }
}

/// One recorded measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub score: u32,
    pub level: RiskLevel,
}

impl From<&AssessResponse> for RiskSnapshot {
    fn from(response: &AssessResponse) -> Self {
        Self {
            score: response.risk.score,
            level: response.risk.level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub initial_score: u32,
    pub initial_level: RiskLevel,
    pub peak_score: u32,
    pub peak_level: RiskLevel,
    pub final_score: u32,
    pub final_level: RiskLevel,
    pub reassess_count: u32,
}

impl SessionSummary {
    /// `None` for an empty history. Ties for the peak go to the latest entry.
    pub fn from_history(history: &[RiskSnapshot], reassess_count: u32) -> Option<Self> {
        let initial = history.first()?;
        let last = history.last()?;
        let peak = history
            .iter()
            .fold(initial, |best, candidate| {
                if candidate.score >= best.score {
                    candidate
                } else {
                    best
                }
            });
        Some(Self {
            initial_score: initial.score,
            initial_level: initial.level,
            peak_score: peak.score,
            peak_level: peak.level,
            final_score: last.score,
            final_level: last.level,
            reassess_count,
        })
    }
}

/// Result of a reassessment. A failed call is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassessOutcome {
    Updated { delta: i64 },
    /// The scorer failed; the previous assessment stays on display.
    Retained { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    form: RideForm,
    flags: BTreeSet<BehaviourFlag>,
    updates: Vec<SituationUpdate>,
}

pub struct RiskMonitor<S> {
    scorer: S,
    mode: MonitorMode,
    form: RideForm,
    flags: BTreeSet<BehaviourFlag>,
    draft: Option<Draft>,
    current: Option<AssessResponse>,
    history: Vec<RiskSnapshot>,
    reassess_count: u32,
    consecutive_reassess_failures: u32,
    summary: Option<SessionSummary>,
}

impl<S: RiskScorer> RiskMonitor<S> {
    pub fn new(scorer: S) -> Self {
        Self {
            scorer,
            mode: MonitorMode::Assessing,
            form: RideForm::default(),
            flags: BTreeSet::new(),
            draft: None,
            current: None,
            history: Vec::new(),
            reassess_count: 0,
            consecutive_reassess_failures: 0,
            summary: None,
        }
    }

    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    /// Committed form: what the displayed assessment was scored against.
    pub fn form(&self) -> &RideForm {
        &self.form
    }

    pub fn flags(&self) -> &BTreeSet<BehaviourFlag> {
        &self.flags
    }

    pub fn current(&self) -> Option<&AssessResponse> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[RiskSnapshot] {
        &self.history
    }

    pub fn reassess_count(&self) -> u32 {
        self.reassess_count
    }

    /// Reassessments that failed in a row since the last success.
    pub fn consecutive_reassess_failures(&self) -> u32 {
        self.consecutive_reassess_failures
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn pending_updates(&self) -> &[SituationUpdate] {
        self.draft
            .as_ref()
            .map(|draft| draft.updates.as_slice())
            .unwrap_or_default()
    }

    /// Change between the last two snapshots.
    pub fn score_delta(&self) -> Option<i64> {
        match self.history.as_slice() {
            [.., previous, latest] => Some(i64::from(latest.score) - i64::from(previous.score)),
            _ => None,
        }
    }

    fn require(&self, expected: MonitorMode, operation: &'static str) -> RiskResult<()> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(RiskError::InvalidTransition {
                operation,
                mode: self.mode,
            })
        }
    }

    /// First score for a ride. Moves to `monitoring` on success.
    #[instrument(skip(self, form, flags), fields(area = %form.area_type, time = %form.time_of_day))]
    pub async fn assess(
        &mut self,
        form: RideForm,
        flags: impl IntoIterator<Item = BehaviourFlag>,
    ) -> RiskResult<&AssessResponse> {
        self.require(MonitorMode::Assessing, "assess")?;
        self.form = form;
        self.flags = flags.into_iter().collect();

        let request = AssessRequest::new(self.form.clone(), self.flags.iter().copied());
        let response = self.scorer.score(&request).await?;

        let snapshot = RiskSnapshot::from(&response);
        info!(score = snapshot.score, level = %snapshot.level, "ride assessed");
        self.history = vec![snapshot];
        self.mode = MonitorMode::Monitoring;
        Ok(&*self.current.insert(response))
    }

    /// Stage de-escalation updates for the next reassessment.
    ///
    /// Replaces any previously staged set; the committed baseline does not
    /// change until a reassessment succeeds.
    pub fn apply_updates(&mut self, updates: &[SituationUpdate]) -> RiskResult<AssessRequest> {
        self.require(MonitorMode::Monitoring, "apply updates")?;
        let effect = UpdateEffect::compose(updates);
        let mut form = self.form.clone();
        let mut flags = self.flags.clone();
        effect.apply(&mut flags, &mut form.area_type);

        let request = AssessRequest::new(form.clone(), flags.iter().copied());
        self.draft = Some(Draft {
            form,
            flags,
            updates: updates.to_vec(),
        });
        Ok(request)
    }

    /// The request a reassessment would send now.
    pub fn pending_request(&self) -> AssessRequest {
        match &self.draft {
            Some(draft) => AssessRequest::new(draft.form.clone(), draft.flags.iter().copied()),
            None => AssessRequest::new(self.form.clone(), self.flags.iter().copied()),
        }
    }

    #[instrument(skip(self), fields(reassess_count = self.reassess_count))]
    pub async fn reassess(&mut self) -> RiskResult<ReassessOutcome> {
        self.require(MonitorMode::Monitoring, "reassess")?;
        let request = self.pending_request();

        let response = match self.scorer.score(&request).await {
            Ok(response) => response,
            Err(error) => {
                self.consecutive_reassess_failures += 1;
                warn!(
                    %error,
                    consecutive_failures = self.consecutive_reassess_failures,
                    "reassessment failed; keeping last assessment"
                );
                return Ok(ReassessOutcome::Retained {
                    reason: error.to_string(),
                });
            }
        };

        if let Some(draft) = self.draft.take() {
            self.form = draft.form;
            self.flags = draft.flags;
        }
        self.history.push(RiskSnapshot::from(&response));
        self.current = Some(response);
        self.reassess_count += 1;
        self.consecutive_reassess_failures = 0;

        let delta = self.score_delta().unwrap_or_default();
        info!(delta, reassess_count = self.reassess_count, "ride reassessed");
        Ok(ReassessOutcome::Updated { delta })
    }

    /// Freeze the session and summarize its history.
    pub fn close(&mut self) -> RiskResult<SessionSummary> {
        self.require(MonitorMode::Monitoring, "close")?;
        let summary = SessionSummary::from_history(&self.history, self.reassess_count).ok_or(
            RiskError::InvalidTransition {
                operation: "close",
                mode: self.mode,
            },
        )?;
        self.draft = None;
        self.mode = MonitorMode::Closed;
        info!(
            initial = summary.initial_score,
            peak = summary.peak_score,
            last = summary.final_score,
            "risk session closed"
        );
        Ok(*self.summary.insert(summary))
    }

    /// Discard everything and return to `assessing`.
    pub fn start_new(&mut self) {
        self.mode = MonitorMode::Assessing;
        self.form = RideForm::default();
        self.flags.clear();
        self.draft = None;
        self.current = None;
        self.history.clear();
        self.reassess_count = 0;
        self.consecutive_reassess_failures = 0;
        self.summary = None;
    }
}
