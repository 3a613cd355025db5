//! Pure fold of the plan event stream into UI-facing state.
//!
//! [`reduce`] never performs I/O and never fails: references to unknown
//! subtask ids are no-ops, artifacts are de-duplicated by id, and subtask
//! status only moves forward.

use oracle_protocol::{
    AgentEvent, Artifact, CriticScores, EventType, IntentProfile, Plan, SessionId, SubTask,
    SubtaskId, SubtaskStatus,
};
use serde::Serialize;

/// Input to the reducer: a decoded event or a transport-level outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanAction {
    Event(AgentEvent),
    /// Terminal marker observed, or the transport closed cleanly.
    Done,
    /// Transport failure; carries the message shown to the user.
    Failed(String),
    /// The caller cancelled the stream. Not an error.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticResult {
    pub content: String,
    pub scores: CriticScores,
    pub passed: bool,
    pub verdict: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanState {
    pub session_id: Option<SessionId>,
    /// Append-only progress trace.
    pub events: Vec<AgentEvent>,
    pub plan: Option<Plan>,
    pub intent_profile: Option<IntentProfile>,
    pub subtasks: Vec<SubTask>,
    pub artifacts: Vec<Artifact>,
    pub critic_result: Option<CriticResult>,
    pub is_streaming: bool,
    pub error: Option<String>,
}

impl Default for PlanState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanState {
    /// State at the start of a stream.
    pub fn new() -> Self {
        Self {
            session_id: None,
            events: Vec::new(),
            plan: None,
            intent_profile: None,
            subtasks: Vec::new(),
            artifacts: Vec::new(),
            critic_result: None,
            is_streaming: true,
            error: None,
        }
    }

    /// State before any goal has been submitted.
    pub fn idle() -> Self {
        Self {
            is_streaming: false,
            ..Self::new()
        }
    }

    pub fn subtask(&self, id: SubtaskId) -> Option<&SubTask> {
        self.subtasks.iter().find(|subtask| subtask.id == id)
    }

    /// Furthest canonical phase seen in the event log.
    pub fn furthest_phase(&self) -> Option<EventType> {
        self.events
            .iter()
            .filter_map(|event| event.event_type().phase_index())
            .max()
            .map(|index| EventType::PHASES[index])
    }

    /// Fraction of the canonical phase sequence reached, in `0.0..=1.0`.
    ///
    /// A received plan counts as complete even if intermediate phases were
    /// never observed.
    pub fn progress(&self) -> f64 {
        if self.plan.is_some() {
            return 1.0;
        }
        let denominator = (EventType::PHASES.len() - 1) as f64;
        self.furthest_phase()
            .and_then(EventType::phase_index)
            .map_or(0.0, |index| index as f64 / denominator)
    }

    pub fn progress_percent(&self) -> u8 {
        (self.progress() * 100.0).round() as u8
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks
            .iter()
            .filter(|subtask| subtask.status == SubtaskStatus::Complete)
            .count()
    }
}

/// Fold one action into the state.
pub fn reduce(mut state: PlanState, action: PlanAction) -> PlanState {
    match action {
        PlanAction::Event(event) => apply_event(&mut state, event),
        PlanAction::Done => state.is_streaming = false,
        PlanAction::Failed(message) => {
            state.error = Some(message);
            state.is_streaming = false;
        }
        PlanAction::Cancelled => state.is_streaming = false,
    }
    state
}

/// Fold a whole sequence from the initial state.
pub fn fold<I>(actions: I) -> PlanState
where
    I: IntoIterator<Item = PlanAction>,
{
    actions.into_iter().fold(PlanState::new(), reduce)
}

fn apply_event(state: &mut PlanState, event: AgentEvent) {
    match event {
        AgentEvent::Session { ref session_id } => {
            state.session_id = Some(session_id.clone());
            state.events.push(event);
        }
        AgentEvent::IntentAnalyzed { ref intent } => {
            state.intent_profile = Some(intent.clone());
            state.events.push(event);
        }
        AgentEvent::PlanDecomposed { ref subtasks } => {
            state.subtasks = merge_subtasks(&state.subtasks, subtasks);
            state.events.push(event);
        }
        AgentEvent::SubtaskStart { subtask_id, .. } => {
            advance_subtask(&mut state.subtasks, subtask_id, SubtaskStatus::Active);
        }
        AgentEvent::SubtaskComplete { subtask_id, .. } => {
            advance_subtask(&mut state.subtasks, subtask_id, SubtaskStatus::Complete);
        }
        AgentEvent::ArtifactReady { ref artifact } => {
            if !state.artifacts.iter().any(|known| known.id == artifact.id) {
                state.artifacts.push(artifact.clone());
            }
            state.events.push(event);
        }
        AgentEvent::Critic {
            ref content,
            scores,
            passed,
            ref verdict,
        } => {
            state.critic_result = Some(CriticResult {
                content: content.clone(),
                scores,
                passed,
                verdict: verdict.clone(),
            });
            state.events.push(event);
        }
        AgentEvent::Result { plan } => {
            if !plan.artifacts.is_empty() {
                state.artifacts = dedup_artifacts(&plan.artifacts);
            }
            state.plan = Some(*plan);
        }
        AgentEvent::Done => state.is_streaming = false,
        AgentEvent::Thinking { .. }
        | AgentEvent::Acting { .. }
        | AgentEvent::ToolResult { .. }
        | AgentEvent::Error { .. } => state.events.push(event),
    }
}

/// Replace the subtask list, carrying forward progress for ids already known.
fn merge_subtasks(current: &[SubTask], incoming: &[SubTask]) -> Vec<SubTask> {
    incoming
        .iter()
        .map(|subtask| {
            let status = current
                .iter()
                .find(|known| known.id == subtask.id)
                .map_or(SubtaskStatus::Pending, |known| known.status);
            SubTask {
                status,
                ..subtask.clone()
            }
        })
        .collect()
}

fn advance_subtask(subtasks: &mut [SubTask], id: SubtaskId, next: SubtaskStatus) {
    let Some(subtask) = subtasks.iter_mut().find(|subtask| subtask.id == id) else {
        return;
    };
    if next.rank() > subtask.status.rank() {
        subtask.status = next;
    }
}

/// Last copy of each id wins; order follows first appearance.
fn dedup_artifacts(artifacts: &[Artifact]) -> Vec<Artifact> {
    let mut out: Vec<Artifact> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        match out.iter_mut().find(|known| known.id == artifact.id) {
            Some(known) => *known = artifact.clone(),
            None => out.push(artifact.clone()),
        }
    }
    out
}
