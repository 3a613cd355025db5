//! Single-flight plan session.
//!
//! At most one stream feeds the state at a time. Starting a new goal cancels
//! the previous stream, and any event the old stream still delivers is
//! discarded by a generation check before it reaches the reducer.

use std::sync::Arc;

use oracle_protocol::{AgentEvent, RunRequest, SessionId};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{PlanClient, StreamObserver};
use crate::error::ClientResult;
use crate::handle::StreamHandle;
use crate::reducer::{PlanAction, PlanState, reduce};

#[derive(Debug, Default)]
struct Control {
    generation: u64,
    last_session_id: Option<SessionId>,
}

#[derive(Debug)]
struct Shared {
    control: Mutex<Control>,
    state: watch::Sender<PlanState>,
}

impl Shared {
    /// Apply `action` if `generation` is still the active one.
    fn apply(&self, generation: u64, action: PlanAction) -> bool {
        let mut control = self.control.lock();
        if control.generation != generation {
            return false;
        }
        if let PlanAction::Event(AgentEvent::Session { session_id }) = &action {
            control.last_session_id = Some(session_id.clone());
        }
        // held across the send so a concurrent start() cannot interleave
        self.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = reduce(current, action);
        });
        true
    }
}

struct SessionObserver {
    shared: Arc<Shared>,
    generation: u64,
}

impl SessionObserver {
    fn apply(&self, action: PlanAction) {
        if !self.shared.apply(self.generation, action) {
            debug!(generation = self.generation, "discarding action from superseded stream");
        }
    }
}

impl StreamObserver for SessionObserver {
    fn on_event(&mut self, event: AgentEvent) {
        self.apply(PlanAction::Event(event));
    }

    fn on_done(&mut self) {
        self.apply(PlanAction::Done);
    }

    fn on_error(&mut self, message: String) {
        warn!(%message, "plan stream failed");
        self.apply(PlanAction::Failed(message));
    }
}

/// Drives one [`PlanState`] from successive goal submissions.
pub struct PlanSession {
    client: PlanClient,
    shared: Arc<Shared>,
    active: Option<StreamHandle>,
}

impl PlanSession {
    pub fn new(client: PlanClient) -> Self {
        let (state, _) = watch::channel(PlanState::idle());
        Self {
            client,
            shared: Arc::new(Shared {
                control: Mutex::new(Control::default()),
                state,
            }),
            active: None,
        }
    }

    /// Submit a goal, replacing whatever is in flight.
    ///
    /// A request without a session id continues the last session the
    /// gateway announced. On validation failure nothing changes.
    pub fn start(&mut self, request: RunRequest) -> ClientResult<()> {
        request.validate()?;

        if let Some(previous) = self.active.take() {
            previous.cancel();
        }

        let (generation, request) = {
            let mut control = self.shared.control.lock();
            control.generation += 1;
            let request = match (&request.session_id, &control.last_session_id) {
                (None, Some(last)) => request.with_session(last.clone()),
                _ => request,
            };
            self.shared.state.send_replace(PlanState::new());
            (control.generation, request)
        };

        info!(generation, domain = %request.domain, "starting plan stream");
        let observer = SessionObserver {
            shared: Arc::clone(&self.shared),
            generation,
        };
        match self.client.open(&request, observer) {
            Ok(handle) => {
                self.active = Some(handle);
                Ok(())
            }
            Err(error) => {
                self.shared
                    .apply(generation, PlanAction::Failed(error.to_string()));
                Err(error)
            }
        }
    }

    /// Stop the active stream. The state keeps everything received so far.
    pub fn cancel(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };
        handle.cancel();
        let mut control = self.shared.control.lock();
        control.generation += 1;
        self.shared.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = reduce(current, PlanAction::Cancelled);
        });
        debug!(generation = control.generation, "plan stream cancelled");
    }

    pub fn snapshot(&self) -> PlanState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlanState> {
        self.shared.state.subscribe()
    }

    pub fn last_session_id(&self) -> Option<SessionId> {
        self.shared.control.lock().last_session_id.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.state.borrow().is_streaming
    }

    /// Wait for the active stream to end on its own.
    pub async fn finished(&mut self) -> PlanState {
        if let Some(handle) = self.active.take() {
            handle.join().await;
        }
        self.snapshot()
    }
}

impl Drop for PlanSession {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
        }
    }
}
