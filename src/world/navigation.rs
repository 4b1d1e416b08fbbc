//! Navigation sessions
//!
//! Wraps the external pathfinder in a small state machine:
//!
//! ```text
//! planning ──path_update──▶ moving ──goal_reached──▶ arrived
//!     │                     │  ▲
//!     │                   stuck│path_update
//!     ▼                     ▼  │
//!   failed ◀──timeout / no_path── stuck
//! ```
//!
//! `canceled` is reachable from any non-terminal state, either by an
//! explicit [`Navigator::cancel`] or a `goal_reset` event. A wall-clock
//! deadline forces `failed` if the session has not ended in time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Goal, PathEvent, World};

/// Rough walking speed used for ETA estimates, blocks per second
const WALK_SPEED: f64 = 4.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavState {
    Planning,
    Moving,
    Arrived,
    Stuck,
    Failed,
    Canceled,
}

impl NavState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NavState::Arrived | NavState::Failed | NavState::Canceled)
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavStatus {
    pub id: String,
    pub state: NavState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_remaining: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_ms: Option<u64>,
    pub elapsed_ms: u64,
    pub updates: u32,
    pub replan_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NavStatus {
    fn unknown(id: &str, state: NavState) -> Self {
        NavStatus {
            id: id.to_string(),
            state,
            goal: None,
            distance_remaining: None,
            eta_ms: None,
            elapsed_ms: 0,
            updates: 0,
            replan_count: 0,
            reason: Some("unknown_session".to_string()),
        }
    }
}

struct Session {
    goal: Goal,
    state: NavState,
    started: Instant,
    ended: Option<Instant>,
    updates: u32,
    replan_count: u32,
    reason: Option<String>,
    state_tx: watch::Sender<NavState>,
}

/// Navigation session table for one actor
#[derive(Clone)]
pub struct Navigator {
    world: Arc<dyn World>,
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    default_timeout: Duration,
}

impl Navigator {
    pub fn new(world: Arc<dyn World>, default_timeout: Duration) -> Self {
        Self {
            world,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Begin a session toward `goal`. Any session still in flight is
    /// canceled, since the pathfinder pursues one goal at a time.
    pub fn start(&self, goal: Goal, timeout: Option<Duration>) -> NavStatus {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let id = format!("nav_{}", Uuid::new_v4().simple());

        let active: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, s)| !s.state.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        for previous in active {
            self.transition(&previous, NavState::Canceled, Some("superseded"));
        }

        let (state_tx, _) = watch::channel(NavState::Planning);
        self.lock().insert(
            id.clone(),
            Session {
                goal,
                state: NavState::Planning,
                started: Instant::now(),
                ended: None,
                updates: 0,
                replan_count: 0,
                reason: None,
                state_tx,
            },
        );

        info!(nav_id = %id, goal = %goal.target, tolerance = goal.tolerance, "Navigation started");
        let events = self.world.set_goal(goal);
        tokio::spawn(self.clone().drive(id.clone(), events, timeout));

        self.status(&id)
    }

    /// Current status. An unknown id reports `failed`.
    pub fn status(&self, id: &str) -> NavStatus {
        let sessions = self.lock();
        let Some(session) = sessions.get(id) else {
            return NavStatus::unknown(id, NavState::Failed);
        };

        let elapsed = session
            .ended
            .unwrap_or_else(Instant::now)
            .duration_since(session.started);
        let distance = if session.state == NavState::Arrived {
            0.0
        } else {
            let raw = self.world.position().distance_to(session.goal.target);
            (raw - f64::from(session.goal.tolerance)).max(0.0)
        };
        let eta_ms = (!session.state.is_terminal()).then(|| (distance / WALK_SPEED * 1000.0) as u64);

        NavStatus {
            id: id.to_string(),
            state: session.state,
            goal: Some(session.goal),
            distance_remaining: Some(distance),
            eta_ms,
            elapsed_ms: elapsed.as_millis() as u64,
            updates: session.updates,
            replan_count: session.replan_count,
            reason: session.reason.clone(),
        }
    }

    /// Cancel a session. An unknown id reports `canceled`.
    pub fn cancel(&self, id: &str) -> NavStatus {
        if !self.lock().contains_key(id) {
            return NavStatus::unknown(id, NavState::Canceled);
        }
        if self.transition(id, NavState::Canceled, Some("canceled")) {
            self.world.clear_goal();
        }
        self.status(id)
    }

    /// Resolve once the session reaches a terminal state
    pub async fn wait(&self, id: &str) -> NavStatus {
        let rx = self.lock().get(id).map(|s| s.state_tx.subscribe());
        if let Some(mut rx) = rx {
            // Err only if the session was dropped, which status() reports
            let _ = rx.wait_for(|state| state.is_terminal()).await;
        }
        self.status(id)
    }

    /// Start a session, wait for it to end, then forget it
    pub async fn goto(&self, goal: Goal, timeout: Option<Duration>) -> NavStatus {
        let started = self.start(goal, timeout);
        let status = self.wait(&started.id).await;
        self.lock().remove(&started.id);
        status
    }

    /// Number of sessions currently tracked, finished or not
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop finished sessions, returning how many were removed
    pub fn prune_finished(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.state.is_terminal());
        before - sessions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move a live session to `state`. Terminal states are never left.
    fn transition(&self, id: &str, state: NavState, reason: Option<&str>) -> bool {
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(id) else {
            return false;
        };
        if session.state.is_terminal() {
            return false;
        }

        debug!(nav_id = %id, from = ?session.state, to = ?state, "Navigation transition");
        session.state = state;
        if let Some(reason) = reason {
            session.reason = Some(reason.to_string());
        }
        if state.is_terminal() {
            session.ended = Some(Instant::now());
        }
        session.state_tx.send_replace(state);
        true
    }

    fn record_update(&self, id: &str) {
        let moving = {
            let mut sessions = self.lock();
            match sessions.get_mut(id) {
                Some(session) if !session.state.is_terminal() => {
                    if session.updates > 0 {
                        session.replan_count += 1;
                    }
                    session.updates += 1;
                    session.state != NavState::Moving
                }
                _ => false,
            }
        };
        if moving {
            self.transition(id, NavState::Moving, None);
        }
    }

    async fn drive(self, id: String, mut events: mpsc::UnboundedReceiver<PathEvent>, timeout: Duration) {
        let mut state_rx = match self.lock().get(&id) {
            Some(session) => session.state_tx.subscribe(),
            None => return,
        };
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(PathEvent::PathUpdate) => self.record_update(&id),
                    Some(PathEvent::Stuck) => {
                        self.transition(&id, NavState::Stuck, Some("stuck"));
                    }
                    Some(PathEvent::GoalReached) => {
                        self.transition(&id, NavState::Arrived, None);
                    }
                    Some(PathEvent::GoalReset) => {
                        self.transition(&id, NavState::Canceled, Some("goal_reset"));
                    }
                    Some(PathEvent::NoPath) => {
                        if self.transition(&id, NavState::Failed, Some("no_path")) {
                            self.world.clear_goal();
                        }
                    }
                    None => {
                        self.transition(&id, NavState::Failed, Some("pathfinder_closed"));
                    }
                },
                _ = &mut deadline => {
                    if self.transition(&id, NavState::Failed, Some("timeout")) {
                        warn!(nav_id = %id, timeout_ms = timeout.as_millis() as u64, "Navigation timed out");
                        self.world.clear_goal();
                    }
                }
                _ = state_rx.changed() => {}
            }

            if self.status(&id).state.is_terminal() {
                break;
            }
        }

        debug!(nav_id = %id, "Navigation driver finished");
    }
}
