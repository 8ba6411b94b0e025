//! Listening state machine: Idle ⇄ Listening → AwaitingConsent → Listening.
//! `AwaitingConsent` is exclusive: entering it is a check-and-set so at most one
//! consent flow runs at a time.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

/// Process-wide listening mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ListeningState {
    Idle,
    Listening,
    AwaitingConsent,
}

impl std::fmt::Display for ListeningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListeningState::Idle => write!(f, "Idle"),
            ListeningState::Listening => write!(f, "Listening"),
            ListeningState::AwaitingConsent => write!(f, "AwaitingConsent"),
        }
    }
}

impl ListeningState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: ListeningState) -> bool {
        matches!(
            (self, next),
            (ListeningState::Idle, ListeningState::Listening)
                | (ListeningState::Listening, ListeningState::Idle)
                | (ListeningState::Listening, ListeningState::AwaitingConsent)
                // a keyword polled just before stop can still start a consent flow
                | (ListeningState::Idle, ListeningState::AwaitingConsent)
                | (ListeningState::AwaitingConsent, ListeningState::Listening)
        )
    }
}

/// Progress of the consent-gated screen-analysis flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConsentPhase {
    Prompting,
    AwaitingDecision,
    Capturing,
    Analyzing,
    Responding,
    Declined,
}

impl std::fmt::Display for ConsentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsentPhase::Prompting => write!(f, "Prompting"),
            ConsentPhase::AwaitingDecision => write!(f, "AwaitingDecision"),
            ConsentPhase::Capturing => write!(f, "Capturing"),
            ConsentPhase::Analyzing => write!(f, "Analyzing"),
            ConsentPhase::Responding => write!(f, "Responding"),
            ConsentPhase::Declined => write!(f, "Declined"),
        }
    }
}

/// Thread-safe state holder with a watch channel for reactive subscribers.
pub struct StateMachine {
    state: RwLock<ListeningState>,
    state_tx: watch::Sender<ListeningState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ListeningState::Idle);
        Self {
            state: RwLock::new(ListeningState::Idle),
            state_tx,
        }
    }

    /// Current state (non-blocking read).
    pub fn current(&self) -> ListeningState {
        *self.state.read()
    }

    /// Attempt a state transition. Returns Ok(new_state) or Err with reason.
    pub fn transition(&self, next: ListeningState) -> Result<ListeningState, String> {
        let mut state = self.state.write();
        let current = *state;
        if !current.can_transition_to(next) {
            let msg = format!("invalid transition: {current} -> {next}");
            warn!("{}", msg);
            return Err(msg);
        }
        *state = next;
        self.state_tx.send_replace(next);
        info!(from = %current, to = %next, "state_transition");
        Ok(next)
    }

    /// Enter `AwaitingConsent` unless a consent flow already holds it.
    /// Returns false when the caller must not start a consent flow.
    pub fn try_enter_consent(&self) -> bool {
        let mut state = self.state.write();
        let current = *state;
        if current == ListeningState::AwaitingConsent {
            return false;
        }
        *state = ListeningState::AwaitingConsent;
        self.state_tx.send_replace(ListeningState::AwaitingConsent);
        info!(from = %current, "consent_entered");
        true
    }

    /// Leave `Listening` for `Idle`. Any other state is kept; returns whether
    /// the state changed.
    pub fn try_enter_idle(&self) -> bool {
        let mut state = self.state.write();
        if *state != ListeningState::Listening {
            return false;
        }
        *state = ListeningState::Idle;
        self.state_tx.send_replace(ListeningState::Idle);
        info!(from = %ListeningState::Listening, to = %ListeningState::Idle, "state_transition");
        true
    }

    /// Force `Listening` from any state (consent finalization).
    pub fn force_listening(&self) {
        let mut state = self.state.write();
        let prev = *state;
        *state = ListeningState::Listening;
        self.state_tx.send_replace(ListeningState::Listening);
        info!(from = %prev, "force_listening");
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ListeningState> {
        self.state_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(ListeningState::Idle.can_transition_to(ListeningState::Listening));
        assert!(ListeningState::Listening.can_transition_to(ListeningState::AwaitingConsent));
        assert!(ListeningState::AwaitingConsent.can_transition_to(ListeningState::Listening));
        assert!(!ListeningState::AwaitingConsent.can_transition_to(ListeningState::AwaitingConsent));
        assert!(!ListeningState::Idle.can_transition_to(ListeningState::Idle));
        assert!(!ListeningState::AwaitingConsent.can_transition_to(ListeningState::Idle));
    }

    #[test]
    fn transition_rejects_invalid() {
        let sm = StateMachine::new();
        let err = sm.transition(ListeningState::Idle).unwrap_err();
        assert!(err.contains("Idle -> Idle"));
        assert_eq!(sm.current(), ListeningState::Idle);
    }

    #[test]
    fn consent_is_exclusive() {
        let sm = StateMachine::new();
        sm.transition(ListeningState::Listening).unwrap();
        assert!(sm.try_enter_consent());
        assert!(!sm.try_enter_consent());
        assert_eq!(sm.current(), ListeningState::AwaitingConsent);
        sm.force_listening();
        assert_eq!(sm.current(), ListeningState::Listening);
        assert!(sm.try_enter_consent());
    }

    #[test]
    fn idle_only_from_listening() {
        let sm = StateMachine::new();
        assert!(!sm.try_enter_idle());
        sm.transition(ListeningState::Listening).unwrap();
        assert!(sm.try_enter_idle());
        assert_eq!(sm.current(), ListeningState::Idle);

        assert!(sm.try_enter_consent());
        assert!(!sm.try_enter_idle());
        assert_eq!(sm.current(), ListeningState::AwaitingConsent);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let sm = StateMachine::new();
        let mut rx = sm.subscribe();
        sm.transition(ListeningState::Listening).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ListeningState::Listening);
    }
}
