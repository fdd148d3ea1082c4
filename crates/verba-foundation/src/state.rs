use crate::error::AppError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Lifecycle of one live tutoring session.
///
/// `Listening` and `Speaking` are the only states in which capture frames are
/// forwarded and inbound segments accepted; everything else discards audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Listening,
    Speaking,
    Closed,
}

impl SessionState {
    /// True while audio flows in either direction.
    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::Listening | SessionState::Speaking)
    }
}

pub struct StateManager {
    state: Arc<RwLock<SessionState>>,
    state_tx: Sender<SessionState>,
    state_rx: Receiver<SessionState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(SessionState::Idle)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: SessionState) -> Result<(), AppError> {
        let mut current = self.state.write();

        // Closed is reachable from any live state (error or explicit stop);
        // the forward path is strictly Idle -> Connecting -> Listening <-> Speaking.
        let valid = matches!(
            (&*current, &new_state),
            (SessionState::Idle, SessionState::Connecting)
                | (SessionState::Connecting, SessionState::Listening)
                | (SessionState::Listening, SessionState::Speaking)
                | (SessionState::Speaking, SessionState::Listening)
                | (SessionState::Idle, SessionState::Closed)
                | (SessionState::Connecting, SessionState::Closed)
                | (SessionState::Listening, SessionState::Closed)
                | (SessionState::Speaking, SessionState::Closed)
        );

        if !valid {
            return Err(AppError::Fatal(format!(
                "Invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("Session state: {:?} -> {:?}", *current, new_state);
        *current = new_state;
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> SessionState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_accepted() {
        let sm = StateManager::new();
        sm.transition(SessionState::Connecting).unwrap();
        sm.transition(SessionState::Listening).unwrap();
        sm.transition(SessionState::Speaking).unwrap();
        sm.transition(SessionState::Listening).unwrap();
        sm.transition(SessionState::Closed).unwrap();
        assert_eq!(sm.current(), SessionState::Closed);
    }

    #[test]
    fn skipping_connecting_is_rejected() {
        let sm = StateManager::new();
        assert!(sm.transition(SessionState::Listening).is_err());
        assert_eq!(sm.current(), SessionState::Idle);
    }

    #[test]
    fn closed_is_terminal() {
        let sm = StateManager::new();
        sm.transition(SessionState::Closed).unwrap();
        assert!(sm.transition(SessionState::Connecting).is_err());
    }

    #[test]
    fn subscribers_observe_transitions() {
        let sm = StateManager::new();
        let rx = sm.subscribe();
        sm.transition(SessionState::Connecting).unwrap();
        sm.transition(SessionState::Closed).unwrap();
        assert_eq!(rx.try_recv().unwrap(), SessionState::Connecting);
        assert_eq!(rx.try_recv().unwrap(), SessionState::Closed);
    }

    #[test]
    fn streaming_predicate() {
        assert!(SessionState::Listening.is_streaming());
        assert!(SessionState::Speaking.is_streaming());
        assert!(!SessionState::Connecting.is_streaming());
        assert!(!SessionState::Closed.is_streaming());
    }
}
