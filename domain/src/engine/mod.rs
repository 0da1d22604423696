//! Script engine lifecycle state machine.
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized ──post_initialize──▶ PostInitialized
//!       │                            │                                  │
//!       └────────────────────────────┴───────────── close ──────────────┴──▶ Closed
//! ```
//!
//! An engine whose configuration section disables it stays `Uninitialized`
//! until it is closed.

use serde::{Deserialize, Serialize};

use crate::core::error::LifecycleError;

/// Lifecycle state of a per-region script engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Uninitialized,
    Initialized,
    PostInitialized,
    Closed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::PostInitialized => "post_initialized",
            Self::Closed => "closed",
        }
    }

    /// Whether the engine accepts scripts in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initialized | Self::PostInitialized)
    }

    pub fn can_transition_to(&self, next: EngineState) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::Initialized)
                | (Self::Initialized, Self::PostInitialized)
                | (Self::Uninitialized, Self::Closed)
                | (Self::Initialized, Self::Closed)
                | (Self::PostInitialized, Self::Closed)
        )
    }

    /// Validate and perform a transition.
    pub fn transition(&mut self, next: EngineState) -> Result<(), LifecycleError> {
        if !self.can_transition_to(next) {
            return Err(LifecycleError {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = EngineState::default();
        state.transition(EngineState::Initialized).unwrap();
        state.transition(EngineState::PostInitialized).unwrap();
        state.transition(EngineState::Closed).unwrap();
        assert_eq!(state, EngineState::Closed);
    }

    #[test]
    fn test_close_from_uninitialized_is_allowed() {
        let mut state = EngineState::Uninitialized;
        assert!(state.transition(EngineState::Closed).is_ok());
    }

    #[test]
    fn test_post_initialize_requires_initialize() {
        let mut state = EngineState::Uninitialized;
        let err = state.transition(EngineState::PostInitialized).unwrap_err();
        assert_eq!(err.from, EngineState::Uninitialized);
        assert_eq!(state, EngineState::Uninitialized);
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut state = EngineState::Closed;
        assert!(state.transition(EngineState::Initialized).is_err());
        assert!(state.transition(EngineState::Closed).is_err());
    }

    #[test]
    fn test_active_states() {
        assert!(!EngineState::Uninitialized.is_active());
        assert!(EngineState::Initialized.is_active());
        assert!(EngineState::PostInitialized.is_active());
        assert!(!EngineState::Closed.is_active());
    }
}
