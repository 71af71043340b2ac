//! Config entry lifecycle state machine
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (retry)
//!                            ↘ SetupRetry → SetupInProgress (retry)
//!
//! Loaded/SetupError/SetupRetry → UnloadInProgress → NotLoaded
//!                                                 ↘ FailedUnload (terminal)
//! ```

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid state transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub reason: &'static str,
}

impl ConfigEntryState {
    /// Attempt a transition to a new state
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let valid = matches!(
            (self, to),
            (NotLoaded, SetupInProgress)
                | (SetupInProgress, Loaded | SetupError | SetupRetry)
                | (SetupError | SetupRetry, SetupInProgress | UnloadInProgress)
                | (Loaded, UnloadInProgress)
                | (UnloadInProgress, NotLoaded | FailedUnload)
        );

        if valid {
            return Ok(to);
        }

        let reason = match (self, to) {
            (FailedUnload, _) => "state is terminal",
            (SetupInProgress, _) => "setup in progress",
            (UnloadInProgress, _) => "unload in progress",
            (Loaded, SetupInProgress) => "already loaded, unload first",
            (NotLoaded, _) => "entry must go through setup first",
            _ => "transition not allowed",
        };

        Err(InvalidTransition {
            from: self,
            to,
            reason,
        })
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.try_transition(to).is_ok()
    }
}
