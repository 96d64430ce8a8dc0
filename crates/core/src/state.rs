// Player state machine and status snapshots

use crate::error::{AudioError, Result};
use crate::song::StreamableSong;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Session constructed, Start not called yet
    NotInitialized,
    /// Opening the stream and decoding headers
    Loading,
    /// Pipeline attached and emitting frames
    Playing,
    /// Pipeline attached but emitting silence
    Paused,
    /// Playback finished or was stopped
    Stopped,
    /// Setup or playback failed
    Error,
}

impl PlayerState {
    /// Stopped and Error admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, PlayerState::Stopped | PlayerState::Error)
    }

    /// Whether a render pipeline is attached in this state
    pub fn is_attached(self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused)
    }

    /// Whether the state machine allows `self -> to`
    pub fn can_transition(self, to: PlayerState) -> bool {
        use PlayerState::*;

        match (self, to) {
            // From NotInitialized (Stop before Start cancels the session)
            (NotInitialized, Loading) => true,
            (NotInitialized, Stopped) => true,

            // From Loading
            (Loading, Playing) => true,
            (Loading, Error) => true,
            (Loading, Stopped) => true,

            // From Playing
            (Playing, Paused) => true,
            (Playing, Stopped) => true,
            (Playing, Error) => true,

            // From Paused
            (Paused, Playing) => true,
            (Paused, Stopped) => true,
            (Paused, Error) => true,

            // Stopped and Error are terminal
            _ => false,
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PlayerState::NotInitialized => "not initialized",
            PlayerState::Loading => "loading",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Stopped => "stopped",
            PlayerState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Point-in-time status of a playback session
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub song: StreamableSong,
    pub state: PlayerState,
    /// Last recorded error, set once the session reaches `Error`
    pub error: Option<AudioError>,
    /// Elapsed playback position, zero until the format is known
    pub position: Duration,
    /// Total track length, zero until the format is known
    pub length: Duration,
}

#[derive(Debug)]
struct StateCell {
    state: PlayerState,
    error: Option<AudioError>,
}

/// Thread-safe player state container
///
/// State and last error live under one lock so a reader never sees
/// `Error` without its cause.
#[derive(Clone)]
pub struct PlayerStateContainer {
    cell: Arc<RwLock<StateCell>>,
}

impl PlayerStateContainer {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(RwLock::new(StateCell {
                state: PlayerState::NotInitialized,
                error: None,
            })),
        }
    }

    pub fn get_state(&self) -> PlayerState {
        self.cell.read().state
    }

    /// State and error read together
    pub fn snapshot(&self) -> (PlayerState, Option<AudioError>) {
        let cell = self.cell.read();
        (cell.state, cell.error.clone())
    }

    /// Move to `to` if the state machine allows it, returning the old state
    pub fn transition(&self, to: PlayerState) -> Result<PlayerState> {
        let mut cell = self.cell.write();
        let from = cell.state;
        if !from.can_transition(to) {
            return Err(AudioError::InvalidState(format!(
                "Invalid state transition from {:?} to {:?}",
                from, to
            )));
        }
        cell.state = to;
        log::debug!("Player state changed: {:?} -> {:?}", from, to);
        Ok(from)
    }

    /// Let `f` pick the next state from the current one.
    ///
    /// Returns `(from, to)` when a transition happened; `None` when `f`
    /// declined or the move is not allowed.
    pub fn transition_with<F>(&self, f: F) -> Option<(PlayerState, PlayerState)>
    where
        F: FnOnce(PlayerState) -> Option<PlayerState>,
    {
        let mut cell = self.cell.write();
        let from = cell.state;
        let to = f(from)?;
        if !from.can_transition(to) {
            return None;
        }
        cell.state = to;
        log::debug!("Player state changed: {:?} -> {:?}", from, to);
        Some((from, to))
    }

    /// Record `error` and move to `Error`.
    ///
    /// Returns false, leaving everything untouched, when the current state
    /// cannot fail (already terminal).
    pub fn fail(&self, error: AudioError) -> bool {
        let mut cell = self.cell.write();
        if !cell.state.can_transition(PlayerState::Error) {
            log::debug!(
                "Ignoring error in terminal state {:?}: {}",
                cell.state,
                error
            );
            return false;
        }
        log::debug!("Player state changed: {:?} -> Error ({})", cell.state, error);
        cell.state = PlayerState::Error;
        cell.error = Some(error);
        true
    }
}

impl Default for PlayerStateContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let state = PlayerStateContainer::new();
        assert_eq!(state.get_state(), PlayerState::NotInitialized);

        state.transition(PlayerState::Loading).unwrap();
        state.transition(PlayerState::Playing).unwrap();
        state.transition(PlayerState::Paused).unwrap();
        state.transition(PlayerState::Playing).unwrap();
        assert_eq!(
            state.transition(PlayerState::Stopped).unwrap(),
            PlayerState::Playing
        );
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let state = PlayerStateContainer::new();
        state.transition(PlayerState::Loading).unwrap();
        assert!(state.fail(AudioError::DecodeFailure("bad header".into())));

        assert!(state.transition(PlayerState::Playing).is_err());
        assert!(state.transition(PlayerState::Stopped).is_err());
        assert!(!state.fail(AudioError::Connector("late".into())));

        let (current, error) = state.snapshot();
        assert_eq!(current, PlayerState::Error);
        assert!(matches!(error, Some(AudioError::DecodeFailure(_))));
    }

    #[test]
    fn test_transition_with_declines() {
        let state = PlayerStateContainer::new();
        let toggled = state.transition_with(|s| match s {
            PlayerState::Playing => Some(PlayerState::Paused),
            PlayerState::Paused => Some(PlayerState::Playing),
            _ => None,
        });
        assert!(toggled.is_none());
        assert_eq!(state.get_state(), PlayerState::NotInitialized);
    }

    #[test]
    fn test_transition_table_edges() {
        assert!(!PlayerState::NotInitialized.can_transition(PlayerState::Playing));
        assert!(!PlayerState::Stopped.can_transition(PlayerState::Loading));
        assert!(PlayerState::Loading.can_transition(PlayerState::Error));
    }
}
