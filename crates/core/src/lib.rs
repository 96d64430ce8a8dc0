// Core types and traits for the busich playback engine

pub mod error;
pub mod player;
pub mod signal;
pub mod song;
pub mod state;
pub mod stream;

// Re-export commonly used types
pub use error::{AudioError, Result};
pub use player::{Connector, Player};
pub use signal::Completion;
pub use song::{Song, StreamableSong};
pub use state::{PlayerState, PlayerStateContainer, PlayerStatus};
pub use stream::Streamer;
