// Player and connector boundaries

use crate::error::Result;
use crate::song::{Song, StreamableSong};
use crate::state::PlayerStatus;

/// Control surface exposed to presentation layers
///
/// Every method takes `&self`: `start` blocks its caller for the whole
/// playback while the other methods are called from other threads.
pub trait Player: Send + Sync {
    /// Set up the pipeline and block until playback ends, is stopped or fails
    fn start(&self) -> Result<()>;

    /// Toggle pause; no-op until a pipeline is attached
    fn pause_or_resume(&self);

    /// Detach the pipeline and release `start`
    fn stop(&self);

    /// Snapshot of state, position, length and last error
    fn report(&self) -> PlayerStatus;
}

/// A music provider able to resolve song ids into streaming URLs
pub trait Connector: Send + Sync {
    /// Short name used as the prefix of song references
    fn name(&self) -> &str;

    /// One-time setup such as fetching signing keys
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn search(&self, term: &str) -> Result<Vec<Song>>;

    /// Resolve a provider-specific id into a playable song
    fn resolve(&self, id: &str) -> Result<StreamableSong>;
}
