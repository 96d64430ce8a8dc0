// Playback sessions and the jukebox composing connectors with one output

mod jukebox;
mod logging;
mod prefetch;
mod session;

pub use jukebox::Jukebox;
pub use logging::init_logging;
pub use session::PlaybackSession;

pub use busich_core::{
    AudioError, Connector, Player, PlayerState, PlayerStatus, Result, Song, StreamableSong,
};
pub use busich_renderer::{AudioSpec, NullRendererFactory, OutputSink, RendererFactory};
pub use busich_transport_http::{HttpClient, HttpConfig, MemoryOrigin, UreqClient};

#[cfg(feature = "desktop")]
pub use busich_renderer::CpalRendererFactory;
