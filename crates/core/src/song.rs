// Song metadata handed over by connectors

use std::time::Duration;

/// A search hit returned by a connector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Song {
    pub id: String,
    pub name: String,
    pub artists: String,
}

/// A song whose streaming URL has been resolved and can be played
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamableSong {
    pub id: String,
    pub name: String,
    pub artists: String,
    /// Duration advertised by the connector, zero when unknown
    pub duration: Duration,
    pub connector_name: String,
    pub streaming_url: String,
}

impl StreamableSong {
    /// Song with no metadata besides its URL, for direct URL playback
    pub fn from_url(url: impl Into<String>) -> Self {
        let streaming_url = url.into();
        Self {
            name: streaming_url.clone(),
            streaming_url,
            ..Default::default()
        }
    }

    pub fn from_song(
        song: Song,
        duration: Duration,
        connector_name: impl Into<String>,
        streaming_url: impl Into<String>,
    ) -> Self {
        Self {
            id: song.id,
            name: song.name,
            artists: song.artists,
            duration,
            connector_name: connector_name.into(),
            streaming_url: streaming_url.into(),
        }
    }
}
