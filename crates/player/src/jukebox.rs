// Connectors plus one shared output, handing out one session at a time

use crate::session::PlaybackSession;
use busich_core::{AudioError, Connector, Player, Result, Song, StreamableSong};
use busich_renderer::OutputSink;
use busich_transport_http::HttpClient;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry point for presentation layers.
///
/// Resolves `connector.id` song references through the registered
/// connectors and creates sessions on the shared sink. Creating a session
/// stops the previous one, so only one pipeline feeds the sink at a time.
pub struct Jukebox {
    sink: OutputSink,
    http: Arc<dyn HttpClient>,
    connectors: BTreeMap<String, Arc<dyn Connector>>,
    current: Mutex<Option<Arc<PlaybackSession>>>,
}

impl Jukebox {
    pub fn new(sink: OutputSink, http: Arc<dyn HttpClient>) -> Self {
        Self {
            sink,
            http,
            connectors: BTreeMap::new(),
            current: Mutex::new(None),
        }
    }

    /// Register a connector under its own name, replacing any namesake
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(connector.name().to_string(), connector);
        self
    }

    /// Registered connector names, sorted
    pub fn connector_names(&self) -> impl Iterator<Item = &str> {
        self.connectors.keys().map(String::as_str)
    }

    /// Initialize every connector, stopping at the first failure
    pub fn init(&self) -> Result<()> {
        for (name, connector) in &self.connectors {
            connector
                .init()
                .map_err(|e| e.with_context(format!("initializing connector {}", name)))?;
            log::debug!("[jukebox] connector {} ready", name);
        }
        Ok(())
    }

    pub fn search(&self, connector_name: &str, term: &str) -> Result<Vec<Song>> {
        self.connector(connector_name)?
            .search(term)
            .map_err(|e| e.with_context(format!("searching term={}", term)))
    }

    /// Split `connector.id` on its first dot
    pub fn parse_song_ref(song_ref: &str) -> Result<(&str, &str)> {
        match song_ref.split_once('.') {
            Some((connector, id)) if !connector.is_empty() && !id.is_empty() => {
                Ok((connector, id))
            }
            _ => Err(AudioError::InvalidSongRef(song_ref.to_string())),
        }
    }

    /// Resolve `song_ref` and create its session without starting it
    pub fn play(&self, song_ref: &str) -> Result<Arc<PlaybackSession>> {
        let (connector_name, id) = Self::parse_song_ref(song_ref)?;
        let song = self
            .connector(connector_name)?
            .resolve(id)
            .map_err(|e| e.with_context(format!("resolving song id={}", id)))?;

        log::info!(
            "[jukebox] resolved {} to '{}' by {}",
            song_ref,
            song.name,
            song.artists
        );
        Ok(self.replace_session(song))
    }

    /// Create a session for a streaming URL without connector metadata
    pub fn play_url(&self, url: &str) -> Arc<PlaybackSession> {
        self.replace_session(StreamableSong::from_url(url))
    }

    /// The most recently created session
    pub fn current(&self) -> Option<Arc<PlaybackSession>> {
        self.current.lock().clone()
    }

    /// Stop the current session, if any
    pub fn stop(&self) {
        if let Some(session) = self.current.lock().take() {
            session.stop();
        }
    }

    fn connector(&self, name: &str) -> Result<&Arc<dyn Connector>> {
        self.connectors
            .get(name)
            .ok_or_else(|| AudioError::UnknownConnector(name.to_string()))
    }

    fn replace_session(&self, song: StreamableSong) -> Arc<PlaybackSession> {
        let session = Arc::new(PlaybackSession::new(
            song,
            self.sink.clone(),
            self.http.clone(),
        ));

        let previous = self.current.lock().replace(session.clone());
        if let Some(previous) = previous {
            log::debug!("[jukebox] stopping previous session");
            previous.stop();
        }
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busich_core::PlayerState;
    use busich_renderer::NullRendererFactory;
    use busich_transport_http::MemoryOrigin;
    use std::time::Duration;

    struct StaticConnector;

    impl Connector for StaticConnector {
        fn name(&self) -> &str {
            "static"
        }

        fn search(&self, term: &str) -> Result<Vec<Song>> {
            Ok(vec![Song {
                id: "A1".to_string(),
                name: term.to_string(),
                artists: "Nobody".to_string(),
            }])
        }

        fn resolve(&self, id: &str) -> Result<StreamableSong> {
            if id != "A1" {
                return Err(AudioError::Connector(format!("song {} not found", id)));
            }
            Ok(StreamableSong::from_song(
                Song {
                    id: id.to_string(),
                    name: "First".to_string(),
                    artists: "Nobody".to_string(),
                },
                Duration::from_secs(3),
                "static",
                "https://cdn.test/a1.mp3",
            ))
        }
    }

    fn jukebox() -> Jukebox {
        let sink = OutputSink::with_preferred_spec(Arc::new(NullRendererFactory::default()));
        Jukebox::new(sink, Arc::new(MemoryOrigin::new(Vec::new())))
            .with_connector(Arc::new(StaticConnector))
    }

    #[test]
    fn test_parse_song_ref() {
        assert_eq!(
            Jukebox::parse_song_ref("zingmp3.ZW67OIA0").unwrap(),
            ("zingmp3", "ZW67OIA0")
        );
        // Only the first dot separates
        assert_eq!(
            Jukebox::parse_song_ref("nct.abc.def").unwrap(),
            ("nct", "abc.def")
        );
        for bad in ["zingmp3", "", ".id", "zingmp3."] {
            let err = Jukebox::parse_song_ref(bad).unwrap_err();
            assert!(matches!(err, AudioError::InvalidSongRef(_)), "{}", bad);
        }
    }

    #[test]
    fn test_unknown_connector() {
        let err = jukebox().play("nope.123").err().unwrap();
        assert!(matches!(err, AudioError::UnknownConnector(ref name) if name == "nope"));

        let err = jukebox().search("nope", "term").unwrap_err();
        assert!(matches!(err, AudioError::UnknownConnector(_)));
    }

    #[test]
    fn test_connector_errors_keep_their_class() {
        let err = jukebox().play("static.B2").err().unwrap();
        assert!(matches!(err.root(), AudioError::Connector(_)));
        assert!(err.to_string().contains("B2"));
    }

    #[test]
    fn test_play_resolves_without_starting() {
        let jukebox = jukebox();
        let session = jukebox.play("static.A1").unwrap();

        assert_eq!(session.song().name, "First");
        assert_eq!(session.song().connector_name, "static");
        assert_eq!(session.state(), PlayerState::NotInitialized);
        assert!(Arc::ptr_eq(&jukebox.current().unwrap(), &session));
    }

    #[test]
    fn test_new_play_stops_previous_session() {
        let jukebox = jukebox();
        let first = jukebox.play("static.A1").unwrap();
        let second = jukebox.play_url("https://cdn.test/other.mp3");

        assert_eq!(first.state(), PlayerState::Stopped);
        assert_eq!(second.state(), PlayerState::NotInitialized);
        assert_eq!(second.song().name, "https://cdn.test/other.mp3");

        jukebox.stop();
        assert_eq!(second.state(), PlayerState::Stopped);
        assert!(jukebox.current().is_none());
    }

    #[test]
    fn test_search_and_init() {
        let jukebox = jukebox();
        jukebox.init().unwrap();
        assert_eq!(jukebox.connector_names().collect::<Vec<_>>(), vec!["static"]);

        let songs = jukebox.search("static", "hello").unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].name, "hello");
    }
}
