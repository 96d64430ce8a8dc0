// Error taxonomy for the playback engine

use std::io;

/// Playback engine error types
///
/// Errors are `Clone` because a session keeps its terminal error around and
/// hands a copy to every status report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioError {
    /// The origin could not be reached or the HEAD probe did not answer 200
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A ranged GET answered with something other than 200 or 206
    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// Seek addressing mode or direction the stream cannot serve
    #[error("unsupported seek: {0}")]
    UnsupportedSeek(String),

    /// Audio payload could not be parsed or decoded
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// Audio output device could not be configured
    #[error("output init failure: {0}")]
    OutputInitFailure(String),

    /// Plain I/O failure (network reads included)
    #[error("io error: {message}")]
    Io { kind: io::ErrorKind, message: String },

    /// Operation not valid in the current player state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No connector registered under this name
    #[error("connector {0} not recognized")]
    UnknownConnector(String),

    /// Song reference not of the form `connector.id`
    #[error("invalid song reference {0}")]
    InvalidSongRef(String),

    /// A connector failed to search or resolve a song
    #[error("connector error: {0}")]
    Connector(String),

    /// Another error annotated with what was being attempted
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AudioError>,
    },
}

impl AudioError {
    /// Wrap this error with a description of the failed operation
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AudioError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers stripped
    pub fn root(&self) -> &AudioError {
        let mut current = self;
        while let AudioError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Carry this error through an `std::io` boundary.
    ///
    /// `From<io::Error>` recovers the original value on the other side.
    pub fn into_io(self) -> io::Error {
        let kind = match self.root() {
            AudioError::UnsupportedSeek(_) => io::ErrorKind::Unsupported,
            AudioError::Io { kind, .. } => *kind,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<io::Error> for AudioError {
    fn from(err: io::Error) -> Self {
        let kind = err.kind();
        let carries_audio_error = err
            .get_ref()
            .map_or(false, |inner| inner.is::<AudioError>());

        if carries_audio_error {
            if let Some(inner) = err.into_inner() {
                if let Ok(audio) = inner.downcast::<AudioError>() {
                    return *audio;
                }
            }
            return AudioError::Io {
                kind,
                message: kind.to_string(),
            };
        }

        AudioError::Io {
            kind,
            message: err.to_string(),
        }
    }
}
