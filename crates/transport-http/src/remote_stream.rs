// Seekable byte stream over a remote HTTP resource

use crate::client::HttpClient;
use busich_core::{AudioError, Result};
use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

type Body = Box<dyn Read + Send + Sync>;

/// Mutable part of the stream, guarded by one lock
struct StreamState {
    /// Currently open response body; at most one at a time
    body: Option<Body>,
    /// Bytes consumed so far, i.e. the logical seek position
    pos: u64,
    closed: bool,
}

impl StreamState {
    fn close(&mut self) {
        // Dropping the body releases the connection
        self.body = None;
        self.closed = true;
    }
}

/// Byte stream over an HTTP(S) resource that reconnects with a `Range`
/// request whenever the reader seeks.
///
/// Origins that do not advertise `Accept-Ranges: bytes` yield a
/// sequential-only stream: seeking to the current position is a no-op,
/// forward seeks skip bytes on the open body and backward seeks fail with
/// [`AudioError::UnsupportedSeek`]. `is_seekable()` reports which kind you
/// got.
pub struct RemoteStream {
    url: String,
    client: Arc<dyn HttpClient>,
    accept_ranges: bool,
    content_length: Option<u64>,
    state: Arc<Mutex<StreamState>>,
}

impl RemoteStream {
    /// Probe `url` with HEAD and open a body at offset 0
    pub fn open(url: impl Into<String>, client: Arc<dyn HttpClient>) -> Result<Self> {
        let url = url.into();

        let response = client.head(&url).map_err(|e| match e {
            AudioError::ResourceUnavailable(_) => e,
            other => {
                AudioError::ResourceUnavailable(format!("error inspecting {}: {}", url, other))
            }
        })?;
        if response.status != 200 {
            return Err(AudioError::ResourceUnavailable(format!(
                "HEAD {} answered with status {}",
                url, response.status
            )));
        }

        let stream = Self {
            url,
            client,
            accept_ranges: response.accept_ranges,
            content_length: response.content_length,
            state: Arc::new(Mutex::new(StreamState {
                body: None,
                pos: 0,
                closed: false,
            })),
        };

        {
            let mut state = stream.state.lock();
            stream.seek_locked(&mut state, 0)?;
        }

        match stream.content_length {
            Some(size) => log::info!(
                "Remote stream opened: {} ({} bytes, ranges: {})",
                stream.url,
                size,
                stream.accept_ranges
            ),
            None => log::info!(
                "Remote stream opened: {} (unknown length, ranges: {})",
                stream.url,
                stream.accept_ranges
            ),
        }
        if !stream.accept_ranges {
            log::warn!("Origin does not accept byte ranges, stream is sequential only");
        }

        Ok(stream)
    }

    /// Whether the origin advertised byte-range support
    pub fn accepts_ranges(&self) -> bool {
        self.accept_ranges
    }

    /// Total size advertised by the HEAD probe
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Current read cursor
    pub fn position(&self) -> u64 {
        self.state.lock().pos
    }

    /// Handle that closes this stream from another thread
    pub fn closer(&self) -> StreamCloser {
        StreamCloser {
            state: self.state.clone(),
        }
    }

    /// Release the open body. Idempotent.
    pub fn close(&self) {
        self.state.lock().close();
    }

    fn seek_locked(&self, state: &mut StreamState, target: u64) -> Result<u64> {
        if state.closed {
            return Err(closed_error());
        }

        if target == state.pos && state.body.is_some() {
            return Ok(target);
        }

        if !self.accept_ranges {
            if let Some(body) = state.body.as_mut() {
                if target < state.pos {
                    return Err(AudioError::UnsupportedSeek(format!(
                        "backward seek to {} from {} on an origin without byte ranges",
                        target, state.pos
                    )));
                }

                let wanted = target - state.pos;
                let skipped = io::copy(&mut body.by_ref().take(wanted), &mut io::sink())?;
                state.pos += skipped;
                if skipped < wanted {
                    log::debug!("Forward seek hit end of stream at {}", state.pos);
                }
                return Ok(state.pos);
            }
        }

        self.open_body_at(state, target)?;
        Ok(target)
    }

    fn open_body_at(&self, state: &mut StreamState, offset: u64) -> Result<()> {
        let response = self.client.get_from(&self.url, offset)?;
        if response.status != 200 && response.status != 206 {
            return Err(AudioError::UnexpectedStatus {
                url: self.url.clone(),
                status: response.status,
            });
        }

        // Close the previous body before adopting the new one
        drop(state.body.take());
        state.body = Some(response.body);
        state.pos = offset;
        log::debug!("Remote stream positioned at {} (status {})", offset, response.status);
        Ok(())
    }
}

impl Read for RemoteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let body = state
            .body
            .as_mut()
            .ok_or_else(|| closed_error().into_io())?;
        let n = body.read(buf)?;
        state.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RemoteStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut state = self.state.lock();

        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => state.pos.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot seek to a negative position",
                )
            })?,
            SeekFrom::End(_) => {
                return Err(AudioError::UnsupportedSeek(
                    "only SeekFrom::Start and SeekFrom::Current are supported".to_string(),
                )
                .into_io())
            }
        };

        self.seek_locked(&mut state, target).map_err(AudioError::into_io)
    }
}

impl symphonia::core::io::MediaSource for RemoteStream {
    fn is_seekable(&self) -> bool {
        self.accept_ranges
    }

    fn byte_len(&self) -> Option<u64> {
        self.content_length
    }
}

impl Drop for RemoteStream {
    fn drop(&mut self) {
        self.state.lock().close();
    }
}

/// Closes a [`RemoteStream`] owned by someone else (typically the decoder).
///
/// Waits for an in-flight read or seek to finish, then drops the body;
/// further reads fail.
#[derive(Clone)]
pub struct StreamCloser {
    state: Arc<Mutex<StreamState>>,
}

impl StreamCloser {
    pub fn close(&self) {
        self.state.lock().close();
    }
}

fn closed_error() -> AudioError {
    AudioError::Io {
        kind: io::ErrorKind::NotConnected,
        message: "remote stream is closed".to_string(),
    }
}
