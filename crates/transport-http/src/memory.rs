// In-memory HTTP origin serving a fixed byte buffer

use crate::client::{HttpClient, HttpResponse};
use busich_core::{AudioError, Result};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Body reader handing out at most `max_chunk` bytes per read, like a socket
struct ChunkedBody {
    inner: Cursor<SharedBytes>,
    max_chunk: usize,
}

impl Read for ChunkedBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = buf.len().min(self.max_chunk);
        self.inner.read(&mut buf[..len])
    }
}

/// HTTP origin backed by a byte buffer.
///
/// Behaves like a static file server: HEAD answers with the content length
/// and, unless disabled, `Accept-Ranges: bytes`; GETs honour the range
/// offset with 206 or ignore it with 200 when ranges are disabled. Every
/// request is counted so callers can assert on network traffic.
pub struct MemoryOrigin {
    data: SharedBytes,
    accept_ranges: bool,
    head_status: u16,
    get_status: Option<u16>,
    unreachable: bool,
    max_chunk: usize,
    head_requests: AtomicUsize,
    get_requests: AtomicUsize,
}

impl MemoryOrigin {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: SharedBytes(Arc::new(data.into())),
            accept_ranges: true,
            head_status: 200,
            get_status: None,
            unreachable: false,
            max_chunk: usize::MAX,
            head_requests: AtomicUsize::new(0),
            get_requests: AtomicUsize::new(0),
        }
    }

    /// Serve like an origin that ignores `Range` headers
    pub fn without_ranges(mut self) -> Self {
        self.accept_ranges = false;
        self
    }

    pub fn with_head_status(mut self, status: u16) -> Self {
        self.head_status = status;
        self
    }

    /// Force every GET to answer with `status`
    pub fn with_get_status(mut self, status: u16) -> Self {
        self.get_status = Some(status);
        self
    }

    /// Fail every request as if the host could not be reached
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Limit how many bytes a single body read returns
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.data.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.0.is_empty()
    }

    pub fn head_count(&self) -> usize {
        self.head_requests.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.get_requests.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.head_count() + self.get_count()
    }

    fn body_from(&self, offset: u64) -> Box<dyn Read + Send + Sync> {
        let mut cursor = Cursor::new(self.data.clone());
        cursor.set_position(offset);
        Box::new(ChunkedBody {
            inner: cursor,
            max_chunk: self.max_chunk,
        })
    }

    fn check_reachable(&self, method: &str, url: &str) -> Result<()> {
        if self.unreachable {
            return Err(AudioError::ResourceUnavailable(format!(
                "HTTP {} {} failed: connection refused",
                method, url
            )));
        }
        Ok(())
    }
}

impl HttpClient for MemoryOrigin {
    fn head(&self, url: &str) -> Result<HttpResponse> {
        self.head_requests.fetch_add(1, Ordering::SeqCst);
        self.check_reachable("HEAD", url)?;

        Ok(HttpResponse {
            status: self.head_status,
            accept_ranges: self.accept_ranges,
            content_length: Some(self.len() as u64),
            body: Box::new(std::io::empty()),
        })
    }

    fn get_from(&self, url: &str, offset: u64) -> Result<HttpResponse> {
        self.get_requests.fetch_add(1, Ordering::SeqCst);
        self.check_reachable("GET", url)?;

        let (default_status, start) = if self.accept_ranges {
            (206, offset)
        } else {
            (200, 0)
        };
        let status = self.get_status.unwrap_or(default_status);
        let total = self.len() as u64;

        Ok(HttpResponse {
            status,
            accept_ranges: self.accept_ranges,
            content_length: Some(total.saturating_sub(start)),
            body: self.body_from(start),
        })
    }
}
