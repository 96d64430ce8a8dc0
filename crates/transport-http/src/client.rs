// HTTP client configuration and the client capability used by remote streams

use busich_core::{AudioError, Result};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

/// HTTP agent settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// `None` lets a stalled origin block reads indefinitely
    pub read_timeout: Option<Duration>,
    pub write_timeout: Duration,
    pub user_agent: String,
    pub max_redirects: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Some(Duration::from_secs(60)),
            write_timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (compatible; Busich/0.2)".to_string(),
            max_redirects: 10,
        }
    }
}

/// Create a configured HTTP agent
pub fn create_http_agent(config: &HttpConfig) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new()
        .timeout_connect(config.connect_timeout)
        .timeout_write(config.write_timeout)
        .user_agent(&config.user_agent)
        .redirects(config.max_redirects);

    if let Some(read_timeout) = config.read_timeout {
        builder = builder.timeout_read(read_timeout);
    }

    builder.build()
}

/// Response of a HEAD or GET request.
///
/// Dropping the body closes the underlying connection.
pub struct HttpResponse {
    pub status: u16,
    /// Whether the origin declared `Accept-Ranges: bytes`
    pub accept_ranges: bool,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send + Sync>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("accept_ranges", &self.accept_ranges)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// HTTP capability consumed by [`crate::RemoteStream`].
///
/// Any status code is returned as a response; only transport failures
/// (DNS, connect, TLS) are errors.
pub trait HttpClient: Send + Sync {
    fn head(&self, url: &str) -> Result<HttpResponse>;

    /// GET with `Range: bytes=<offset>-`
    fn get_from(&self, url: &str, offset: u64) -> Result<HttpResponse>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn head(&self, url: &str) -> Result<HttpResponse> {
        (**self).head(url)
    }

    fn get_from(&self, url: &str, offset: u64) -> Result<HttpResponse> {
        (**self).get_from(url, offset)
    }
}

/// `ureq`-backed HTTP client
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new() -> Self {
        Self::with_config(&HttpConfig::default())
    }

    pub fn with_config(config: &HttpConfig) -> Self {
        Self {
            agent: create_http_agent(config),
        }
    }

    fn finish(
        method: &str,
        url: &str,
        result: std::result::Result<ureq::Response, ureq::Error>,
    ) -> Result<HttpResponse> {
        match result {
            Ok(response) => Ok(into_http_response(response)),
            // ureq reports 4xx/5xx as errors; callers decide what a status means
            Err(ureq::Error::Status(_, response)) => Ok(into_http_response(response)),
            Err(ureq::Error::Transport(e)) => Err(AudioError::ResourceUnavailable(format!(
                "HTTP {} {} failed: {}",
                method, url, e
            ))),
        }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn head(&self, url: &str) -> Result<HttpResponse> {
        Self::finish("HEAD", url, self.agent.head(url).call())
    }

    fn get_from(&self, url: &str, offset: u64) -> Result<HttpResponse> {
        log::debug!("HTTP GET {} Range: bytes={}-", url, offset);
        let result = self
            .agent
            .get(url)
            .set("Range", &format!("bytes={}-", offset))
            .call();
        Self::finish("GET", url, result)
    }
}

fn into_http_response(response: ureq::Response) -> HttpResponse {
    let accept_ranges = response
        .header("Accept-Ranges")
        .map_or(false, |v| v.trim().eq_ignore_ascii_case("bytes"));
    let content_length = response
        .header("Content-Length")
        .and_then(|s| s.trim().parse::<u64>().ok());

    HttpResponse {
        status: response.status(),
        accept_ranges,
        content_length,
        body: response.into_reader(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn test_unreachable_origin_is_resource_unavailable() {
        let client = UreqClient::with_config(&HttpConfig {
            connect_timeout: Duration::from_millis(200),
            ..HttpConfig::default()
        });

        // Port 9 on localhost is the discard service and is closed almost everywhere
        let err = client.head("http://127.0.0.1:9/song.mp3").unwrap_err();
        assert!(matches!(err, AudioError::ResourceUnavailable(_)));
    }
}
