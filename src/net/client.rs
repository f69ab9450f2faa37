use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::common::errors::{EngineError, EngineResult};
use crate::configs::HttpConfig;

/// Blocking HTTP client shared by the producer side of the engine.
///
/// One instance is built per player and cloned into every stream session.
/// Requests carry the configured User-Agent and, when set, a Referer header.
#[derive(Clone)]
pub struct StreamClient {
    client: reqwest::blocking::Client,
    referer: Option<String>,
}

impl StreamClient {
    pub fn new(config: &HttpConfig) -> EngineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            referer: config.referer.clone(),
        })
    }

    fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        let mut req = self.client.get(url).header("Accept", "*/*");
        if let Some(referer) = &self.referer {
            req = req.header("Referer", referer.as_str());
        }
        req
    }

    /// Fetches a small text resource (playlists).
    pub fn get_text(&self, url: &str) -> EngineResult<String> {
        let mut res = self
            .get(url)
            .header("Accept", "application/x-mpegURL, */*")
            .send()
            .map_err(classify_transport)?;
        check_status(res.status(), url)?;

        let mut text = String::new();
        res.read_to_string(&mut text)
            .map_err(|e| EngineError::Network(format!("read body of {url}: {e}")))?;
        Ok(text)
    }

    /// Fetches a whole binary resource (segments, keys).
    pub fn get_bytes(&self, url: &str) -> EngineResult<Bytes> {
        let res = self.get(url).send().map_err(classify_transport)?;
        check_status(res.status(), url)?;

        let body = res.bytes().map_err(classify_transport)?;
        debug!("fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }

    /// Opens a streaming response without draining the body.
    pub fn open_stream(&self, url: &str) -> EngineResult<StreamResponse> {
        let res = self.get(url).send().map_err(classify_transport)?;
        check_status(res.status(), url)?;

        let content_length = res.content_length();
        debug!("opened stream {} (content_length={:?})", url, content_length);
        Ok(StreamResponse {
            inner: res,
            content_length,
        })
    }
}

/// An open HTTP response body read incrementally by the direct-stream path.
pub struct StreamResponse {
    inner: reqwest::blocking::Response,
    content_length: Option<u64>,
}

impl StreamResponse {
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl Read for StreamResponse {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

fn classify_transport(e: reqwest::Error) -> EngineError {
    if e.is_builder() {
        EngineError::InvalidUrl(e.to_string())
    } else {
        // Connect failures, timeouts and mid-body drops all land here.
        EngineError::Network(e.to_string())
    }
}

fn check_status(status: reqwest::StatusCode, url: &str) -> EngineResult<()> {
    if status.is_success() {
        return Ok(());
    }
    let msg = format!("HTTP {} for {}", status.as_u16(), url);
    if status.is_server_error() {
        Err(EngineError::Network(msg))
    } else {
        Err(EngineError::Resource(msg))
    }
}
