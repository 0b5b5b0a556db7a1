//! Page fetching for result URLs.
//!
//! Every failure here is absorbed: the orchestrator treats a failed page as a
//! page with no content.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{HttpConfig, MAX_PAGE_BYTES_LIMIT};
use crate::error::{FetchOutcome, SearchError};

const MAX_REDIRECTS: usize = 5;

/// Fetches raw HTML with a fixed timeout and a browser user agent
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl PageFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, SearchError> {
        Self::with_settings(&config.user_agent, config.page_timeout(), config.max_page_bytes)
    }

    pub fn with_settings(
        user_agent: &str,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self {
            client,
            max_bytes: max_bytes.min(MAX_PAGE_BYTES_LIMIT),
        })
    }

    /// Fetch one page. Non-2xx statuses and network faults come back as
    /// transient failures.
    pub async fn fetch(&self, url: &str) -> FetchOutcome<String> {
        debug!("Fetching page: {}", url);

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!("Failed to fetch {}: {}", url, e);
                return FetchOutcome::TransientFailure(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!("Non-success status {} for {}", status, url);
            return FetchOutcome::TransientFailure(format!("HTTP {}", status));
        }

        match read_body_capped(response, self.max_bytes).await {
            Ok(body) => FetchOutcome::Success(body),
            Err(e) => {
                warn!("Failed to read body of {}: {}", url, e);
                FetchOutcome::TransientFailure(e.to_string())
            }
        }
    }
}

/// Read a response body chunk by chunk, stopping once `max_bytes` are held.
/// Bytes past the limit are never buffered. The body is decoded as UTF-8,
/// with invalid sequences replaced.
async fn read_body_capped(
    mut response: reqwest::Response,
    max_bytes: usize,
) -> Result<String, reqwest::Error> {
    let mut body = Vec::with_capacity(max_bytes.min(256 * 1024));

    while let Some(chunk) = response.chunk().await? {
        let remaining = max_bytes - body.len();
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            debug!("Page body reached the {} byte limit", max_bytes);
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(decode_body(body))
}

/// Decode page bytes as UTF-8. A multi-byte character cut by the size limit
/// is dropped; other invalid sequences become U+FFFD.
fn decode_body(body: Vec<u8>) -> String {
    match String::from_utf8(body) {
        Ok(text) => text,
        Err(e) => {
            let mut bytes = e.into_bytes();
            if let Err(utf8) = std::str::from_utf8(&bytes) {
                if utf8.error_len().is_none() {
                    bytes.truncate(utf8.valid_up_to());
                }
            }
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }
}
