//! Feed source backed by a blocking HTTP client.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::{normalize, Entry, FeedSource};
use crate::error::FeedError;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches feeds over HTTP(S) and normalises them with [`normalize`].
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new() -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self, url: &str) -> Result<Vec<Entry>, FeedError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status,
            });
        }
        let body = response.text()?;
        debug!("Fetched {} ({} bytes)", url, body.len());
        normalize(&body)
    }
}
