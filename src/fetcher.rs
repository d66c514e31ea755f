use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::rss::{self, RssFeed};

pub const USER_AGENT: &str = concat!("gator/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from a single feed fetch. Each one names the feed url.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not build request for {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("could not parse RSS from {url}")]
    Parse {
        url: String,
        #[source]
        source: quick_xml::DeError,
    },
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// Download `url` and parse it as an RSS document.
    pub async fn fetch_feed(&self, url: &str) -> Result<RssFeed, FetchError> {
        let request = self
            .client
            .get(url)
            .build()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.execute(request).await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        debug!(url, bytes = body.len(), "Downloaded feed");

        rss::parse(&body).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })
    }
}
