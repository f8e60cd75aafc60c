//! Thumbnail downloads
//!
//! A failed download is never an error for the caller: the only thing the
//! pipeline can do with a missing thumbnail is leave it out of this cycle.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Raw bytes of the image at `url`, or `None` if it could not be read
    async fn fetch(&self, url: &str) -> Option<Bytes>;
}

#[derive(Clone)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vuster/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Option<Bytes> {
        let resp = match self.http.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(url, error = %e, "thumbnail download failed");
                return None;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "thumbnail download rejected");
            return None;
        }

        match resp.bytes().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(url, error = %e, "thumbnail body read failed");
                None
            }
        }
    }
}
