//! Paging through the upstream comments api.
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::comment::{decode_page, Comment};
use crate::error::{Result, SyncError};
use crate::sync::PageSource;

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Issues one GET per page against `<base_url>/comments`.
pub struct Fetcher {
    client: Client,
    base_url: String,
}

impl Fetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Fetcher {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn page_request(&self, offset: u64, limit: u64) -> RequestBuilder {
        let url = format!("{}/comments", self.base_url.trim_end_matches('/'));
        self.client
            .get(url)
            .query(&[("_start", offset), ("_limit", limit)])
    }

    /// Fetch the raw body of one page. Anything but a 200 is an error, and the
    /// body is not read in that case.
    pub async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<u8>> {
        let transport = |source| SyncError::Transport { offset, source };

        debug!("fetching {} comments at offset {}", limit, offset);
        let resp = self
            .page_request(offset, limit)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(SyncError::Status { offset, status });
        }

        let body = resp.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Fetcher::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch(&mut self, offset: u64, limit: u64) -> Result<Vec<Comment>> {
        let raw = self.fetch_page(offset, limit).await?;
        decode_page(offset, &raw)
    }
}
