use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Local};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::FetchError;
use crate::marks::Snapshot;
use crate::provider::page::{parse_snapshot, PageLayout, PageTemplate};
use crate::provider::{PortalCredentials, SnapshotProvider};

const USER_AGENT: &str = concat!("mark-watch/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 6;
const PREVIEW_CHARS: usize = 180;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Url(String),
    /// Page rendered by an external browser session and saved to disk.
    File(PathBuf),
}

impl PageSource {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix("file://") {
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::Url(raw.to_string()),
        }
    }
}

pub struct PortalProvider {
    client: Client,
    source: PageSource,
    credentials: PortalCredentials,
    template: PageTemplate,
    timeout: Duration,
}

impl PortalProvider {
    pub fn new(
        source: PageSource,
        credentials: PortalCredentials,
        template: PageTemplate,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|source| FetchError::Network {
                url: String::new(),
                source,
            })?;
        Ok(Self {
            client,
            source,
            credentials,
            template,
            timeout,
        })
    }

    pub fn current_layout(&self) -> PageLayout {
        self.template.layout_for_year(Local::now().year())
    }

    async fn fetch_page(&self) -> Result<String, FetchError> {
        match &self.source {
            PageSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| FetchError::Io {
                        path: path.clone(),
                        source,
                    })
            }
            PageSource::Url(url) => self.fetch_text(url).await,
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.account_id, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|source| self.classify(url, source))?;
        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(FetchError::Authentication {
                status: status.as_u16(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|source| self.classify(url, source))?;
        if !status.is_success() {
            let preview: String = body.chars().take(PREVIEW_CHARS).collect();
            debug!("GET {url} returned {status}: {preview}");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(body)
    }

    fn classify(&self, url: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout(self.timeout.as_secs())
        } else {
            FetchError::Network {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl SnapshotProvider for PortalProvider {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        let html = tokio::time::timeout(self.timeout, self.fetch_page())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_secs()))??;
        parse_snapshot(&html, &self.current_layout())
    }
}
