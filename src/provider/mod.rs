pub mod http;
pub mod page;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::marks::Snapshot;

pub use http::PortalProvider;
pub use page::{parse_snapshot, PageLayout, PageTemplate};

#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, FetchError>;
}

#[derive(Clone)]
pub struct PortalCredentials {
    pub account_id: String,
    pub password: String,
}

impl std::fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("account_id", &self.account_id)
            .field("password", &"***")
            .finish()
    }
}
