//! Remote catalogs the bot reads from.

pub mod cfw_guide;

use crate::error::FetchError;
use crate::models::catalog::{CfwGuide, JbaApp, SignedStatus};
use async_trait::async_trait;

pub use cfw_guide::CfwGuideApi;

/// Where catalog data comes from. Each call is one outbound fetch; caching
/// happens in the service above it.
#[async_trait]
pub trait CatalogSource: Send + Sync + 'static {
    async fn fetch_guide(&self) -> Result<CfwGuide, FetchError>;

    async fn fetch_jba_apps(&self) -> Result<Vec<JbaApp>, FetchError>;

    async fn fetch_signed_status(&self) -> Result<SignedStatus, FetchError>;

    /// Cleaned, de-duplicated device display names.
    async fn fetch_devices(&self) -> Result<Vec<String>, FetchError>;
}
