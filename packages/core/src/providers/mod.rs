//! Upstream data providers and their self-maintained health.

pub mod error;
pub mod health;
pub mod http;
pub mod mock;
pub mod provider;
pub mod source;

pub use error::{ProviderError, ProviderResult};
pub use health::{HealthStatus, HealthTracker, ProviderHealth};
pub use http::HttpFeedSource;
pub use mock::MockFeedSource;
pub use provider::{Provider, ProviderConfig};
pub use source::{FeedSource, FetchParams};
