//! External-data fetch layer (§4.6): cache, token-bucket rate limiting,
//! circuit breaking, and retry, composed into one decision order per
//! source and exposed through [`layer::ExternalDataLayer`].

pub mod cache;
pub mod circuit_breaker;
pub mod layer;
pub mod provider_data;
pub mod retry;
pub mod token_bucket;
pub mod warming;

pub use cache::{cache_key, Cache, Freshness};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use layer::{ExternalDataLayer, ExternalDataLayerConfig};
pub use provider_data::{NewsArticle, NewsProvider, PollingProvider, PollingSnapshot, SocialMention, SocialProvider};
pub use retry::{backoff_delay, retry_with_backoff};
pub use token_bucket::{TokenBucket, TokenBucketConfig};
pub use warming::{CacheWarmer, FactoryFuture, WarmingReport, WarmingTask};
