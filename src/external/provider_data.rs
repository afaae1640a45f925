//! Payload types returned by the external-data layer's three sources.
//! Shapes are intentionally small and source-agnostic — individual
//! provider adapters (out of scope; consumed via [`NewsProvider`],
//! [`PollingProvider`], [`SocialProvider`]) map their own wire format onto
//! these before the cache ever sees them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub url: String,
    pub relevance_score: f64,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSnapshot {
    pub pollster: String,
    pub sample_size: u32,
    pub collected_at: DateTime<Utc>,
    pub yes_share: f64,
    pub margin_of_error: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialMention {
    pub platform: String,
    pub posted_at: DateTime<Utc>,
    pub sentiment_score: f64,
    pub engagement: u64,
    pub excerpt: String,
}

/// Consumed contract for a news provider. Production adapters wrap a
/// concrete `reqwest` client behind this trait, same boundary discipline
/// as [`crate::interfaces::MarketClient`].
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_news(&self, market_question: &str, window: chrono::Duration) -> Result<Vec<NewsArticle>, ProviderError>;
}

#[async_trait]
pub trait PollingProvider: Send + Sync {
    async fn fetch_polling(&self, market_question: &str) -> Result<Vec<PollingSnapshot>, ProviderError>;
}

#[async_trait]
pub trait SocialProvider: Send + Sync {
    async fn fetch_social(&self, market_question: &str, platforms: &[String]) -> Result<Vec<SocialMention>, ProviderError>;
}
