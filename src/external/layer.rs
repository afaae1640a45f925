//! External Data Layer (§4.6): ties the cache, token bucket, circuit
//! breaker and retry policy together behind the exact six-step fetch
//! decision order, one independent policy per source (news, polling,
//! social) — mirroring how the teacher's `DomeEnrichmentService` keeps
//! one cache-check-then-fetch block per enrichment kind rather than a
//! single generalized dispatcher.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::OnceCell;

use crate::clock::SharedClock;
use crate::config::{CacheConfig, CircuitBreakerConfig, ExternalSourceConfig, RateLimitConfig, RetryConfig};
use crate::error::ProviderError;
use crate::interfaces::ObservabilitySink;

use super::cache::{cache_key, Cache};
use super::circuit_breaker::CircuitBreaker;
use super::provider_data::{NewsArticle, NewsProvider, PollingProvider, PollingSnapshot, SocialMention, SocialProvider};
use super::retry::retry_with_backoff;
use super::token_bucket::{TokenBucket, TokenBucketConfig};

struct Policy<T> {
    cache: Cache,
    bucket: TokenBucket,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    ttl: ChronoDuration,
    stale_ttl: ChronoDuration,
    /// Configured provider identity (§6 `externalData.<source>.provider`),
    /// reported alongside `source` on every telemetry event (§4.6).
    provider_name: Option<String>,
    inflight: Mutex<HashMap<String, Arc<OnceCell<Result<T, ProviderError>>>>>,
}

impl<T> Policy<T> {
    fn new(
        cache_config: CacheConfig,
        source_config: &ExternalSourceConfig,
        breaker_config: &CircuitBreakerConfig,
        rate_limit_config: &RateLimitConfig,
        retry_config: &RetryConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            cache: Cache::new(cache_config, clock.clone()),
            bucket: TokenBucket::new(
                TokenBucketConfig {
                    capacity: rate_limit_config.requests_per_window as f64,
                    refill_rate_per_sec: rate_limit_config.requests_per_window as f64
                        / (rate_limit_config.window_size_ms as f64 / 1000.0).max(1.0),
                    buffer: rate_limit_config.buffer,
                },
                clock.clone(),
            ),
            breaker: CircuitBreaker::new(breaker_config.failure_threshold, breaker_config.reset_timeout_ms, clock),
            retry: retry_config.clone(),
            ttl: ChronoDuration::seconds(source_config.cache_ttl_secs),
            stale_ttl: ChronoDuration::seconds(source_config.cache_ttl_secs * 4),
            provider_name: source_config.provider.clone(),
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

struct FetchResult<T> {
    value: Option<T>,
    cached: bool,
    stale: bool,
    /// Failure reason for the branch that produced this result, if any
    /// (§4.6 telemetry `error?`). `None` for a fresh cache hit or a clean
    /// fall-through with no underlying failure.
    error: Option<String>,
}

/// Ensures only one provider call is in flight per cache key at a time:
/// concurrent callers for the same key share the same `OnceCell` and all
/// observe its single resolved outcome.
async fn coalesced<T, Fut>(
    inflight: &Mutex<HashMap<String, Arc<OnceCell<Result<T, ProviderError>>>>>,
    key: &str,
    fut: Fut,
) -> Result<T, ProviderError>
where
    T: Clone,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let cell = {
        let mut guard = inflight.lock();
        guard.entry(key.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
    };
    let result = cell.get_or_try_init(|| fut).await.cloned();
    inflight.lock().remove(key);
    result
}

/// The six-step decision order from §4.6, parameterized over the
/// payload type so news/polling/social share one implementation.
async fn run_policy<T, F, Fut>(policy: &Policy<T>, key: &str, provider_call: Option<F>) -> FetchResult<T>
where
    T: Clone + Serialize + DeserializeOwned,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    if let Some(fresh) = policy.cache.get_fresh::<T>(key) {
        return FetchResult {
            value: Some(fresh),
            cached: true,
            stale: false,
            error: None,
        };
    }

    if !policy.bucket.try_consume(1.0) {
        return stale_or_empty(policy, key, Some("rate_limited".to_string()));
    }

    // Smooths bursts by holding near-empty callers back briefly instead of
    // letting them run right up against the limit (§4.6 token-bucket
    // buffer).
    let smoothing_delay = policy.bucket.smoothing_delay();
    if !smoothing_delay.is_zero() {
        tokio::time::sleep(smoothing_delay).await;
    }

    let Some(call) = provider_call else {
        return stale_or_empty(policy, key, None);
    };

    if !policy.breaker.permits_call() {
        return stale_or_empty(policy, key, Some("circuit_open".to_string()));
    }

    match coalesced(&policy.inflight, key, retry_with_backoff(&policy.retry, call)).await {
        Ok(value) => {
            policy.breaker.record_success();
            policy.cache.insert(key, &value, policy.ttl, policy.stale_ttl);
            FetchResult {
                value: Some(value),
                cached: false,
                stale: false,
                error: None,
            }
        }
        Err(err) => {
            policy.breaker.record_failure();
            stale_or_empty(policy, key, Some(err.to_string()))
        }
    }
}

fn stale_or_empty<T: Serialize + DeserializeOwned + Clone>(policy: &Policy<T>, key: &str, error: Option<String>) -> FetchResult<T> {
    match policy.cache.get_stale::<T>(key) {
        Some(value) => FetchResult {
            value: Some(value),
            cached: true,
            stale: true,
            error,
        },
        None => FetchResult {
            value: None,
            cached: false,
            stale: false,
            error,
        },
    }
}

pub struct ExternalDataLayer {
    news: Policy<Vec<NewsArticle>>,
    news_provider: Option<Arc<dyn NewsProvider>>,
    polling: Policy<Vec<PollingSnapshot>>,
    polling_provider: Option<Arc<dyn PollingProvider>>,
    social: Policy<Vec<SocialMention>>,
    social_provider: Option<Arc<dyn SocialProvider>>,
    observability: Arc<dyn ObservabilitySink>,
}

pub struct ExternalDataLayerConfig<'a> {
    pub cache: CacheConfig,
    pub news: &'a ExternalSourceConfig,
    pub polling: &'a ExternalSourceConfig,
    pub social: &'a ExternalSourceConfig,
    pub breaker: &'a CircuitBreakerConfig,
    pub rate_limit: &'a RateLimitConfig,
    pub retry: &'a RetryConfig,
}

impl ExternalDataLayer {
    pub fn new(
        config: ExternalDataLayerConfig<'_>,
        clock: SharedClock,
        news_provider: Option<Arc<dyn NewsProvider>>,
        polling_provider: Option<Arc<dyn PollingProvider>>,
        social_provider: Option<Arc<dyn SocialProvider>>,
        observability: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self {
            news: Policy::new(config.cache.clone(), config.news, config.breaker, config.rate_limit, config.retry, clock.clone()),
            news_provider,
            polling: Policy::new(config.cache.clone(), config.polling, config.breaker, config.rate_limit, config.retry, clock.clone()),
            polling_provider,
            social: Policy::new(config.cache.clone(), config.social, config.breaker, config.rate_limit, config.retry, clock),
            social_provider,
            observability,
        }
    }

    pub async fn fetch_news(&self, condition_id: &str, market_question: &str, window: ChronoDuration) -> Vec<NewsArticle> {
        let key = cache_key("news", condition_id, &[("window_secs", vec![window.num_seconds().to_string()])]);
        let start = Instant::now();

        let call = self.news_provider.clone().map(|provider| {
            let question = market_question.to_string();
            move || {
                let provider = provider.clone();
                let question = question.clone();
                async move { provider.fetch_news(&question, window).await }
            }
        });

        let result = run_policy(&self.news, &key, call).await;
        let item_count = result.value.as_ref().map_or(0, |v| v.len());
        self.observability
            .record_fetch(
                condition_id,
                "news",
                self.news.provider_name.as_deref(),
                result.cached,
                result.stale,
                item_count,
                start.elapsed().as_millis() as u64,
                result.error.as_deref(),
            )
            .await;
        result.value.unwrap_or_default()
    }

    pub async fn fetch_polling(&self, condition_id: &str, market_question: &str) -> Option<Vec<PollingSnapshot>> {
        let key = cache_key("polling", condition_id, &[]);
        let start = Instant::now();

        let call = self.polling_provider.clone().map(|provider| {
            let question = market_question.to_string();
            move || {
                let provider = provider.clone();
                let question = question.clone();
                async move { provider.fetch_polling(&question).await }
            }
        });

        let result = run_policy(&self.polling, &key, call).await;
        let item_count = result.value.as_ref().map_or(0, |v| v.len());
        self.observability
            .record_fetch(
                condition_id,
                "polling",
                self.polling.provider_name.as_deref(),
                result.cached,
                result.stale,
                item_count,
                start.elapsed().as_millis() as u64,
                result.error.as_deref(),
            )
            .await;
        result.value
    }

    pub async fn fetch_social(&self, condition_id: &str, market_question: &str, platforms: &[String]) -> Option<Vec<SocialMention>> {
        let key = cache_key("social", condition_id, &[("platforms", platforms.to_vec())]);
        let start = Instant::now();

        let call = self.social_provider.clone().map(|provider| {
            let question = market_question.to_string();
            let platforms = platforms.to_vec();
            move || {
                let provider = provider.clone();
                let question = question.clone();
                let platforms = platforms.clone();
                async move { provider.fetch_social(&question, &platforms).await }
            }
        });

        let result = run_policy(&self.social, &key, call).await;
        let item_count = result.value.as_ref().map_or(0, |v| v.len());
        self.observability
            .record_fetch(
                condition_id,
                "social",
                self.social.provider_name.as_deref(),
                result.cached,
                result.stale,
                item_count,
                start.elapsed().as_millis() as u64,
                result.error.as_deref(),
            )
            .await;
        result.value
    }

    pub fn check_availability(&self, source: &str) -> bool {
        match source {
            "news" => self.news_provider.is_some() && self.news.breaker.permits_call(),
            "polling" => self.polling_provider.is_some() && self.polling.breaker.permits_call(),
            "social" => self.social_provider.is_some() && self.social.breaker.permits_call(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::config::{CircuitBreakerConfig, RateLimitConfig, RetryConfig};
    use crate::interfaces::observability::TracingObservabilitySink;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyNewsProvider {
        calls: Arc<AtomicU32>,
        fail_first_n: u32,
    }

    #[async_trait]
    impl NewsProvider for FlakyNewsProvider {
        async fn fetch_news(&self, _market_question: &str, _window: ChronoDuration) -> Result<Vec<NewsArticle>, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                Err(ProviderError::Timeout)
            } else {
                Ok(vec![NewsArticle {
                    title: "headline".into(),
                    source: "wire".into(),
                    published_at: Utc::now(),
                    url: "https://example.com".into(),
                    relevance_score: 0.8,
                    summary: "summary".into(),
                }])
            }
        }
    }

    fn layer_with_provider(provider: Arc<dyn NewsProvider>) -> ExternalDataLayer {
        let clock: SharedClock = Arc::new(FakeClock::new(Utc::now()));
        let cache = CacheConfig::default();
        let news_source = ExternalSourceConfig::default();
        let polling_source = ExternalSourceConfig::default();
        let social_source = ExternalSourceConfig::default();
        let breaker = CircuitBreakerConfig::default();
        let rate_limit = RateLimitConfig::default();
        let retry = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        };
        ExternalDataLayer::new(
            ExternalDataLayerConfig {
                cache,
                news: &news_source,
                polling: &polling_source,
                social: &social_source,
                breaker: &breaker,
                rate_limit: &rate_limit,
                retry: &retry,
            },
            clock,
            Some(provider),
            None,
            None,
            Arc::new(TracingObservabilitySink),
        )
    }

    #[tokio::test]
    async fn fresh_fetch_then_cache_hit_skips_provider() {
        let calls = Arc::new(AtomicU32::new(0));
        let layer = layer_with_provider(Arc::new(FlakyNewsProvider { calls: calls.clone(), fail_first_n: 0 }));

        let first = layer.fetch_news("cond-1", "will it happen?", ChronoDuration::hours(24)).await;
        assert_eq!(first.len(), 1);
        let second = layer.fetch_news("cond-1", "will it happen?", ChronoDuration::hours(24)).await;
        assert_eq!(second.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_provider_configured_returns_empty_with_no_cache() {
        let clock: SharedClock = Arc::new(FakeClock::new(Utc::now()));
        let cache = CacheConfig::default();
        let source = ExternalSourceConfig::default();
        let breaker = CircuitBreakerConfig::default();
        let rate_limit = RateLimitConfig::default();
        let retry = RetryConfig::default();
        let layer = ExternalDataLayer::new(
            ExternalDataLayerConfig {
                cache,
                news: &source,
                polling: &source,
                social: &source,
                breaker: &breaker,
                rate_limit: &rate_limit,
                retry: &retry,
            },
            clock,
            None,
            None,
            None,
            Arc::new(TracingObservabilitySink),
        );
        let result = layer.fetch_news("cond-2", "anything?", ChronoDuration::hours(24)).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn concurrent_fetches_for_same_key_coalesce_to_one_provider_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let layer = Arc::new(layer_with_provider(Arc::new(FlakyNewsProvider { calls: calls.clone(), fail_first_n: 0 })));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let layer = layer.clone();
            handles.push(tokio::spawn(async move {
                layer.fetch_news("cond-3", "same question", ChronoDuration::hours(24)).await
            }));
        }
        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
