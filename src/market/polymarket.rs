//! Polymarket `MarketClient` adapter: Gamma API for market metadata plus the
//! CLOB REST API for best bid/ask, following the same lookup-then-orderbook
//! shape as the teacher's `scrapers::polymarket_gamma::gamma_market_lookup`
//! and `api::simple`'s combined Gamma+CLOB fetch, generalized from a
//! slug-keyed lookup to a `condition_id`-keyed one and wrapped in the retry
//! policy shared with the rest of the external-data layer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::Deserializer, Deserialize};
use serde_json::Value;

use crate::config::RetryConfig;
use crate::error::{IngestionError, ProviderError};
use crate::external::retry_with_backoff;
use crate::interfaces::{MarketClient, MarketSummary, RawMarket, ResolutionOutcome, ResolutionStatus};

const GAMMA_BASE: &str = "https://gamma-api.polymarket.com";
const CLOB_BASE: &str = "https://clob.polymarket.com";
const USER_AGENT: &str = "oracle-consensus/0.1";

pub struct PolymarketClient {
    http: reqwest::Client,
    retry: RetryConfig,
    request_timeout: Duration,
}

impl PolymarketClient {
    pub fn new(http: reqwest::Client, retry: RetryConfig, request_timeout: Duration) -> Self {
        Self { http, retry, request_timeout }
    }

    async fn gamma_lookup_by_condition_id(&self, condition_id: &str) -> Result<Option<GammaMarket>, ProviderError> {
        let body = retry_with_backoff(&self.retry, || async {
            let response = self
                .http
                .get(format!("{GAMMA_BASE}/markets"))
                .timeout(self.request_timeout)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .query(&[("condition_ids", condition_id), ("limit", "1")])
                .send()
                .await
                .map_err(classify_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(classify_status(status.as_u16()));
            }
            response.text().await.map_err(classify_reqwest_error)
        })
        .await?;

        let markets: Vec<GammaMarket> = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(condition_id, error = %e, body_preview = %body.chars().take(300).collect::<String>(), "gamma markets json parse failed");
            ProviderError::Network(e.to_string())
        })?;
        Ok(markets.into_iter().next())
    }

    async fn fetch_book(&self, token_id: &str) -> Result<OrderBook, ProviderError> {
        retry_with_backoff(&self.retry, || async {
            let response = self
                .http
                .get(format!("{CLOB_BASE}/book"))
                .timeout(self.request_timeout)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .query(&[("token_id", token_id)])
                .send()
                .await
                .map_err(classify_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(classify_status(status.as_u16()));
            }
            response.json::<OrderBook>().await.map_err(classify_reqwest_error)
        })
        .await
    }
}

#[async_trait]
impl MarketClient for PolymarketClient {
    async fn fetch_market_data(&self, condition_id: &str) -> Result<RawMarket, IngestionError> {
        let market = self
            .gamma_lookup_by_condition_id(condition_id)
            .await
            .map_err(provider_to_ingestion)?
            .ok_or_else(|| IngestionError::InvalidMarketId(condition_id.to_string()))?;

        let yes_idx = market.outcomes.iter().position(|o| o.eq_ignore_ascii_case("yes")).unwrap_or(0);
        let token_id = market.clob_token_ids.get(yes_idx).cloned();

        let (best_bid, best_ask, bid_sizes, ask_sizes) = match token_id {
            Some(token) => match self.fetch_book(&token).await {
                Ok(book) => {
                    let mut bids = book.bids;
                    let mut asks = book.asks;
                    bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
                    asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
                    (
                        bids.first().map(|o| o.price),
                        asks.first().map(|o| o.price),
                        bids.iter().take(5).map(|o| o.size).collect(),
                        asks.iter().take(5).map(|o| o.size).collect(),
                    )
                }
                Err(err) => {
                    tracing::warn!(condition_id, error = %err, "orderbook fetch failed; proceeding without bid/ask");
                    (None, None, Vec::new(), Vec::new())
                }
            },
            None => (None, None, Vec::new(), Vec::new()),
        };

        let expiry_timestamp = market
            .end_date_iso
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::days(30));

        Ok(RawMarket {
            market_id: market.id.unwrap_or_else(|| market.condition_id.clone()),
            condition_id: market.condition_id,
            question: market.question.unwrap_or_default(),
            resolution_criteria: market.description.unwrap_or_default(),
            expiry_timestamp,
            best_bid,
            best_ask,
            bid_sizes,
            ask_sizes,
            volume_24h: market.volume.unwrap_or(0.0),
        })
    }

    async fn check_market_resolution(&self, condition_id: &str) -> Result<ResolutionStatus, IngestionError> {
        let market = self
            .gamma_lookup_by_condition_id(condition_id)
            .await
            .map_err(provider_to_ingestion)?
            .ok_or_else(|| IngestionError::InvalidMarketId(condition_id.to_string()))?;

        if market.closed != Some(true) {
            return Ok(ResolutionStatus::Unresolved);
        }

        let outcome = market
            .outcome_prices
            .iter()
            .position(|p| *p >= 0.99)
            .and_then(|i| market.outcomes.get(i))
            .map(|label| {
                if label.eq_ignore_ascii_case("yes") {
                    ResolutionOutcome::Yes
                } else if label.eq_ignore_ascii_case("no") {
                    ResolutionOutcome::No
                } else {
                    ResolutionOutcome::Unknown
                }
            })
            .unwrap_or(ResolutionOutcome::Unknown);

        Ok(ResolutionStatus::Resolved { outcome, resolved_at: Utc::now() })
    }

    async fn discover_markets(&self, limit: usize) -> Result<Vec<MarketSummary>, IngestionError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let body = retry_with_backoff(&self.retry, || async {
            let response = self
                .http
                .get(format!("{GAMMA_BASE}/markets"))
                .timeout(self.request_timeout)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .query(&[("active", "true"), ("closed", "false"), ("order", "volume24hr"), ("ascending", "false"), ("limit", &limit.to_string())])
                .send()
                .await
                .map_err(classify_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(classify_status(status.as_u16()));
            }
            response.text().await.map_err(classify_reqwest_error)
        })
        .await
        .map_err(provider_to_ingestion)?;

        let markets: Vec<GammaMarket> = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(error = %e, body_preview = %body.chars().take(300).collect::<String>(), "gamma discovery json parse failed");
            IngestionError::ApiUnavailable
        })?;

        Ok(markets
            .into_iter()
            .map(|m| MarketSummary {
                market_id: m.id.clone().unwrap_or_else(|| m.condition_id.clone()),
                condition_id: m.condition_id,
                question: m.question.unwrap_or_default(),
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        self.http
            .get(format!("{GAMMA_BASE}/markets"))
            .timeout(self.request_timeout)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[("limit", "1")])
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

fn provider_to_ingestion(err: ProviderError) -> IngestionError {
    match err {
        ProviderError::Http { status: 429, .. } => IngestionError::RateLimitExceeded,
        _ => IngestionError::ApiUnavailable,
    }
}

fn classify_status(status: u16) -> ProviderError {
    ProviderError::Http { status, message: format!("gamma/clob request returned {status}") }
}

fn classify_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GammaMarket {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "conditionId")]
    condition_id: String,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "endDateIso", default, alias = "end_date_iso")]
    end_date_iso: Option<String>,
    #[serde(default, deserialize_with = "de_string_f64_opt")]
    volume: Option<f64>,
    #[serde(default)]
    closed: Option<bool>,
    #[serde(default, deserialize_with = "de_string_vec")]
    outcomes: Vec<String>,
    #[serde(rename = "clobTokenIds", default, deserialize_with = "de_string_vec")]
    clob_token_ids: Vec<String>,
    #[serde(rename = "outcomePrices", default, deserialize_with = "de_string_f64_vec")]
    outcome_prices: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct OrderBook {
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Deserialize)]
struct BookLevel {
    #[serde(deserialize_with = "de_f64")]
    price: f64,
    #[serde(deserialize_with = "de_f64")]
    size: f64,
}

fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| serde::de::Error::custom("invalid number")),
        Value::String(s) => s.parse::<f64>().map_err(|_| serde::de::Error::custom("invalid float string")),
        _ => Err(serde::de::Error::custom("expected string or number")),
    }
}

/// Gamma returns `outcomes`/`clobTokenIds` as either a real JSON array or a
/// JSON-encoded string depending on endpoint, so both shapes are tolerated.
fn de_string_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    let result = match v {
        Value::Array(arr) => arr
            .into_iter()
            .filter_map(|x| match x {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => serde_json::from_str::<Vec<String>>(&s).unwrap_or_default(),
        _ => Vec::new(),
    };
    Ok(result)
}

fn de_string_f64_vec<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    let raw: Vec<String> = match v {
        Value::Array(arr) => arr
            .into_iter()
            .filter_map(|x| match x {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => serde_json::from_str::<Vec<String>>(&s).unwrap_or_default(),
        _ => Vec::new(),
    };
    Ok(raw.into_iter().filter_map(|s| s.parse::<f64>().ok()).collect())
}

fn de_string_f64_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn de_string_vec_handles_both_array_and_encoded_string_forms() {
        let array: GammaMarket = serde_json::from_value(serde_json::json!({
            "conditionId": "0xabc",
            "outcomes": ["Yes", "No"],
            "clobTokenIds": ["1", "2"],
        }))
        .unwrap();
        assert_eq!(array.outcomes, vec!["Yes", "No"]);

        let encoded: GammaMarket = serde_json::from_value(serde_json::json!({
            "conditionId": "0xdef",
            "outcomes": "[\"Yes\",\"No\"]",
            "clobTokenIds": "[\"1\",\"2\"]",
        }))
        .unwrap();
        assert_eq!(encoded.outcomes, vec!["Yes", "No"]);
    }

    #[test]
    fn de_string_f64_vec_parses_stringified_outcome_prices() {
        let market: GammaMarket = serde_json::from_value(serde_json::json!({
            "conditionId": "0xabc",
            "outcomePrices": "[\"0.97\", \"0.03\"]",
        }))
        .unwrap();
        assert_eq!(market.outcome_prices, vec![0.97, 0.03]);
    }

    #[test]
    fn de_string_f64_opt_treats_empty_string_as_none() {
        let market: GammaMarket = serde_json::from_value(serde_json::json!({
            "conditionId": "0xabc",
            "volume": "",
        }))
        .unwrap();
        assert_eq!(market.volume, None);
    }
}
