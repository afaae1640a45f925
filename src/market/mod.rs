//! Concrete [`MarketClient`](crate::interfaces::MarketClient) adapter for
//! the production binary.

mod polymarket;

pub use polymarket::PolymarketClient;
