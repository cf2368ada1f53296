// =============================================================================
// Exchange adapter contract
// =============================================================================
//
// The core never talks to a venue directly; it consumes this narrow trait.
// Real venue clients live outside the core. `SimExchange` implements the same
// contract over a synthetic random-walk market for paper trading and tests.
// =============================================================================

pub mod sim;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VigilError;
use crate::market_data::Candle;

pub use sim::SimExchange;

/// Per-asset balance as reported by the venue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AssetBalance {
    pub free: f64,
    pub used: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopLossLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Rejected,
}

/// An order to be placed on the venue.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    /// Limit price; `None` for market orders.
    pub price: Option<f64>,
}

/// Venue acknowledgement of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub id: String,
    pub average_price: Option<f64>,
    pub status: OrderStatus,
    pub filled_amount: f64,
}

/// Latest traded price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ticker {
    pub last: f64,
}

/// Minimal market-data + order contract consumed by the core.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, VigilError>;

    async fn fetch_balance(&self) -> Result<HashMap<String, AssetBalance>, VigilError>;

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderResult, VigilError>;

    async fn cancel_order(&self, order_id: &str, symbol: &str) -> Result<bool, VigilError>;

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, VigilError>;
}
