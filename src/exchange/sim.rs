// =============================================================================
// SimExchange — synthetic random-walk venue for paper trading and tests
// =============================================================================
//
// Implements the full adapter contract without any network: prices follow a
// bounded random walk, orders fill instantly at the synthetic price, and a
// small ledger tracks the quote balance. Good enough to drive the whole
// decision loop end-to-end in paper mode.
// =============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::error::VigilError;
use crate::exchange::{
    AssetBalance, ExchangeAdapter, OrderRequest, OrderResult, OrderSide, OrderStatus, OrderType,
    Ticker,
};
use crate::market_data::Candle;

/// Per-step volatility of the synthetic walk, as a fraction of price.
const STEP_VOLATILITY: f64 = 0.002;

struct SimState {
    price: f64,
    quote_balance: f64,
    base_balance: f64,
}

pub struct SimExchange {
    state: RwLock<SimState>,
    quote_asset: String,
}

impl SimExchange {
    pub fn new(start_price: f64, quote_balance: f64) -> Self {
        Self {
            state: RwLock::new(SimState {
                price: start_price,
                quote_balance,
                base_balance: 0.0,
            }),
            quote_asset: "USDT".to_string(),
        }
    }

    /// Advance the walk by one step and return the new price.
    fn step_price(&self) -> f64 {
        let mut s = self.state.write();
        let drift: f64 = rand::thread_rng().gen_range(-STEP_VOLATILITY..=STEP_VOLATILITY);
        s.price *= 1.0 + drift;
        s.price
    }

    fn timeframe_millis(timeframe: &str) -> Result<i64, VigilError> {
        match timeframe {
            "1m" => Ok(60_000),
            "5m" => Ok(300_000),
            "15m" => Ok(900_000),
            "1h" => Ok(3_600_000),
            "4h" => Ok(14_400_000),
            "1d" => Ok(86_400_000),
            other => Err(VigilError::Data(format!("unsupported timeframe: {other}"))),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for SimExchange {
    /// Generate `limit` closed candles ending at the current synthetic price.
    /// The walk runs backwards from the present so consecutive fetches stay
    /// roughly consistent at the tail.
    async fn fetch_ohlcv(
        &self,
        _symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, VigilError> {
        let frame_ms = Self::timeframe_millis(timeframe)?;
        let end_price = self.step_price();
        let now_ms = Utc::now().timestamp_millis();
        let aligned_end = now_ms - now_ms.rem_euclid(frame_ms);

        let mut rng = rand::thread_rng();
        // Walk backwards from the current price.
        let mut closes = Vec::with_capacity(limit.max(1));
        let mut prev = end_price;
        closes.push(prev);
        for _ in 1..limit {
            prev /= 1.0 + rng.gen_range(-STEP_VOLATILITY..=STEP_VOLATILITY);
            closes.push(prev);
        }
        closes.reverse();

        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let ts = aligned_end - frame_ms * (limit - i) as i64;
                let wiggle = close * STEP_VOLATILITY;
                let open = if i == 0 { close } else { closes[i - 1] };
                let high = open.max(close) + wiggle;
                let low = open.min(close) - wiggle;
                Candle::from_raw(ts, open, high, low, close, rng.gen_range(50.0..500.0))
            })
            .collect();

        Ok(candles)
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, AssetBalance>, VigilError> {
        let s = self.state.read();
        let mut balances = HashMap::new();
        balances.insert(
            self.quote_asset.clone(),
            AssetBalance {
                free: s.quote_balance,
                used: 0.0,
                total: s.quote_balance,
            },
        );
        Ok(balances)
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderResult, VigilError> {
        if request.amount <= 0.0 {
            return Err(VigilError::execution("order amount must be positive"));
        }

        let fill_price = match request.order_type {
            OrderType::Market => self.state.read().price,
            OrderType::Limit | OrderType::StopLossLimit => request
                .price
                .ok_or_else(|| VigilError::execution("limit order requires a price"))?,
        };

        let notional = request.amount * fill_price;
        {
            let mut s = self.state.write();
            match request.side {
                OrderSide::Buy => {
                    if s.quote_balance < notional {
                        return Err(VigilError::execution(format!(
                            "insufficient balance: {:.2} < {notional:.2}",
                            s.quote_balance
                        )));
                    }
                    s.quote_balance -= notional;
                    s.base_balance += request.amount;
                }
                OrderSide::Sell => {
                    s.quote_balance += notional;
                    s.base_balance -= request.amount;
                }
            }
        }

        let result = OrderResult {
            id: Uuid::new_v4().to_string(),
            average_price: Some(fill_price),
            status: OrderStatus::Closed,
            filled_amount: request.amount,
        };
        debug!(
            symbol = %request.symbol,
            side = %request.side,
            fill_price,
            amount = request.amount,
            "sim order filled"
        );
        Ok(result)
    }

    async fn cancel_order(&self, _order_id: &str, _symbol: &str) -> Result<bool, VigilError> {
        // Fills are instantaneous; there is never anything to cancel.
        Ok(false)
    }

    async fn fetch_ticker(&self, _symbol: &str) -> Result<Ticker, VigilError> {
        Ok(Ticker {
            last: self.state.read().price,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ohlcv_has_requested_shape() {
        let sim = SimExchange::new(50_000.0, 10_000.0);
        let candles = sim.fetch_ohlcv("BTCUSDT", "5m", 100).await.unwrap();
        assert_eq!(candles.len(), 100);

        // Strictly increasing timestamps, valid OHLC ordering.
        for pair in candles.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        for c in &candles {
            c.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn unsupported_timeframe_is_an_error() {
        let sim = SimExchange::new(50_000.0, 10_000.0);
        assert!(sim.fetch_ohlcv("BTCUSDT", "7m", 10).await.is_err());
    }

    #[tokio::test]
    async fn market_order_moves_the_ledger() {
        let sim = SimExchange::new(100.0, 1_000.0);
        let result = sim
            .create_order(&OrderRequest {
                symbol: "BTCUSDT".into(),
                order_type: OrderType::Market,
                side: OrderSide::Buy,
                amount: 2.0,
                price: None,
            })
            .await
            .unwrap();

        assert_eq!(result.status, OrderStatus::Closed);
        assert_eq!(result.filled_amount, 2.0);

        let balances = sim.fetch_balance().await.unwrap();
        let quote = balances.get("USDT").unwrap();
        assert!(quote.free < 1_000.0);
    }

    #[tokio::test]
    async fn oversized_buy_is_rejected() {
        let sim = SimExchange::new(100.0, 50.0);
        let err = sim
            .create_order(&OrderRequest {
                symbol: "BTCUSDT".into(),
                order_type: OrderType::Market,
                side: OrderSide::Buy,
                amount: 10.0,
                price: None,
            })
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn ticker_tracks_walk() {
        let sim = SimExchange::new(100.0, 1_000.0);
        let t = sim.fetch_ticker("BTCUSDT").await.unwrap();
        assert!(t.last > 0.0);
    }
}
