// =============================================================================
// Execution Engine — order routing with paper-mode simulation and retries
// =============================================================================
//
// Every adapter interaction flows through here so API health is tracked in
// one place: each timeout or error bumps the consecutive-failure counter
// consumed by the sentinel and the circuit breaker; any success resets it.
//
// Paper mode never touches the adapter for orders: fills are synthesized
// locally at the reference price. Fees are modelled identically in both
// modes.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::VigilError;
use crate::exchange::{
    AssetBalance, ExchangeAdapter, OrderRequest, OrderResult, OrderStatus, Ticker,
};
use crate::market_data::Candle;

/// Bounded timeout for any single exchange call.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Order retry policy: linear backoff, attempt * base delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// How an order was satisfied.
#[derive(Debug, Clone, Serialize)]
pub enum ExecutionOutcome {
    /// Placed on the live venue.
    Placed(OrderResult),
    /// Filled by the local paper simulation.
    Simulated(OrderResult),
}

impl ExecutionOutcome {
    pub fn order(&self) -> &OrderResult {
        match self {
            Self::Placed(o) | Self::Simulated(o) => o,
        }
    }
}

pub struct ExecutionEngine {
    adapter: Arc<dyn ExchangeAdapter>,
    paper_trading: bool,
    fee_percent: f64,
    retry: RetryPolicy,
    consecutive_failures: AtomicU32,
}

impl ExecutionEngine {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>, paper_trading: bool, fee_percent: f64) -> Self {
        Self {
            adapter,
            paper_trading,
            fee_percent,
            retry: RetryPolicy::default(),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn paper_trading(&self) -> bool {
        self.paper_trading
    }

    /// Consecutive failed or timed-out exchange calls since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Fee charged on a fill of the given notional value.
    pub fn fee_for_notional(&self, notional: f64) -> f64 {
        notional.abs() * self.fee_percent / 100.0
    }

    // -------------------------------------------------------------------------
    // Market data (timeout + failure tracking)
    // -------------------------------------------------------------------------

    pub async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, VigilError> {
        self.tracked(self.adapter.fetch_ohlcv(symbol, timeframe, limit))
            .await
    }

    pub async fn fetch_balance(&self) -> Result<HashMap<String, AssetBalance>, VigilError> {
        self.tracked(self.adapter.fetch_balance()).await
    }

    pub async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, VigilError> {
        self.tracked(self.adapter.fetch_ticker(symbol)).await
    }

    async fn tracked<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, VigilError>>,
    ) -> Result<T, VigilError> {
        match tokio::time::timeout(EXCHANGE_TIMEOUT, call).await {
            Ok(Ok(value)) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                Ok(value)
            }
            Ok(Err(e)) => {
                self.record_failure();
                Err(e)
            }
            Err(_) => {
                self.record_failure();
                Err(VigilError::execution("exchange call timed out"))
            }
        }
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(consecutive_failures = failures, "exchange call failed");
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Submit an order. Paper mode fills locally at `reference_price`; live
    /// mode forwards to the venue with retries and linear backoff.
    pub async fn submit_order(
        &self,
        request: &OrderRequest,
        reference_price: f64,
    ) -> Result<ExecutionOutcome, VigilError> {
        if self.paper_trading {
            let fill_price = request.price.unwrap_or(reference_price);
            let order = OrderResult {
                id: format!("paper-{}", Uuid::new_v4()),
                average_price: Some(fill_price),
                status: OrderStatus::Closed,
                filled_amount: request.amount,
            };
            info!(
                symbol = %request.symbol,
                side = %request.side,
                fill_price,
                amount = request.amount,
                "paper fill"
            );
            return Ok(ExecutionOutcome::Simulated(order));
        }

        let mut last_err: Option<VigilError> = None;
        for attempt in 1..=self.retry.max_attempts {
            match self.tracked(self.adapter.create_order(request)).await {
                Ok(order) => {
                    if order.status == OrderStatus::Rejected {
                        return Err(VigilError::Execution {
                            message: "order rejected by venue".into(),
                            order_id: Some(order.id),
                        });
                    }
                    info!(
                        symbol = %request.symbol,
                        side = %request.side,
                        order_id = %order.id,
                        attempt,
                        "order placed"
                    );
                    return Ok(ExecutionOutcome::Placed(order));
                }
                Err(e) => {
                    warn!(
                        symbol = %request.symbol,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "order attempt failed"
                    );
                    last_err = Some(e);
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff * attempt).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| VigilError::execution("order retries exhausted")))
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("paper_trading", &self.paper_trading)
            .field("fee_percent", &self.fee_percent)
            .field("consecutive_failures", &self.consecutive_failures())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{OrderSide, OrderType};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    /// Adapter stub whose calls fail while `failing` is set.
    struct FlakyAdapter {
        failing: AtomicBool,
        calls: AtomicU32,
    }

    impl FlakyAdapter {
        fn new(failing: bool) -> Self {
            Self {
                failing: AtomicBool::new(failing),
                calls: AtomicU32::new(0),
            }
        }

        fn result<T>(&self, value: T) -> Result<T, VigilError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(VigilError::execution("synthetic failure"))
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl ExchangeAdapter for FlakyAdapter {
        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _limit: usize,
        ) -> Result<Vec<Candle>, VigilError> {
            self.result(Vec::new())
        }

        async fn fetch_balance(&self) -> Result<HashMap<String, AssetBalance>, VigilError> {
            self.result(HashMap::new())
        }

        async fn create_order(&self, request: &OrderRequest) -> Result<OrderResult, VigilError> {
            self.result(OrderResult {
                id: "live-1".into(),
                average_price: request.price,
                status: OrderStatus::Closed,
                filled_amount: request.amount,
            })
        }

        async fn cancel_order(&self, _order_id: &str, _symbol: &str) -> Result<bool, VigilError> {
            self.result(true)
        }

        async fn fetch_ticker(&self, _symbol: &str) -> Result<Ticker, VigilError> {
            self.result(Ticker { last: 100.0 })
        }
    }

    fn order_request() -> OrderRequest {
        OrderRequest {
            symbol: "BTCUSDT".into(),
            order_type: OrderType::Market,
            side: OrderSide::Buy,
            amount: 1.0,
            price: None,
        }
    }

    #[tokio::test]
    async fn paper_mode_fills_locally() {
        let adapter = Arc::new(FlakyAdapter::new(true)); // would fail if called
        let engine = ExecutionEngine::new(adapter.clone(), true, 0.1);

        let outcome = engine.submit_order(&order_request(), 123.0).await.unwrap();
        match outcome {
            ExecutionOutcome::Simulated(order) => {
                assert_eq!(order.average_price, Some(123.0));
                assert_eq!(order.filled_amount, 1.0);
                assert!(order.id.starts_with("paper-"));
            }
            ExecutionOutcome::Placed(_) => panic!("paper mode must not place live orders"),
        }
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn live_mode_retries_then_gives_up() {
        let adapter = Arc::new(FlakyAdapter::new(true));
        let engine = ExecutionEngine::new(adapter.clone(), false, 0.1);

        let result = engine.submit_order(&order_request(), 100.0).await;
        assert!(result.is_err());
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.consecutive_failures(), 3);
    }

    #[tokio::test]
    async fn live_mode_success_resets_failures() {
        let adapter = Arc::new(FlakyAdapter::new(true));
        let engine = ExecutionEngine::new(adapter.clone(), false, 0.1);

        let _ = engine.fetch_ticker("BTCUSDT").await;
        assert_eq!(engine.consecutive_failures(), 1);

        adapter.failing.store(false, Ordering::SeqCst);
        let outcome = engine.submit_order(&order_request(), 100.0).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Placed(_)));
        assert_eq!(engine.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn failure_counter_accumulates_across_calls() {
        let adapter = Arc::new(FlakyAdapter::new(true));
        let engine = ExecutionEngine::new(adapter, false, 0.1);

        let _ = engine.fetch_ohlcv("BTCUSDT", "5m", 10).await;
        let _ = engine.fetch_balance().await;
        assert_eq!(engine.consecutive_failures(), 2);
    }

    #[test]
    fn fees_are_proportional() {
        let adapter = Arc::new(FlakyAdapter::new(false));
        let engine = ExecutionEngine::new(adapter, true, 0.1);
        assert!((engine.fee_for_notional(1000.0) - 1.0).abs() < 1e-10);
        assert!((engine.fee_for_notional(-500.0) - 0.5).abs() < 1e-10);
    }
}
