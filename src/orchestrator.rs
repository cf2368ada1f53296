// =============================================================================
// Orchestrator — the periodic decision loop
// =============================================================================
//
// One tick, in order: kill-switch gates -> ingest candles -> indicators +
// trend -> advisory committee -> circuit breaker -> exits -> entry -> journal.
// Everything that mutates shared state happens on this one task; the only
// suspension points are exchange calls and the inter-tick sleep.
//
// The loop never queues missed ticks: the next tick starts one interval
// after the previous tick *ends*. A failed tick is logged, journalled, and
// the loop carries on.
// =============================================================================

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::advisory::contracts::{ExchangeStatus, RegimeInput, SentinelInput};
use crate::advisory::{AdvisoryCommittee, AdvisoryVerdict};
use crate::alerts::AlertSink;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::VigilError;
use crate::events::{EventBus, EventType};
use crate::exchange::{OrderRequest, OrderSide, OrderType};
use crate::execution::ExecutionEngine;
use crate::journal::{TradeJournal, TradeRecord};
use crate::market_data::OhlcvBuffer;
use crate::persistence::AuditLogger;
use crate::position::{Position, PositionManager};
use crate::risk::{
    calculate_position_size, first_failure, validate_trade_request, CircuitBreaker, EmergencyStop,
    RiskEngine, SafetyConstraints, SystemState, TradeRequest,
};
use crate::strategy::{evaluate_entry, evaluate_exit, EntryParams, EntrySignal, ExitReason};
use crate::trend::analyze_trend;
use crate::types::TradeSide;

/// Fills tracked for the rolling slippage average fed to the sentinel.
const SLIPPAGE_WINDOW: usize = 10;
/// Largest share of the balance one position's notional may take. Sizing is
/// clamped here before validation so tight stops cannot balloon notional.
const MAX_NOTIONAL_FRACTION: f64 = 0.25;

pub struct TradeLoop {
    pub config: Config,
    pub execution: Arc<ExecutionEngine>,
    pub positions: Arc<PositionManager>,
    pub risk: Arc<RiskEngine>,
    pub breaker: Arc<CircuitBreaker>,
    pub emergency: Arc<EmergencyStop>,
    pub committee: AdvisoryCommittee,
    pub safety: SafetyConstraints,
    pub journal: Arc<TradeJournal>,
    pub audit: Arc<dyn AuditLogger>,
    pub events: Arc<EventBus>,
    pub alerts: Arc<AlertSink>,
    pub clock: Arc<dyn Clock>,

    buffer_1h: OhlcvBuffer,
    buffer_5m: OhlcvBuffer,
    /// Starting balance plus realised PnL minus fees; the sentinel compares
    /// the venue balance against this.
    expected_balance: f64,
    recent_slippage_bps: Vec<f64>,
    /// Set when the market-data fetch failed this tick.
    fetch_degraded: bool,
}

impl TradeLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        execution: Arc<ExecutionEngine>,
        positions: Arc<PositionManager>,
        risk: Arc<RiskEngine>,
        breaker: Arc<CircuitBreaker>,
        emergency: Arc<EmergencyStop>,
        committee: AdvisoryCommittee,
        safety: SafetyConstraints,
        journal: Arc<TradeJournal>,
        audit: Arc<dyn AuditLogger>,
        events: Arc<EventBus>,
        alerts: Arc<AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let buffer_1h = OhlcvBuffer::new(config.trend_candle_limit);
        let buffer_5m = OhlcvBuffer::new(config.entry_candle_limit);
        let expected_balance = config.starting_balance;
        Self {
            config,
            execution,
            positions,
            risk,
            breaker,
            emergency,
            committee,
            safety,
            journal,
            audit,
            events,
            alerts,
            clock,
            buffer_1h,
            buffer_5m,
            expected_balance,
            recent_slippage_bps: Vec::new(),
            fetch_degraded: false,
        }
    }

    // -------------------------------------------------------------------------
    // Main loop
    // -------------------------------------------------------------------------

    /// Run until the shutdown signal flips, then drain via `shutdown()`.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            symbol = %self.config.symbol,
            interval_secs = self.config.loop_interval_secs,
            paper = self.execution.paper_trading(),
            "trade loop starting"
        );

        loop {
            self.tick().await;

            let sleep = tokio::time::sleep(std::time::Duration::from_secs(
                self.config.loop_interval_secs,
            ));
            tokio::select! {
                _ = sleep => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
        }

        self.shutdown().await;
    }

    /// One tick. Never propagates errors: a bad tick is recorded and the
    /// loop moves on.
    pub async fn tick(&mut self) {
        if let Err(e) = self.run_tick().await {
            error!(error = %e, "tick failed");
            self.journal.log_error(&e.to_string());
            self.events.publish(
                EventType::ErrorOccurred,
                serde_json::json!({ "error": e.to_string() }),
                "orchestrator",
            );
        }
    }

    async fn run_tick(&mut self) -> Result<(), VigilError> {
        // --- 1-2. Kill-switch gates ------------------------------------------
        if self.emergency.is_active() {
            debug!("emergency stop active; tick skipped");
            return Ok(());
        }
        if self.breaker.is_tripped() {
            debug!("circuit breaker tripped; tick skipped");
            return Ok(());
        }

        // Risk-engine latched emergency propagates to the process kill switch.
        if self.risk.emergency_active() {
            let reason = self
                .risk
                .emergency_reason()
                .unwrap_or_else(|| "risk limit breach".into());
            if self.config.emergency_stop_enabled && self.emergency.trigger(&reason, "risk_engine")
            {
                self.alerts.risk_alert(&reason);
                self.audit
                    .log("emergency_stop", "TRIGGERED", &reason, None);
            }
            return Ok(());
        }

        // --- 3. Ingest market data -------------------------------------------
        if let Err(e) = self.ingest_candles().await {
            // The breaker must still see the failure telemetry.
            self.fetch_degraded = true;
            self.check_breaker(0.0, 0.0);
            return Err(e);
        }
        self.fetch_degraded = false;

        // --- 4. Indicators + trend -------------------------------------------
        let closes_1h = self.buffer_1h.closes();
        let trend = analyze_trend(
            &closes_1h,
            self.config.strategy.ema_fast,
            self.config.strategy.ema_slow,
        )?;
        self.events.publish(
            EventType::TrendDetected,
            serde_json::json!({
                "bias": trend.bias.to_string(),
                "spread_percent": trend.spread_percent,
            }),
            "trend_detector",
        );

        // --- Balance refresh --------------------------------------------------
        let balance = self.current_balance().await?;
        self.risk.update_balance(balance);

        // --- 5. Advisory committee -------------------------------------------
        let account = self
            .risk
            .account_state(balance, self.positions.open_count());
        let verdict = self.run_advisory(trend.spread_percent, balance, &account);

        // --- Circuit breaker gate --------------------------------------------
        let discrepancy = self.balance_discrepancy_percent(balance);
        let tripped_now = self.check_breaker_with_verdict(&verdict, account.current_drawdown_percent, discrepancy);
        if tripped_now {
            let snap = self.breaker.snapshot();
            let err = VigilError::CircuitBreaker {
                trip_reason: snap.trip_reason.unwrap_or_default(),
            };
            self.alerts.risk_alert(&err.to_string());
            self.audit.log("circuit_breaker", "TRIPPED", &err.to_string(), None);
            self.journal.log_error(&err.to_string());
        }

        // --- 6. Exits (always evaluated, even when freshly tripped) ----------
        self.manage_positions().await;

        // --- 7. Entry ---------------------------------------------------------
        let can_enter = !self.breaker.is_tripped()
            && self.positions.open_count() < self.positions.max_open()
            && verdict.tradeable;
        if can_enter {
            if let Err(e) = self.try_enter(&verdict, balance).await {
                warn!(error = %e, "entry phase failed; treated as no signal");
            }
        }

        // --- 8. Trade state ---------------------------------------------------
        self.journal.update_last_run();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Data ingestion
    // -------------------------------------------------------------------------

    async fn ingest_candles(&mut self) -> Result<(), VigilError> {
        let symbol = self.config.symbol.clone();

        let candles_1h = self
            .execution
            .fetch_ohlcv(&symbol, &self.config.trend_timeframe, self.config.trend_candle_limit)
            .await?;
        let candles_5m = self
            .execution
            .fetch_ohlcv(&symbol, &self.config.entry_timeframe, self.config.entry_candle_limit)
            .await?;

        for candle in candles_1h.iter().chain(candles_5m.iter()) {
            candle.validate()?;
        }

        let new_1h = self.buffer_1h.merge_newer(candles_1h);
        let new_5m = self.buffer_5m.merge_newer(candles_5m);

        let volatility = crate::indicators::volatility_percent(
            &self.buffer_5m.highs(),
            &self.buffer_5m.lows(),
            &self.buffer_5m.closes(),
            self.config.strategy.atr_period,
        );

        self.events.publish(
            EventType::CandleReceived,
            serde_json::json!({
                "symbol": symbol,
                "new_1h": new_1h,
                "new_5m": new_5m,
                "volatility_percent": volatility,
            }),
            "ingestion",
        );
        Ok(())
    }

    async fn current_balance(&mut self) -> Result<f64, VigilError> {
        if self.execution.paper_trading() {
            // Paper equity is tracked locally; the venue ledger is synthetic.
            return Ok(self.expected_balance);
        }
        let balances = self.execution.fetch_balance().await?;
        let quote = balances.get("USDT").copied().unwrap_or_default();
        Ok(quote.total)
    }

    fn balance_discrepancy_percent(&self, balance: f64) -> f64 {
        if self.expected_balance <= 0.0 {
            return 0.0;
        }
        (balance - self.expected_balance).abs() / self.expected_balance * 100.0
    }

    // -------------------------------------------------------------------------
    // Advisory
    // -------------------------------------------------------------------------

    fn run_advisory(
        &self,
        ema_spread_percent: f64,
        balance: f64,
        account: &crate::risk::AccountState,
    ) -> AdvisoryVerdict {
        if self.buffer_5m.is_empty() {
            return AdvisoryVerdict::halted("no 5m market data");
        }
        let highs = self.buffer_5m.highs();
        let lows = self.buffer_5m.lows();
        let closes = self.buffer_5m.closes();

        let atr_series = crate::indicators::calculate_atr(
            &highs,
            &lows,
            &closes,
            self.config.strategy.atr_period,
        )
        .unwrap_or_default();
        let atr_percentile = percentile_rank(&atr_series);

        let recent_range_percent = match (
            lows.iter().cloned().fold(f64::INFINITY, f64::min),
            highs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ) {
            (lo, hi) if lo.is_finite() && hi.is_finite() && lo > 0.0 => (hi - lo) / lo * 100.0,
            _ => 0.0,
        };

        let regime_input = RegimeInput {
            atr_percentile,
            ema_spread_percent,
            recent_range_percent,
        };
        let sentinel_input = SentinelInput {
            average_slippage_bps: average(&self.recent_slippage_bps),
            api_error_count: self.execution.consecutive_failures(),
            account_balance: balance,
            expected_balance: self.expected_balance,
            exchange_status: if self.fetch_degraded {
                ExchangeStatus::Degraded
            } else {
                ExchangeStatus::Normal
            },
        };

        let verdict = self.committee.analyze(
            &regime_input,
            account.daily_pnl_percent,
            account.consecutive_losses,
            account.trades_today,
            self.config.risk.max_trades_per_day,
            &sentinel_input,
        );

        if verdict.recommendation == crate::advisory::contracts::TradeRecommendation::Halt {
            self.alerts
                .advisory_alert("HALT", &verdict.reasoning);
        }
        verdict
    }

    // -------------------------------------------------------------------------
    // Circuit breaker
    // -------------------------------------------------------------------------

    fn check_breaker_with_verdict(
        &self,
        verdict: &AdvisoryVerdict,
        drawdown_percent: f64,
        balance_discrepancy_percent: f64,
    ) -> bool {
        let was_tripped = self.breaker.is_tripped();
        let tripped = self.breaker.check_and_trip(&SystemState {
            drawdown_percent,
            sentinel_status: verdict.sentinel_status,
            sentinel_reason: (!verdict.anomalies.is_empty())
                .then(|| verdict.anomalies.join(";")),
            api_consecutive_failures: self.execution.consecutive_failures(),
            balance_discrepancy_percent,
        });
        tripped && !was_tripped
    }

    /// Breaker evaluation on the degraded path, with only API telemetry.
    fn check_breaker(&self, drawdown_percent: f64, balance_discrepancy_percent: f64) {
        let tripped = self.breaker.check_and_trip(&SystemState {
            drawdown_percent,
            sentinel_status: crate::advisory::contracts::SentinelStatus::Healthy,
            sentinel_reason: None,
            api_consecutive_failures: self.execution.consecutive_failures(),
            balance_discrepancy_percent,
        });
        if tripped {
            self.alerts
                .risk_alert("circuit breaker tripped during degraded fetch");
        }
    }

    // -------------------------------------------------------------------------
    // Exit phase
    // -------------------------------------------------------------------------

    async fn manage_positions(&mut self) {
        let Some(latest) = self.buffer_5m.latest() else {
            return;
        };
        let price = latest.close;
        let now = self.clock.now_utc();

        // Watermarks first; exits must see this tick's highs/lows.
        for pos in self.positions.open_snapshot() {
            self.positions.update_price(&pos.id, price);
        }

        for pos in self.positions.open_snapshot() {
            let Some(signal) = evaluate_exit(
                &pos,
                price,
                now,
                self.config.risk.max_position_hold_hours,
            ) else {
                continue;
            };

            self.events.publish(
                EventType::ExitSignal,
                serde_json::json!({
                    "position_id": signal.position_id,
                    "reason": signal.reason.to_string(),
                    "exit_price": signal.exit_price,
                    "size_percent": signal.size_percent,
                }),
                "exit_evaluator",
            );

            // Fail-open on exits: a transient execution error keeps the
            // position; the exchange-side stop covers the STOP_LOSS case.
            if let Err(e) = self.execute_exit(&pos, signal.reason, signal.exit_price, signal.size_percent).await {
                warn!(
                    position_id = %pos.id,
                    reason = %signal.reason,
                    error = %e,
                    "exit execution failed; position retained"
                );
                self.journal.log_error(&format!("exit failed: {e}"));
                self.events.publish(
                    EventType::ErrorOccurred,
                    serde_json::json!({ "error": e.to_string(), "position_id": pos.id }),
                    "orchestrator",
                );
            }
        }
    }

    async fn execute_exit(
        &mut self,
        position: &Position,
        reason: ExitReason,
        price: f64,
        size_percent: f64,
    ) -> Result<(), VigilError> {
        let amount = position.size * size_percent / 100.0;
        let close_side = match position.side {
            TradeSide::Long => OrderSide::Sell,
            TradeSide::Short => OrderSide::Buy,
        };
        let outcome = self
            .execution
            .submit_order(
                &OrderRequest {
                    symbol: position.symbol.clone(),
                    order_type: OrderType::Market,
                    side: close_side,
                    amount,
                    price: None,
                },
                price,
            )
            .await?;

        let fill_price = outcome.order().average_price.unwrap_or(price);
        self.track_slippage(price, fill_price);

        if reason == ExitReason::TakeProfit1 {
            self.positions.apply_tp1(&position.id, fill_price);
            let partial_pnl = position.side.direction() * (fill_price - position.entry_price) * amount;
            self.expected_balance += partial_pnl - self.execution.fee_for_notional(amount * fill_price);
            self.events.publish(
                EventType::TradeExecuted,
                serde_json::json!({
                    "position_id": position.id,
                    "kind": "TP1_PARTIAL",
                    "fill_price": fill_price,
                    "amount": amount,
                }),
                "execution",
            );
            return Ok(());
        }

        let Some(closed) = self
            .positions
            .close_position(&position.id, fill_price, &reason.to_string())
        else {
            return Ok(());
        };

        let pnl_percent = closed.pnl_percent.unwrap_or(0.0);
        self.risk.register_trade_close(pnl_percent);

        let exit_notional = amount * fill_price;
        let entry_notional = amount * closed.entry_price;
        let fees = self.execution.fee_for_notional(entry_notional)
            + self.execution.fee_for_notional(exit_notional);
        // The TP1 partial already credited its own leg; only this leg moves
        // the expected balance now.
        let final_leg_pnl =
            closed.side.direction() * (fill_price - closed.entry_price) * amount;
        self.expected_balance += final_leg_pnl - fees;
        let pnl_amount = closed.realized_pnl - fees;

        let record = TradeRecord {
            trade_id: closed.id.clone(),
            symbol: closed.symbol.clone(),
            side: closed.side.to_string(),
            entry_price: closed.entry_price,
            exit_price: fill_price,
            amount,
            entry_time: closed.opened_at,
            exit_time: closed.exit_time.unwrap_or_else(|| self.clock.now_utc()),
            exit_reason: reason.to_string(),
            pnl_percent,
            pnl_amount,
            fees,
        };
        self.journal.record_trade(record);

        self.events.publish(
            EventType::PositionClosed,
            serde_json::json!({
                "position_id": closed.id,
                "reason": reason.to_string(),
                "pnl_percent": pnl_percent,
            }),
            "position_manager",
        );
        self.alerts.trade_alert(
            &closed.symbol,
            &format!("CLOSE {}", closed.side),
            amount,
            fill_price,
            Some(pnl_percent),
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Entry phase
    // -------------------------------------------------------------------------

    async fn try_enter(
        &mut self,
        verdict: &AdvisoryVerdict,
        balance: f64,
    ) -> Result<(), VigilError> {
        let candles_5m = self.buffer_5m.snapshot();
        let closes_1h = self.buffer_1h.closes();
        let trend = analyze_trend(
            &closes_1h,
            self.config.strategy.ema_fast,
            self.config.strategy.ema_slow,
        )?;

        let params = EntryParams {
            ema_pullback: self.config.strategy.ema_pullback,
            rsi_period: self.config.strategy.rsi_period,
            atr_period: self.config.strategy.atr_period,
            atr_stop_multiplier: self.config.strategy.atr_stop_multiplier,
        };
        let Some(signal) = evaluate_entry(
            &candles_5m,
            trend.bias,
            verdict.gate(),
            self.positions.open_count(),
            self.positions.max_open(),
            &params,
        )?
        else {
            return Ok(());
        };

        self.events.publish(
            EventType::EntrySignal,
            serde_json::json!({
                "side": signal.side.to_string(),
                "entry_price": signal.entry_price,
                "stop_loss": signal.stop_loss,
                "take_profit_1": signal.take_profit_1,
                "take_profit_2": signal.take_profit_2,
            }),
            "entry_evaluator",
        );

        // --- Sizing ----------------------------------------------------------
        let mut size = calculate_position_size(
            balance,
            self.config.risk.max_risk_per_trade_percent,
            signal.entry_price,
            signal.stop_loss,
            verdict.risk_multiplier,
            &self.config.risk,
        );
        // Clamp notional so a tight stop cannot commit the whole balance. The
        // 0.99 headroom keeps the clamped size strictly under the downstream
        // notional constraint after rounding.
        let max_size = balance * MAX_NOTIONAL_FRACTION * 0.99 / signal.entry_price;
        if size > max_size {
            debug!(size, max_size, "size clamped to notional cap");
            size = max_size;
        }
        if size <= 0.0 {
            debug!("sizer returned zero; entry skipped");
            return Ok(());
        }

        let request = TradeRequest {
            symbol: self.config.symbol.clone(),
            side: signal.side,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            size,
            timestamp: self.clock.now_utc(),
        };

        // --- Safety constraints ----------------------------------------------
        let account = self.risk.account_state(balance, self.positions.open_count());
        let constraint_results = self.safety.check_all(
            &request,
            &self.positions.open_snapshot(),
            &account,
            self.risk.last_trade_time(),
        );
        if let Some(failure) = first_failure(&constraint_results) {
            info!(
                constraint = failure.constraint_name,
                message = %failure.message,
                "entry blocked by safety constraint"
            );
            self.audit.log(
                "safety_constraints",
                "ENTRY_BLOCKED",
                &failure.message,
                Some(serde_json::json!({ "constraint": failure.constraint_name })),
            );
            self.events.publish(
                EventType::TradeRejected,
                serde_json::json!({
                    "stage": "safety",
                    "constraint": failure.constraint_name,
                    "message": failure.message,
                }),
                "safety_constraints",
            );
            return Ok(());
        }

        // --- Hard risk validation --------------------------------------------
        let validation = validate_trade_request(&request, &account, &self.config.risk);
        self.events.publish(
            EventType::RiskValidation,
            serde_json::json!({
                "approved": validation.approved,
                "reason": validation.reason.to_string(),
                "details": validation.details,
            }),
            "risk_validator",
        );
        if !validation.approved {
            warn!(
                reason = %validation.reason,
                details = %validation.details,
                "trade rejected by hard risk validator"
            );
            self.audit.log(
                "risk_validator",
                "TRADE_REJECTED",
                &validation.details,
                Some(serde_json::json!({ "reason": validation.reason.to_string() })),
            );
            let violation = VigilError::RiskViolation {
                reason_code: validation.reason.to_string(),
                details: validation.details.clone(),
            };
            self.alerts.risk_alert(&violation.to_string());
            self.events.publish(
                EventType::TradeRejected,
                serde_json::json!({
                    "stage": "risk_validator",
                    "reason": validation.reason.to_string(),
                }),
                "risk_validator",
            );
            return Ok(());
        }

        self.execute_entry(&signal, size).await
    }

    async fn execute_entry(&mut self, signal: &EntrySignal, size: f64) -> Result<(), VigilError> {
        let entry_side = match signal.side {
            TradeSide::Long => OrderSide::Buy,
            TradeSide::Short => OrderSide::Sell,
        };
        let outcome = self
            .execution
            .submit_order(
                &OrderRequest {
                    symbol: self.config.symbol.clone(),
                    order_type: OrderType::Market,
                    side: entry_side,
                    amount: size,
                    price: None,
                },
                signal.entry_price,
            )
            .await?;

        let fill_price = outcome.order().average_price.unwrap_or(signal.entry_price);
        self.track_slippage(signal.entry_price, fill_price);

        let Some(position) = self.positions.open_position(
            &self.config.symbol,
            signal.side,
            fill_price,
            size,
            signal.stop_loss,
            signal.take_profit_1,
            signal.take_profit_2,
            signal.atr,
        ) else {
            // Cap raced shut between the gate and the fill; surface loudly.
            error!("fill confirmed but position cap reached; manual reconciliation needed");
            self.alerts.risk_alert("orphan fill: position cap reached after fill");
            return Ok(());
        };

        self.risk.register_trade_open();

        self.events.publish(
            EventType::PositionOpened,
            serde_json::json!({
                "position_id": position.id,
                "side": position.side.to_string(),
                "entry_price": position.entry_price,
                "size": position.size,
            }),
            "position_manager",
        );
        self.events.publish(
            EventType::TradeExecuted,
            serde_json::json!({
                "position_id": position.id,
                "kind": "ENTRY",
                "fill_price": fill_price,
                "amount": size,
            }),
            "execution",
        );
        self.alerts.trade_alert(
            &self.config.symbol,
            &format!("OPEN {}", signal.side),
            size,
            fill_price,
            None,
        );
        Ok(())
    }

    fn track_slippage(&mut self, reference: f64, fill: f64) {
        if reference <= 0.0 {
            return;
        }
        let bps = (fill - reference).abs() / reference * 10_000.0;
        self.recent_slippage_bps.push(bps);
        let excess = self.recent_slippage_bps.len().saturating_sub(SLIPPAGE_WINDOW);
        if excess > 0 {
            self.recent_slippage_bps.drain(..excess);
        }
    }

    // -------------------------------------------------------------------------
    // Shutdown
    // -------------------------------------------------------------------------

    /// Drain on exit: under emergency or a tripped breaker, close every open
    /// position with market orders; otherwise positions are left working.
    pub async fn shutdown(&mut self) {
        warn!("trade loop shutting down");

        if self.emergency.is_active() || self.breaker.is_tripped() {
            let price = self.buffer_5m.latest().map(|c| c.close);
            for pos in self.positions.open_snapshot() {
                let exit_price = price.unwrap_or(pos.entry_price);
                if let Err(e) = self
                    .execute_exit(&pos, ExitReason::StopLoss, exit_price, 100.0)
                    .await
                {
                    error!(position_id = %pos.id, error = %e, "emergency drain failed");
                }
            }
        }

        let open = self.positions.open_count();
        info!(
            total_trades = self.journal.trade_count(),
            win_rate = format!("{:.1}%", self.journal.win_rate() * 100.0),
            total_pnl = format!("{:+.2}%", self.journal.total_pnl_percent()),
            open_positions = open,
            "session summary"
        );
    }
}

/// Percentile rank of the last element within the series, 0..=100.
fn percentile_rank(series: &[f64]) -> f64 {
    let Some(&last) = series.last() else {
        return 50.0;
    };
    let below = series.iter().filter(|&&v| v <= last).count();
    below as f64 / series.len() as f64 * 100.0
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
