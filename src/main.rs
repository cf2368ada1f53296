// =============================================================================
// Vigil Trade Engine — Main Entry Point
// =============================================================================
//
// The engine starts in paper mode by default. Live trading requires
// PAPER_TRADING=false plus a real exchange adapter wired in place of the
// simulated one. Survivability over aggressiveness: every order passes the
// advisory gate, the safety sweep, and the hard risk validator, under a
// circuit breaker and an emergency stop.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod advisory;
mod alerts;
mod clock;
mod config;
mod error;
mod events;
mod exchange;
mod execution;
mod indicators;
mod journal;
mod market_data;
mod orchestrator;
mod persistence;
mod position;
mod risk;
mod strategy;
mod trend;
mod types;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::advisory::AdvisoryCommittee;
use crate::alerts::AlertSink;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::events::{EventBus, EventType};
use crate::exchange::SimExchange;
use crate::execution::ExecutionEngine;
use crate::journal::TradeJournal;
use crate::orchestrator::TradeLoop;
use crate::persistence::JsonlAuditLogger;
use crate::position::PositionManager;
use crate::risk::{CircuitBreaker, EmergencyStop, RiskEngine, SafetyConstraints};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║            Vigil Trade Engine — Starting Up              ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = Config::from_env()?;

    if !config.paper_trading {
        warn!("PAPER_TRADING=false but no live venue adapter is wired; refusing live mode");
    }

    info!(
        symbol = %config.symbol,
        paper = config.paper_trading,
        interval_secs = config.loop_interval_secs,
        max_risk_per_trade = config.risk.max_risk_per_trade_percent,
        daily_loss_cap = config.risk.daily_loss_cap_percent,
        "configuration loaded"
    );

    if let Some(parent) = std::path::Path::new(&config.journal_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = std::path::Path::new(&config.audit_log_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // ── 2. Build subsystems ──────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events = Arc::new(EventBus::new());

    // Observability taps: selected topics mirrored into the log stream.
    for topic in [
        EventType::TradeExecuted,
        EventType::TradeRejected,
        EventType::CircuitBreakerTripped,
        EventType::PositionClosed,
    ] {
        events.subscribe(
            topic,
            Box::new(move |event| {
                info!(topic = ?event.event_type, payload = %event.payload, "event");
            }),
        );
    }

    let adapter = Arc::new(SimExchange::new(50_000.0, config.starting_balance));
    let execution = Arc::new(ExecutionEngine::new(
        adapter,
        config.paper_trading,
        config.fee_percent,
    ));

    let positions = Arc::new(PositionManager::new(
        config.risk.max_open_positions,
        clock.clone(),
    ));
    let risk = Arc::new(RiskEngine::new(config.risk, clock.clone()));
    let breaker = Arc::new(
        CircuitBreaker::new(config.breaker.clone()).with_event_bus(events.clone()),
    );
    let emergency = Arc::new(EmergencyStop::new());
    let committee = AdvisoryCommittee::new().with_event_bus(events.clone());
    let safety = SafetyConstraints::new(
        config.risk,
        config.forbidden_symbols.clone(),
        config.max_correlation_exposure,
        clock.clone(),
    );
    let journal = Arc::new(TradeJournal::open(&config.journal_path, clock.clone()));
    let audit = Arc::new(JsonlAuditLogger::new(&config.audit_log_path));
    let alerts = Arc::new(AlertSink::new(config.alert_webhook_url.clone()));

    let mut trade_loop = TradeLoop::new(
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
    );

    // ── 3. Run until Ctrl+C ──────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let loop_handle = tokio::spawn(async move {
        trade_loop.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received; finishing current tick");
    let _ = shutdown_tx.send(true);

    loop_handle.await?;
    info!("Vigil Trade Engine shut down complete.");
    Ok(())
}
