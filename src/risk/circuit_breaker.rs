// =============================================================================
// Circuit Breaker — system-level latch over trading activity
// =============================================================================
//
// Trip predicates, any of which latches the breaker:
//   drawdown >= emergency threshold          -> EMERGENCY_DRAWDOWN
//   sentinel status CRITICAL                 -> SENTINEL_CRITICAL
//   consecutive API failures >= budget       -> API_FAILURES
//   balance discrepancy > tolerance          -> BALANCE_MISMATCH
//
// Once tripped, `check_and_trip` keeps returning true without re-evaluating.
// The only way out is `manual_reset` with an admin token: when a SHA-256
// digest is configured the token must hash to it, otherwise any non-empty
// token is accepted.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::advisory::contracts::SentinelStatus;
use crate::events::{EventBus, EventType};

// ---------------------------------------------------------------------------
// Configuration and inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub emergency_drawdown_percent: f64,
    pub max_api_failures: u32,
    pub balance_tolerance_percent: f64,
    /// Hex SHA-256 digest of the admin reset token. `None` accepts any
    /// non-empty token.
    pub admin_token_sha256: Option<String>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            emergency_drawdown_percent: 10.0,
            max_api_failures: 5,
            balance_tolerance_percent: 1.0,
            admin_token_sha256: None,
        }
    }
}

/// Telemetry snapshot the breaker evaluates each tick.
#[derive(Debug, Clone)]
pub struct SystemState {
    pub drawdown_percent: f64,
    pub sentinel_status: SentinelStatus,
    pub sentinel_reason: Option<String>,
    pub api_consecutive_failures: u32,
    pub balance_discrepancy_percent: f64,
}

/// Reason codes for a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TripReason {
    EmergencyDrawdown,
    SentinelCritical,
    ApiFailures,
    BalanceMismatch,
}

impl std::fmt::Display for TripReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::EmergencyDrawdown => "EMERGENCY_DRAWDOWN",
            Self::SentinelCritical => "SENTINEL_CRITICAL",
            Self::ApiFailures => "API_FAILURES",
            Self::BalanceMismatch => "BALANCE_MISMATCH",
        };
        write!(f, "{code}")
    }
}

/// Current breaker state, cloneable for snapshots.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CircuitBreakerState {
    pub tripped: bool,
    pub trip_reason: Option<String>,
    pub trip_timestamp: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Breaker
// ---------------------------------------------------------------------------

pub struct CircuitBreaker {
    state: RwLock<CircuitBreakerState>,
    config: CircuitBreakerConfig,
    events: Option<Arc<EventBus>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: RwLock::new(CircuitBreakerState::default()),
            config,
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Evaluate the trip predicates. Returns true when the breaker is (or
    /// just became) tripped; idempotent on an already-tripped latch.
    pub fn check_and_trip(&self, system: &SystemState) -> bool {
        if self.state.read().tripped {
            return true;
        }

        let trip = if system.drawdown_percent >= self.config.emergency_drawdown_percent {
            Some((
                TripReason::EmergencyDrawdown,
                format!("drawdown {:.2}%", system.drawdown_percent),
            ))
        } else if system.sentinel_status == SentinelStatus::Critical {
            Some((
                TripReason::SentinelCritical,
                system
                    .sentinel_reason
                    .clone()
                    .unwrap_or_else(|| "sentinel critical".into()),
            ))
        } else if system.api_consecutive_failures >= self.config.max_api_failures {
            Some((
                TripReason::ApiFailures,
                format!("{} consecutive API failures", system.api_consecutive_failures),
            ))
        } else if system.balance_discrepancy_percent > self.config.balance_tolerance_percent {
            Some((
                TripReason::BalanceMismatch,
                format!(
                    "balance discrepancy {:.2}%",
                    system.balance_discrepancy_percent
                ),
            ))
        } else {
            None
        };

        match trip {
            Some((reason, detail)) => {
                self.trip(reason, &detail);
                true
            }
            None => false,
        }
    }

    fn trip(&self, reason: TripReason, detail: &str) {
        let now = Utc::now();
        {
            let mut s = self.state.write();
            s.tripped = true;
            s.trip_reason = Some(reason.to_string());
            s.trip_timestamp = Some(now);
        }
        error!(reason = %reason, detail, "CIRCUIT BREAKER TRIPPED");

        if let Some(events) = &self.events {
            events.publish(
                EventType::CircuitBreakerTripped,
                serde_json::json!({
                    "reason": reason.to_string(),
                    "detail": detail,
                    "tripped_at": now.to_rfc3339(),
                }),
                "circuit_breaker",
            );
        }
    }

    /// Reset the latch. The token must be non-empty and, when a digest is
    /// configured, hash to it.
    pub fn manual_reset(&self, admin_token: &str) -> bool {
        if !self.verify_admin_token(admin_token) {
            warn!("circuit breaker reset refused: invalid admin token");
            return false;
        }

        let was_tripped = {
            let mut s = self.state.write();
            let was = s.tripped;
            s.tripped = false;
            s.trip_reason = None;
            s.trip_timestamp = None;
            was
        };

        info!(was_tripped, "circuit breaker manually reset");
        if let Some(events) = &self.events {
            events.publish(
                EventType::CircuitBreakerReset,
                serde_json::json!({ "was_tripped": was_tripped }),
                "circuit_breaker",
            );
        }
        true
    }

    fn verify_admin_token(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        match &self.config.admin_token_sha256 {
            Some(expected) => {
                let digest = hex::encode(Sha256::digest(token.as_bytes()));
                digest.eq_ignore_ascii_case(expected)
            }
            None => true,
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.state.read().tripped
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        self.state.read().clone()
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.snapshot())
            .finish()
    }
}
