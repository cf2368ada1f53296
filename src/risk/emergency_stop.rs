// =============================================================================
// Emergency Stop — process-wide kill switch with audit history
// =============================================================================
//
// Orthogonal to the circuit breaker: an operator can flip it even when every
// metric looks fine, and the risk engine or breaker can flip it on their
// own signals. While active, every orchestration tick is a no-op; open
// positions are only drained by the separate shutdown path.
// =============================================================================

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, warn};

/// Events retained in the audit history.
const MAX_HISTORY: usize = 50;

/// One trigger/release event for the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyEvent {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub reason: Option<String>,
    pub actor: String,
}

/// Serialisable status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyStopStatus {
    pub is_active: bool,
    pub reason: Option<String>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub triggered_by: Option<String>,
    pub recovery_attempts: u32,
    pub history: Vec<EmergencyEvent>,
}

struct Inner {
    is_active: bool,
    reason: Option<String>,
    triggered_at: Option<DateTime<Utc>>,
    triggered_by: Option<String>,
    recovery_attempts: u32,
    history: Vec<EmergencyEvent>,
}

pub struct EmergencyStop {
    state: RwLock<Inner>,
}

impl Default for EmergencyStop {
    fn default() -> Self {
        Self::new()
    }
}

impl EmergencyStop {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Inner {
                is_active: false,
                reason: None,
                triggered_at: None,
                triggered_by: None,
                recovery_attempts: 0,
                history: Vec::new(),
            }),
        }
    }

    /// Activate the stop. Returns false when it was already active (the
    /// original trigger is preserved).
    pub fn trigger(&self, reason: &str, triggered_by: &str) -> bool {
        let mut s = self.state.write();
        if s.is_active {
            warn!(
                existing = s.reason.as_deref().unwrap_or("unknown"),
                "emergency stop already active"
            );
            return false;
        }

        let now = Utc::now();
        s.is_active = true;
        s.reason = Some(reason.to_string());
        s.triggered_at = Some(now);
        s.triggered_by = Some(triggered_by.to_string());
        Self::push_history(
            &mut s.history,
            EmergencyEvent {
                timestamp: now,
                action: "trigger".into(),
                reason: Some(reason.to_string()),
                actor: triggered_by.to_string(),
            },
        );

        error!(reason, triggered_by, "EMERGENCY STOP TRIGGERED");
        true
    }

    /// Release the stop. Requires a non-empty token; returns false when the
    /// stop is not active or the token is empty.
    pub fn release(&self, token: &str, released_by: &str) -> bool {
        let mut s = self.state.write();
        if !s.is_active {
            return false;
        }
        if token.is_empty() {
            error!(released_by, "emergency release refused: empty token");
            return false;
        }

        s.is_active = false;
        s.recovery_attempts += 1;
        let attempts = s.recovery_attempts;
        Self::push_history(
            &mut s.history,
            EmergencyEvent {
                timestamp: Utc::now(),
                action: "release".into(),
                reason: None,
                actor: released_by.to_string(),
            },
        );

        warn!(released_by, recovery_attempts = attempts, "emergency stop released");
        true
    }

    fn push_history(history: &mut Vec<EmergencyEvent>, event: EmergencyEvent) {
        history.push(event);
        while history.len() > MAX_HISTORY {
            history.remove(0);
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.read().is_active
    }

    pub fn status(&self) -> EmergencyStopStatus {
        let s = self.state.read();
        EmergencyStopStatus {
            is_active: s.is_active,
            reason: s.reason.clone(),
            triggered_at: s.triggered_at,
            triggered_by: s.triggered_by.clone(),
            recovery_attempts: s.recovery_attempts,
            history: s.history.iter().rev().take(10).rev().cloned().collect(),
        }
    }
}

impl std::fmt::Debug for EmergencyStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergencyStop")
            .field("is_active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_activates_once() {
        let stop = EmergencyStop::new();
        assert!(!stop.is_active());

        assert!(stop.trigger("drawdown breach", "risk_engine"));
        assert!(stop.is_active());

        // A second trigger keeps the original reason.
        assert!(!stop.trigger("other reason", "manual"));
        assert_eq!(stop.status().reason.as_deref(), Some("drawdown breach"));
        assert_eq!(stop.status().triggered_by.as_deref(), Some("risk_engine"));
    }

    #[test]
    fn release_needs_active_stop_and_token() {
        let stop = EmergencyStop::new();
        assert!(!stop.release("token", "operator")); // not active

        stop.trigger("test", "manual");
        assert!(!stop.release("", "operator")); // empty token
        assert!(stop.is_active());

        assert!(stop.release("token", "operator"));
        assert!(!stop.is_active());
        assert_eq!(stop.status().recovery_attempts, 1);
    }

    #[test]
    fn history_is_bounded() {
        let stop = EmergencyStop::new();
        for i in 0..60 {
            stop.trigger(&format!("r{i}"), "manual");
            stop.release("t", "operator");
        }
        let status = stop.status();
        // Status exposes the last 10 events only.
        assert_eq!(status.history.len(), 10);
        assert_eq!(status.recovery_attempts, 60);
    }

    #[test]
    fn history_records_trigger_and_release() {
        let stop = EmergencyStop::new();
        stop.trigger("api failures", "circuit_breaker");
        stop.release("t", "operator");

        let history = stop.status().history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "trigger");
        assert_eq!(history[0].actor, "circuit_breaker");
        assert_eq!(history[1].action, "release");
    }
}
