// =============================================================================
// Error taxonomy for the Vigil trading engine
// =============================================================================
//
// Each variant maps to a distinct failure policy:
//   RiskViolation  — pre-trade rejection; audited, never retried.
//   Strategy       — indicator/signal failure; treated as "no signal this tick".
//   Execution      — exchange rejected or network failed; counted against the
//                    consecutive-API-failure budget and retried per policy.
//   CircuitBreaker — trade attempted while tripped; fatal to the tick only.
//   Configuration  — fatal at startup, never at runtime.
//   Data           — persistence/deserialization failure; the tick proceeds
//                    with in-memory state.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VigilError {
    #[error("risk violation [{reason_code}]: {details}")]
    RiskViolation { reason_code: String, details: String },

    #[error("strategy error: {0}")]
    Strategy(String),

    #[error("execution error: {message}{}", .order_id.as_deref().map(|id| format!(" [order {id}]")).unwrap_or_default())]
    Execution {
        message: String,
        order_id: Option<String>,
    },

    #[error("circuit breaker tripped: {trip_reason}")]
    CircuitBreaker { trip_reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data error: {0}")]
    Data(String),
}

impl VigilError {
    /// Shorthand for an execution failure without an associated order id.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            order_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason_code() {
        let err = VigilError::RiskViolation {
            reason_code: "DAILY_LOSS_CAP_HIT".into(),
            details: "daily loss -3.2% exceeds cap".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DAILY_LOSS_CAP_HIT"));
        assert!(msg.contains("exceeds cap"));
    }

    #[test]
    fn execution_display() {
        let plain = VigilError::execution("timeout");
        assert_eq!(plain.to_string(), "execution error: timeout");

        let with_order = VigilError::Execution {
            message: "rejected".into(),
            order_id: Some("abc-123".into()),
        };
        assert!(with_order.to_string().contains("rejected"));
        assert!(with_order.to_string().contains("[order abc-123]"));
    }
}
