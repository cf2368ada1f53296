// =============================================================================
// Alert sink — log always, webhook when configured
// =============================================================================
//
// Every halt, trip, or rejection raises an alert. Webhook delivery is
// fire-and-forget with a bounded timeout; a dead webhook must never slow the
// trading loop down.
// =============================================================================

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

pub struct AlertSink {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl AlertSink {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    /// Raise an alert: always logged, POSTed to the webhook when one is
    /// configured. Delivery failures are logged and swallowed.
    pub fn send(&self, level: AlertLevel, message: &str) {
        match level {
            AlertLevel::Critical => error!(alert = %level, "{message}"),
            AlertLevel::Warning => warn!(alert = %level, "{message}"),
            AlertLevel::Info => info!(alert = %level, "{message}"),
        }

        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let body = serde_json::json!({
            "level": level.to_string(),
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let client = self.client.clone();
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .timeout(WEBHOOK_TIMEOUT)
                .json(&body)
                .send()
                .await;
            if let Err(e) = result {
                warn!(error = %e, "alert webhook delivery failed");
            }
        });
    }

    /// Trade execution alert with optional realised PnL.
    pub fn trade_alert(&self, symbol: &str, side: &str, amount: f64, price: f64, pnl: Option<f64>) {
        let mut msg = format!("TRADE: {side} {amount} {symbol} @ {price}");
        if let Some(pnl) = pnl {
            msg.push_str(&format!(" | P&L: {pnl:+.2}%"));
        }
        self.send(AlertLevel::Info, &msg);
    }

    pub fn risk_alert(&self, reason: &str) {
        self.send(AlertLevel::Critical, &format!("RISK: {reason}"));
    }

    pub fn advisory_alert(&self, recommendation: &str, reasoning: &str) {
        self.send(
            AlertLevel::Warning,
            &format!("ADVISORY: {recommendation} - {reasoning}"),
        );
    }
}

impl std::fmt::Debug for AlertSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSink")
            .field("webhook_configured", &self.webhook_url.is_some())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_webhook_does_not_panic() {
        let sink = AlertSink::new(None);
        sink.send(AlertLevel::Info, "hello");
        sink.risk_alert("daily loss cap");
        sink.trade_alert("BTCUSDT", "LONG", 0.5, 50_000.0, Some(1.25));
        sink.advisory_alert("HALT", "sentinel critical");
    }

    #[test]
    fn level_labels() {
        assert_eq!(AlertLevel::Info.to_string(), "INFO");
        assert_eq!(AlertLevel::Warning.to_string(), "WARNING");
        assert_eq!(AlertLevel::Critical.to_string(), "CRITICAL");
    }
}
