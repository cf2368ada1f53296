// =============================================================================
// Persistence contracts — narrow repository interfaces the core consumes
// =============================================================================
//
// The real storage layer lives outside the core; these traits are the whole
// surface it may touch. A JSON-lines audit logger ships here because the
// risk components need *somewhere* durable for their trail even in the
// smallest deployment.
// =============================================================================

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::error::VigilError;
use crate::journal::TradeRecord;
use crate::market_data::Candle;

// ---------------------------------------------------------------------------
// Repository traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CandleRepository: Send + Sync {
    async fn save_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        candles: &[Candle],
    ) -> Result<(), VigilError>;

    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, VigilError>;

    async fn get_latest(&self, symbol: &str, timeframe: &str)
        -> Result<Option<Candle>, VigilError>;

    async fn delete_old(
        &self,
        symbol: &str,
        timeframe: &str,
        before: DateTime<Utc>,
    ) -> Result<u64, VigilError>;
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn append(&self, record: &TradeRecord) -> Result<(), VigilError>;
}

/// Structured audit trail for risk decisions and state transitions.
pub trait AuditLogger: Send + Sync {
    fn log(
        &self,
        component: &str,
        event_type: &str,
        message: &str,
        payload: Option<serde_json::Value>,
    );
}

// ---------------------------------------------------------------------------
// JSON-lines audit logger
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    timestamp: String,
    component: &'a str,
    event_type: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
}

/// Appends one JSON object per line to a local file. Write failures are
/// logged and swallowed: a broken audit disk must not stop the risk engine
/// from rejecting a trade.
pub struct JsonlAuditLogger {
    path: PathBuf,
    file: Mutex<Option<std::fs::File>>,
}

impl JsonlAuditLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                warn!(path = %path.display(), error = %e, "audit log unavailable");
                e
            })
            .ok();
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl AuditLogger for JsonlAuditLogger {
    fn log(
        &self,
        component: &str,
        event_type: &str,
        message: &str,
        payload: Option<serde_json::Value>,
    ) {
        let record = AuditRecord {
            timestamp: Utc::now().to_rfc3339(),
            component,
            event_type,
            message,
            payload,
        };

        let mut guard = self.file.lock();
        let Some(file) = guard.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "audit record serialisation failed");
                return;
            }
        };
        if let Err(e) = writeln!(file, "{line}") {
            warn!(error = %e, "audit append failed");
        }
    }
}

/// Audit logger that drops everything. For tests and minimal setups.
#[derive(Debug, Default)]
pub struct NullAuditLogger;

impl AuditLogger for NullAuditLogger {
    fn log(&self, _: &str, _: &str, _: &str, _: Option<serde_json::Value>) {}
}
