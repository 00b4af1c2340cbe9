//! Performance alerts.
//!
//! Slow handlers and diverging render strategies are reported through an
//! [`AlertSink`]. The default sink logs; tests collect alerts in memory.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// What triggered an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// One handler pass exceeded its timeout.
    SlowHandler,
    /// Advanced and legacy rendering times differ beyond the threshold.
    StrategyDivergence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceAlert {
    pub kind: AlertKind,
    /// Handler id, or the page name for strategy comparisons.
    pub subject: String,
    pub elapsed: Duration,
    pub threshold: Duration,
    pub message: String,
}

/// Receiver of performance alerts.
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: PerformanceAlert);
}

/// Logs alerts as warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn raise(&self, alert: PerformanceAlert) {
        tracing::warn!(
            kind = ?alert.kind,
            subject = %alert.subject,
            elapsed_ms = alert.elapsed.as_millis(),
            threshold_ms = alert.threshold.as_millis(),
            "{}",
            alert.message
        );
    }
}

/// Keeps alerts for later inspection.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<PerformanceAlert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<PerformanceAlert> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AlertSink for MemoryAlertSink {
    fn raise(&self, alert: PerformanceAlert) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert);
    }
}
