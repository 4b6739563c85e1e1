//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Store transactions (conflict retries, exhausted retry budgets)
//! - Queue operations (tickets issued, advances, resets)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Transactions
// =============================================================================

/// Transaction attempts that hit a conflict and were re-run.
pub static TRANSACTION_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "queueline_transaction_retries_total",
            "Transactions re-run after a write conflict",
        ),
        &["operation"], // "issue", "advance", "reset"
    )
    .unwrap()
});

/// Transactions abandoned after exhausting their attempt budget.
pub static TRANSACTIONS_EXHAUSTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "queueline_transactions_exhausted_total",
            "Transactions that gave up after repeated conflicts",
        ),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Queue operations
// =============================================================================

/// Tickets issued.
pub static TICKETS_ISSUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("queueline_tickets_issued_total", "Tickets issued").unwrap()
});

/// Advances by outcome.
pub static QUEUE_ADVANCES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queueline_queue_advances_total", "Now-serving pointer advances"),
        &["outcome"], // "completed", "skipped", "not_found", "not_started"
    )
    .unwrap()
});

/// Administrative resets.
pub static QUEUE_RESETS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("queueline_queue_resets_total", "Administrative queue resets").unwrap()
});

/// All core metrics, for registration in the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TRANSACTION_RETRIES.clone()),
        Box::new(TRANSACTIONS_EXHAUSTED.clone()),
        Box::new(TICKETS_ISSUED.clone()),
        Box::new(QUEUE_ADVANCES.clone()),
        Box::new(QUEUE_RESETS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        TICKETS_ISSUED.inc();
        QUEUE_ADVANCES.with_label_values(&["completed"]).inc();
        TRANSACTION_RETRIES.with_label_values(&["issue"]).inc();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"queueline_tickets_issued_total".to_string()));
        assert!(names.contains(&"queueline_queue_advances_total".to_string()));
        assert!(names.contains(&"queueline_transaction_retries_total".to_string()));
    }
}
