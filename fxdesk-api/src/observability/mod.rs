//! Logging setup and Prometheus metrics

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use prometheus::{Counter, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Business metrics for the back-office
pub struct DeskMetrics {
    pub registry: Registry,

    // Referral metrics
    pub referral_decisions_total: IntCounterVec,

    // Commission metrics
    pub commissions_credited_total: IntCounter,
    pub commission_amount_total: Counter,
    pub settlements_skipped_total: IntCounterVec,
    pub payouts_total: IntCounter,

    // Payment provider metrics
    pub webhook_events_total: IntCounterVec,
}

impl DeskMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let referral_decisions_total = IntCounterVec::new(
            Opts::new("referral_decisions_total", "Referral decisions taken by admins"),
            &["outcome"],
        )?;

        let commissions_credited_total = IntCounter::with_opts(Opts::new(
            "commissions_credited_total",
            "Number of commission credits applied to IB wallets",
        ))?;

        // Exposition only; balances are never derived from this value
        let commission_amount_total = Counter::with_opts(Opts::new(
            "commission_amount_total",
            "Sum of commission credited to IB wallets",
        ))?;

        let settlements_skipped_total = IntCounterVec::new(
            Opts::new("settlements_skipped_total", "Funded deposits that produced no commission"),
            &["reason"],
        )?;

        let payouts_total = IntCounter::with_opts(Opts::new("payouts_total", "Commission payouts made"))?;

        let webhook_events_total = IntCounterVec::new(
            Opts::new("payment_webhook_events_total", "Payment provider callbacks received"),
            &["status"],
        )?;

        registry.register(Box::new(referral_decisions_total.clone()))?;
        registry.register(Box::new(commissions_credited_total.clone()))?;
        registry.register(Box::new(commission_amount_total.clone()))?;
        registry.register(Box::new(settlements_skipped_total.clone()))?;
        registry.register(Box::new(payouts_total.clone()))?;
        registry.register(Box::new(webhook_events_total.clone()))?;

        Ok(Self {
            registry,
            referral_decisions_total,
            commissions_credited_total,
            commission_amount_total,
            settlements_skipped_total,
            payouts_total,
            webhook_events_total,
        })
    }

    pub fn record_commission(&self, amount: Decimal) {
        self.commissions_credited_total.inc();
        if let Some(value) = amount.to_f64() {
            self.commission_amount_total.inc_by(value);
        }
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Create metrics endpoint handler
pub fn metrics_router(metrics: Arc<DeskMetrics>) -> Router {
    async fn metrics_handler(State(metrics): State<Arc<DeskMetrics>>) -> Result<String, StatusCode> {
        metrics.render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    }

    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_metrics_are_exposed() {
        let metrics = DeskMetrics::new().unwrap();
        metrics.record_commission("50.00".parse().unwrap());
        metrics.settlements_skipped_total.with_label_values(&["referral_not_accepted"]).inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("commissions_credited_total 1"));
        assert!(text.contains("commission_amount_total 50"));
        assert!(text.contains("reason=\"referral_not_accepted\""));
    }
}
