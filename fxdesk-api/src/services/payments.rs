//! Payment provider callbacks
//!
//! The provider posts `{invoiceId, invoiceStatus, invoiceValue,
//! customerReference}` where `customerReference` is the deposit id handed out
//! when the invoice was created. Signature verification happens upstream.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use fxdesk::money::parse_amount;

use crate::database::{BrokerageStore, StoreTransaction};
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::{ActivityLogger, AuditAction};
use crate::models::{Deposit, DepositStatus};
use crate::observability::DeskMetrics;
use crate::services::settlement::{SettlementEngine, SettlementOutcome};

/// Callback body sent by the payment provider
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhook {
    pub invoice_id: String,
    pub invoice_status: String,
    #[serde(default, deserialize_with = "flexible_decimal")]
    pub invoice_value: Option<Decimal>,
    #[serde(default)]
    pub customer_reference: Option<String>,
}

/// The provider sends amounts either as JSON numbers or as strings
fn flexible_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => parse_amount(&raw).map(Some).map_err(de::Error::custom),
        Some(Value::Number(number)) => {
            let raw = number.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .map(Some)
                .map_err(de::Error::custom)
        }
        Some(other) => Err(de::Error::custom(format!("invalid invoiceValue: {}", other))),
    }
}

/// Provider statuses the desk acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvoiceState {
    Paid,
    Unpaid,
}

fn classify(status: &str) -> Option<InvoiceState> {
    let status = status.trim();
    if status.eq_ignore_ascii_case("paid") {
        Some(InvoiceState::Paid)
    } else if ["failed", "expired", "canceled", "cancelled"]
        .iter()
        .any(|s| status.eq_ignore_ascii_case(s))
    {
        Some(InvoiceState::Unpaid)
    } else {
        None
    }
}

/// Acknowledgement returned to the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Completed { deposit_id: Uuid, settlement: SettlementOutcome },
    Failed { deposit_id: Uuid },
    AlreadyProcessed { deposit_id: Uuid, status: DepositStatus },
    Ignored { invoice_status: String },
}

pub struct PaymentWebhookService {
    store: Arc<dyn BrokerageStore>,
    audit: ActivityLogger,
    metrics: Arc<DeskMetrics>,
    settlement: Arc<SettlementEngine>,
}

impl PaymentWebhookService {
    pub fn new(
        store: Arc<dyn BrokerageStore>,
        audit: ActivityLogger,
        metrics: Arc<DeskMetrics>,
        settlement: Arc<SettlementEngine>,
    ) -> Self {
        Self { store, audit, metrics, settlement }
    }

    #[instrument(skip(self, payload), fields(invoice_id = %payload.invoice_id, status = %payload.invoice_status))]
    pub async fn handle(&self, payload: PaymentWebhook) -> ServiceResult<WebhookOutcome> {
        let state = classify(&payload.invoice_status);
        let label = match state {
            Some(InvoiceState::Paid) => "paid",
            Some(InvoiceState::Unpaid) => "unpaid",
            None => "ignored",
        };
        self.metrics.webhook_events_total.with_label_values(&[label]).inc();

        let state = match state {
            Some(state) => state,
            None => {
                info!("Ignoring invoice status");
                return Ok(WebhookOutcome::Ignored {
                    invoice_status: payload.invoice_status,
                });
            }
        };

        let mut tx = self.store.begin().await?;
        let mut deposit = self.find_deposit(tx.as_mut(), &payload).await?;

        if deposit.status != DepositStatus::Pending {
            info!(deposit_id = %deposit.id, status = %deposit.status, "Invoice already processed");
            return Ok(WebhookOutcome::AlreadyProcessed {
                deposit_id: deposit.id,
                status: deposit.status,
            });
        }

        if deposit.invoice_id.is_none() {
            deposit.invoice_id = Some(payload.invoice_id.clone());
        }

        match state {
            InvoiceState::Paid => {
                let paid = payload
                    .invoice_value
                    .ok_or_else(|| ServiceError::validation("invoiceValue is required for a paid invoice"))?;
                deposit.complete(paid, Utc::now())?;
                tx.update_deposit(&deposit).await?;
                self.audit
                    .log(
                        tx.as_mut(),
                        None,
                        AuditAction::DepositCompleted,
                        "deposit",
                        Some(deposit.id),
                        Some(format!("invoice {} paid {}", payload.invoice_id, paid)),
                    )
                    .await;

                let settlement = self.settlement.settle_deposit(tx.as_mut(), &deposit, None).await?;
                tx.commit().await?;
                info!(deposit_id = %deposit.id, amount = %deposit.amount, "Deposit completed by provider");
                self.settlement.after_commit(&settlement).await;

                Ok(WebhookOutcome::Completed {
                    deposit_id: deposit.id,
                    settlement,
                })
            }
            InvoiceState::Unpaid => {
                deposit.fail(Utc::now())?;
                tx.update_deposit(&deposit).await?;
                self.audit
                    .log(
                        tx.as_mut(),
                        None,
                        AuditAction::DepositFailed,
                        "deposit",
                        Some(deposit.id),
                        Some(format!("invoice {} {}", payload.invoice_id, payload.invoice_status.trim())),
                    )
                    .await;
                tx.commit().await?;
                warn!(deposit_id = %deposit.id, "Deposit failed at provider");

                Ok(WebhookOutcome::Failed { deposit_id: deposit.id })
            }
        }
    }

    async fn find_deposit(
        &self,
        tx: &mut dyn StoreTransaction,
        payload: &PaymentWebhook,
    ) -> ServiceResult<Deposit> {
        let by_reference = payload
            .customer_reference
            .as_deref()
            .and_then(|reference| Uuid::parse_str(reference.trim()).ok());

        let mut deposit = match by_reference {
            Some(deposit_id) => tx.get_deposit_for_update(deposit_id).await?,
            None => None,
        };
        if deposit.is_none() {
            deposit = tx.find_deposit_by_invoice_for_update(&payload.invoice_id).await?;
        }

        deposit.ok_or_else(|| ServiceError::NotFound(format!("No deposit for invoice {}", payload.invoice_id)))
    }
}
