//! Tests for deposit decisions and payment callbacks

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::super::payments::{PaymentWebhook, WebhookOutcome};
    use super::super::settlement::SettlementOutcome;
    use super::super::test_support::*;
    use crate::error::ServiceError;
    use crate::models::{Deposit, DepositStatus};
    use fxdesk::WalletType;

    fn webhook(invoice_id: &str, status: &str, value: Option<&str>, reference: Option<Uuid>) -> PaymentWebhook {
        PaymentWebhook {
            invoice_id: invoice_id.to_string(),
            invoice_status: status.to_string(),
            invoice_value: value.map(dec),
            customer_reference: reference.map(|r| r.to_string()),
        }
    }

    async fn accepted_client(desk: &TestDesk) -> (Uuid, Uuid) {
        let (referrer, client) = desk.referral_pair("Kenya").await;
        desk.state.referrals.accept_referral(&super_admin(), client.id).await.unwrap();
        (referrer.id, client.id)
    }

    async fn wallet_balance(desk: &TestDesk, user_id: Uuid) -> Option<(rust_decimal::Decimal, rust_decimal::Decimal)> {
        let mut tx = desk.store().begin().await.unwrap();
        tx.get_wallet(user_id, WalletType::Ib)
            .await
            .unwrap()
            .map(|w| (w.balance, w.total_commission))
    }

    #[tokio::test]
    async fn test_approve_with_amount_override() {
        let desk = TestDesk::new();
        let (referrer, client) = accepted_client(&desk).await;
        let deposit = desk.deposit(client, "1000").await;

        let approval = desk
            .state
            .deposits
            .approve_deposit(&super_admin(), deposit.id, Some(dec("800")))
            .await
            .unwrap();
        assert_eq!(approval.deposit.status, DepositStatus::Approved);
        assert_eq!(approval.deposit.amount, dec("800"));
        assert_eq!(approval.settlement.credit().unwrap().amount, dec("40.00"));
        assert_eq!(wallet_balance(&desk, referrer).await, Some((dec("40.00"), dec("40.00"))));
    }

    #[tokio::test]
    async fn test_approve_rejects_bad_override() {
        let desk = TestDesk::new();
        let (_, client) = accepted_client(&desk).await;
        let deposit = desk.deposit(client, "1000").await;

        let result = desk
            .state
            .deposits
            .approve_deposit(&super_admin(), deposit.id, Some(dec("0")))
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_decided_deposit_cannot_change() {
        let desk = TestDesk::new();
        let (_, client) = accepted_client(&desk).await;
        let admin = super_admin();
        let deposit = desk.deposit(client, "1000").await;

        desk.state.deposits.approve_deposit(&admin, deposit.id, None).await.unwrap();

        let again = desk.state.deposits.approve_deposit(&admin, deposit.id, None).await;
        assert!(matches!(again, Err(ServiceError::InvalidStateTransition { .. })));
        let reject = desk.state.deposits.reject_deposit(&admin, deposit.id, "typo").await;
        assert!(matches!(reject, Err(ServiceError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_reject_deposit_requires_reason() {
        let desk = TestDesk::new();
        let (referrer, client) = accepted_client(&desk).await;
        let admin = super_admin();
        let deposit = desk.deposit(client, "1000").await;

        let blank = desk.state.deposits.reject_deposit(&admin, deposit.id, " ").await;
        assert!(matches!(blank, Err(ServiceError::ValidationError(_))));

        let rejected = desk
            .state
            .deposits
            .reject_deposit(&admin, deposit.id, "sender mismatch")
            .await
            .unwrap();
        assert_eq!(rejected.status, DepositStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("sender mismatch"));
        assert_eq!(wallet_balance(&desk, referrer).await, Some((dec("0"), dec("0"))));
    }

    #[tokio::test]
    async fn test_deposit_outside_scope_is_hidden() {
        let desk = TestDesk::new();
        let (_, client) = desk.referral_pair("Uganda").await;
        let deposit = desk.deposit(client.id, "100").await;

        let result = desk
            .state
            .deposits
            .approve_deposit(&middle_admin(&["Kenya"]), deposit.id, None)
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));

        let missing = desk.state.deposits.approve_deposit(&super_admin(), Uuid::new_v4(), None).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_paid_webhook_completes_and_credits_once() {
        let desk = TestDesk::new();
        let (referrer, client) = accepted_client(&desk).await;
        let deposit = desk.deposit(client, "1000").await;

        let first = desk
            .state
            .payments
            .handle(webhook("inv-1", "Paid", Some("1000"), Some(deposit.id)))
            .await
            .unwrap();
        match first {
            WebhookOutcome::Completed { deposit_id, settlement } => {
                assert_eq!(deposit_id, deposit.id);
                assert_eq!(settlement.credit().unwrap().amount, dec("50.00"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let retry = desk
            .state
            .payments
            .handle(webhook("inv-1", "Paid", Some("1000"), Some(deposit.id)))
            .await
            .unwrap();
        assert_eq!(
            retry,
            WebhookOutcome::AlreadyProcessed {
                deposit_id: deposit.id,
                status: DepositStatus::Completed,
            }
        );

        let approve = desk.state.deposits.approve_deposit(&super_admin(), deposit.id, None).await;
        assert!(matches!(approve, Err(ServiceError::InvalidStateTransition { .. })));

        assert_eq!(wallet_balance(&desk, referrer).await, Some((dec("50.00"), dec("50.00"))));
    }

    #[tokio::test]
    async fn test_webhook_uses_paid_value_and_invoice_lookup() {
        let desk = TestDesk::new();
        let (referrer, client) = accepted_client(&desk).await;
        let deposit = Deposit::new(client, None, dec("1000"), "card", Some("inv-77".to_string())).unwrap();
        let mut tx = desk.store().begin().await.unwrap();
        tx.insert_deposit(&deposit).await.unwrap();
        tx.commit().await.unwrap();

        let outcome = desk
            .state
            .payments
            .handle(webhook("inv-77", "paid", Some("600"), None))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Completed { .. }));
        assert_eq!(wallet_balance(&desk, referrer).await, Some((dec("30.00"), dec("30.00"))));

        let unknown = desk
            .state
            .payments
            .handle(webhook("inv-404", "Paid", Some("10"), Some(Uuid::new_v4())))
            .await;
        assert!(matches!(unknown, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unpaid_webhook_fails_deposit() {
        let desk = TestDesk::new();
        let (referrer, client) = accepted_client(&desk).await;
        let deposit = desk.deposit(client, "1000").await;

        let outcome = desk
            .state
            .payments
            .handle(webhook("inv-9", "Expired", None, Some(deposit.id)))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Failed { deposit_id: deposit.id });

        let late_paid = desk
            .state
            .payments
            .handle(webhook("inv-9", "Paid", Some("1000"), Some(deposit.id)))
            .await
            .unwrap();
        assert!(matches!(
            late_paid,
            WebhookOutcome::AlreadyProcessed { status: DepositStatus::Failed, .. }
        ));
        assert_eq!(wallet_balance(&desk, referrer).await, Some((dec("0"), dec("0"))));
    }

    #[tokio::test]
    async fn test_other_statuses_are_ignored() {
        let desk = TestDesk::new();
        let (_, client) = accepted_client(&desk).await;
        let deposit = desk.deposit(client, "1000").await;

        let outcome = desk
            .state
            .payments
            .handle(webhook("inv-5", "Pending", None, Some(deposit.id)))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

        let approval = desk.state.deposits.approve_deposit(&super_admin(), deposit.id, None).await.unwrap();
        assert!(matches!(approval.settlement, SettlementOutcome::Credited(_)));
    }

    #[tokio::test]
    async fn test_paid_webhook_without_value_is_rejected() {
        let desk = TestDesk::new();
        let (_, client) = accepted_client(&desk).await;
        let deposit = desk.deposit(client, "1000").await;

        let result = desk
            .state
            .payments
            .handle(webhook("inv-3", "Paid", None, Some(deposit.id)))
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));

        let mut tx = desk.store().begin().await.unwrap();
        let stored = tx.get_deposit_for_update(deposit.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DepositStatus::Pending);
    }

    #[tokio::test]
    async fn test_concurrent_approval_and_webhook_credit_once() {
        let desk = TestDesk::new();
        let (referrer, client) = accepted_client(&desk).await;
        let deposit = desk.deposit(client, "1000").await;
        let admin = super_admin();

        let (approval, callback) = tokio::join!(
            desk.state.deposits.approve_deposit(&admin, deposit.id, None),
            desk.state
                .payments
                .handle(webhook("inv-c", "Paid", Some("1000"), Some(deposit.id))),
        );

        // exactly one of the two moved the deposit out of Pending
        let approved = approval.is_ok();
        let completed = matches!(callback, Ok(WebhookOutcome::Completed { .. }));
        assert!(approved ^ completed);
        assert_eq!(wallet_balance(&desk, referrer).await, Some((dec("50.00"), dec("50.00"))));
    }
}
