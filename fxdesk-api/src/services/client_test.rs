//! Tests for client signup and the client portal

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::super::client::{DepositRequest, DocumentRequest, OpenAccountRequest, SignupRequest, WithdrawalRequest};
    use super::super::test_support::*;
    use crate::error::ServiceError;
    use crate::middleware::TokenKind;
    use crate::models::{DepositStatus, ReviewStatus};
    use fxdesk::ReferralStatus;

    fn signup(email: &str, referral: Option<&str>) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            full_name: "Jane Client".to_string(),
            country: "Kenya".to_string(),
            city: Some("Nairobi".to_string()),
            referral: referral.map(str::to_string),
        }
    }

    fn account() -> OpenAccountRequest {
        OpenAccountRequest {
            account_type: "standard".to_string(),
            currency: "USD".to_string(),
            leverage: 100,
        }
    }

    #[tokio::test]
    async fn test_signup_with_referral_link() {
        let desk = TestDesk::new();
        let referrer = desk.user("ib@desk.test", "Kenya", "REFXYZ123", None).await;

        let response = desk
            .state
            .client
            .register_user(signup("new@desk.test", Some("https://portal.example/signup?ref=REFXYZ123")))
            .await
            .unwrap();
        let link = response.user.referral.as_ref().unwrap();
        assert_eq!(link.referred_by, referrer.id);
        assert_eq!(link.status, ReferralStatus::Pending);
        assert!(response.user.referral_code.starts_with("REF"));
        assert_ne!(response.user.referral_code, "REFXYZ123");

        let user_id = desk.state.auth.authenticate_client(&response.token).await.unwrap();
        assert_eq!(user_id, response.user.id);
        assert!(desk.state.auth.authenticate_admin(&response.token).await.is_err());

        let bare = desk
            .state
            .client
            .register_user(signup("bare@desk.test", Some("REFXYZ123")))
            .await
            .unwrap();
        assert_eq!(bare.user.referred_by(), Some(referrer.id));
    }

    #[tokio::test]
    async fn test_unknown_or_garbage_referral_is_ignored() {
        let desk = TestDesk::new();
        for (email, token) in [
            ("a@desk.test", "REFNOPE99"),
            ("b@desk.test", "https://portal.example/signup?campaign=x"),
            ("c@desk.test", "not a code!"),
            ("d@desk.test", "   "),
        ] {
            let response = desk.state.client.register_user(signup(email, Some(token))).await.unwrap();
            assert!(response.user.referral.is_none(), "{token}");
            assert_eq!(response.user.referral_status(), "None");
        }
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let desk = TestDesk::new();
        desk.state.client.register_user(signup("dup@desk.test", None)).await.unwrap();

        let duplicate = desk.state.client.register_user(signup("DUP@desk.test", None)).await;
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

        let bad_email = desk.state.client.register_user(signup("nope", None)).await;
        assert!(matches!(bad_email, Err(ServiceError::ValidationError(_))));

        let mut no_country = signup("c@desk.test", None);
        no_country.country = " ".to_string();
        let result = desk.state.client.register_user(no_country).await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_trading_account_rules() {
        let desk = TestDesk::new();
        let user = desk.user("t@desk.test", "Kenya", "REFTRADE1", None).await;

        let opened = desk.state.client.open_trading_account(user.id, account()).await.unwrap();
        assert_eq!(opened.login.len(), 8);
        assert_eq!(opened.balance, dec("0"));

        let mut bad_currency = account();
        bad_currency.currency = "DOLLARS".to_string();
        assert!(matches!(
            desk.state.client.open_trading_account(user.id, bad_currency).await,
            Err(ServiceError::ValidationError(_))
        ));

        let mut bad_leverage = account();
        bad_leverage.leverage = 0;
        assert!(matches!(
            desk.state.client.open_trading_account(user.id, bad_leverage).await,
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_deposit_and_withdrawal_need_own_account() {
        let desk = TestDesk::new();
        let owner = desk.user("o@desk.test", "Kenya", "REFOWNER1", None).await;
        let other = desk.user("p@desk.test", "Kenya", "REFOTHER1", None).await;
        let account = desk.state.client.open_trading_account(owner.id, account()).await.unwrap();

        let deposit = desk
            .state
            .client
            .create_deposit(
                owner.id,
                DepositRequest {
                    amount: dec("250.50"),
                    method: "card".to_string(),
                    trading_account_id: Some(account.id),
                    invoice_id: Some("inv-100".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(deposit.status, DepositStatus::Pending);
        assert_eq!(deposit.invoice_id.as_deref(), Some("inv-100"));

        let foreign = desk
            .state
            .client
            .create_deposit(
                other.id,
                DepositRequest {
                    amount: dec("10"),
                    method: "card".to_string(),
                    trading_account_id: Some(account.id),
                    invoice_id: None,
                },
            )
            .await;
        assert!(matches!(foreign, Err(ServiceError::NotFound(_))));

        let fractional = desk
            .state
            .client
            .create_deposit(
                owner.id,
                DepositRequest {
                    amount: dec("1.005"),
                    method: "card".to_string(),
                    trading_account_id: None,
                    invoice_id: None,
                },
            )
            .await;
        assert!(matches!(fractional, Err(ServiceError::ValidationError(_))));

        let withdrawal = desk
            .state
            .client
            .request_withdrawal(
                owner.id,
                WithdrawalRequest {
                    trading_account_id: account.id,
                    amount: dec("20"),
                },
            )
            .await
            .unwrap();
        assert_eq!(withdrawal.status, ReviewStatus::Pending);

        let stolen = desk
            .state
            .client
            .request_withdrawal(
                other.id,
                WithdrawalRequest {
                    trading_account_id: account.id,
                    amount: dec("20"),
                },
            )
            .await;
        assert!(matches!(stolen, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_documents_wallet_and_notifications() {
        let desk = TestDesk::new();
        let (referrer, client) = desk.referral_pair("Kenya").await;

        let document = desk
            .state
            .client
            .submit_document(
                client.id,
                DocumentRequest {
                    document_type: "passport".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(document.status, ReviewStatus::Pending);

        assert!(matches!(
            desk.state.client.wallet(referrer.id).await,
            Err(ServiceError::NotFound(_))
        ));

        desk.state.referrals.accept_referral(&super_admin(), client.id).await.unwrap();
        let wallet = desk.state.client.wallet(referrer.id).await.unwrap();
        assert!(wallet.enabled);

        let notifications = desk.state.client.notifications(referrer.id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(desk.state.client.notifications(client.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_client_token_for_deleted_user_is_refused() {
        let desk = TestDesk::new();
        let token = desk.state.auth.issue_token(Uuid::new_v4(), TokenKind::Client).unwrap();
        assert!(matches!(
            desk.state.auth.authenticate_client(&token).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
