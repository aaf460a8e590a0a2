//! Tests for role-scoped listings and stats

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::super::back_office::DepositFilter;
    use super::super::client::{OpenAccountRequest, WithdrawalRequest};
    use super::super::test_support::*;
    use crate::error::ServiceError;
    use crate::models::{DepositStatus, User};

    async fn populated_desk() -> (TestDesk, Vec<User>) {
        let desk = TestDesk::new();
        let kenya = desk.user("k1@desk.test", "Kenya", "REFKEN001", None).await;
        let kenya_spaced = desk.user("k2@desk.test", " kenya ", "REFKEN002", None).await;
        let uganda = desk.user("u1@desk.test", "Uganda", "REFUGA001", None).await;
        let nigeria = desk.user("n1@desk.test", "Nigeria", "REFNIG001", None).await;
        (desk, vec![kenya, kenya_spaced, uganda, nigeria])
    }

    fn ids(users: &[User]) -> HashSet<uuid::Uuid> {
        users.iter().map(|u| u.id).collect()
    }

    #[tokio::test]
    async fn test_middle_admin_sees_only_assigned_countries() {
        let (desk, users) = populated_desk().await;
        let admin = middle_admin(&["KENYA"]);

        let visible = desk.state.back_office.list_users(&admin).await.unwrap();
        assert_eq!(ids(&visible), ids(&users[..2]));

        let two = middle_admin(&["Kenya", "uganda"]);
        let visible = desk.state.back_office.list_users(&two).await.unwrap();
        assert_eq!(ids(&visible), ids(&users[..3]));

        let none = middle_admin(&[]);
        assert!(desk.state.back_office.list_users(&none).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_super_and_normal_admins_see_everything() {
        let (desk, users) = populated_desk().await;
        let countryless = User::new("x@desk.test", "X", None, None, "REFNONE01", None);
        let mut tx = desk.store().begin().await.unwrap();
        tx.insert_user(&countryless).await.unwrap();
        tx.commit().await.unwrap();

        for admin in [super_admin(), normal_admin()] {
            let visible = desk.state.back_office.list_users(&admin).await.unwrap();
            assert_eq!(visible.len(), users.len() + 1);
        }

        let scoped = desk.state.back_office.list_users(&middle_admin(&["Kenya"])).await.unwrap();
        assert!(scoped.iter().all(|u| u.id != countryless.id));
    }

    #[tokio::test]
    async fn test_owned_entities_follow_owner_country() {
        let (desk, users) = populated_desk().await;
        for user in &users {
            let account = desk
                .state
                .client
                .open_trading_account(
                    user.id,
                    OpenAccountRequest {
                        account_type: "standard".to_string(),
                        currency: "usd".to_string(),
                        leverage: 100,
                    },
                )
                .await
                .unwrap();
            desk.state
                .client
                .request_withdrawal(
                    user.id,
                    WithdrawalRequest {
                        trading_account_id: account.id,
                        amount: dec("10"),
                    },
                )
                .await
                .unwrap();
            desk.deposit(user.id, "100").await;
        }

        let admin = middle_admin(&["Kenya"]);
        let kenyan = ids(&users[..2]);
        let accounts = desk.state.back_office.list_trading_accounts(&admin).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.iter().all(|a| kenyan.contains(&a.user_id) && a.currency == "USD"));

        let withdrawals = desk.state.back_office.list_withdrawals(&admin).await.unwrap();
        assert_eq!(withdrawals.len(), 2);

        let deposits = desk
            .state
            .back_office
            .list_deposits(&admin, DepositFilter::default())
            .await
            .unwrap();
        assert_eq!(deposits.len(), 2);
        assert!(deposits.iter().all(|d| kenyan.contains(&d.user_id)));
    }

    #[tokio::test]
    async fn test_deposit_filter() {
        let (desk, users) = populated_desk().await;
        let admin = super_admin();
        let first = desk.deposit(users[0].id, "100").await;
        desk.deposit(users[0].id, "200").await;
        desk.deposit(users[2].id, "300").await;
        desk.state.deposits.approve_deposit(&admin, first.id, None).await.unwrap();

        let approved = desk
            .state
            .back_office
            .list_deposits(
                &admin,
                DepositFilter {
                    status: Some(DepositStatus::Approved),
                    user_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, first.id);

        let by_user = desk
            .state
            .back_office
            .list_deposits(
                &admin,
                DepositFilter {
                    status: None,
                    user_id: Some(users[0].id),
                },
            )
            .await
            .unwrap();
        assert_eq!(by_user.len(), 2);
    }

    #[tokio::test]
    async fn test_user_detail_is_scoped() {
        let desk = TestDesk::new();
        let (referrer, client) = desk.referral_pair("Kenya").await;
        let admin = super_admin();
        desk.state.referrals.accept_referral(&admin, client.id).await.unwrap();

        let detail = desk.state.back_office.get_user(&admin, referrer.id).await.unwrap();
        assert_eq!(detail.referral_status, "None");
        assert_eq!(detail.referred_users.len(), 1);
        assert_eq!(detail.referred_users[0].id, client.id);
        assert!(detail.ib_wallet.is_some());

        let detail = desk.state.back_office.get_user(&admin, client.id).await.unwrap();
        assert_eq!(detail.referral_status, "Accepted");

        let outsider = middle_admin(&["Uganda"]);
        let hidden = desk.state.back_office.get_user(&outsider, client.id).await;
        assert!(matches!(hidden, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stats_cover_visible_data_only() {
        let desk = TestDesk::new();
        let admin = super_admin();
        let (kenyan_ib, kenyan) = desk.referral_pair("Kenya").await;
        let (_, ugandan) = desk.referral_pair("Uganda").await;
        desk.state.referrals.accept_referral(&admin, kenyan.id).await.unwrap();
        desk.state
            .referrals
            .reject_referral(&admin, ugandan.id, "duplicate")
            .await
            .unwrap();

        let deposit = desk.deposit(kenyan.id, "1000").await;
        desk.state.deposits.approve_deposit(&admin, deposit.id, None).await.unwrap();
        desk.deposit(ugandan.id, "500").await;

        let all = desk.state.back_office.stats(&admin).await.unwrap();
        assert_eq!(all.users, 4);
        assert_eq!(all.referrals.none, 2);
        assert_eq!(all.referrals.accepted, 1);
        assert_eq!(all.referrals.rejected, 1);
        assert_eq!(all.deposits_by_status["Approved"], 1);
        assert_eq!(all.deposits_by_status["Pending"], 1);
        assert_eq!(all.deposits_by_status["Completed"], 0);
        assert_eq!(all.credited_deposit_total, dec("1000"));
        assert_eq!(all.total_commission, dec("50.00"));
        assert_eq!(all.outstanding_commission, dec("50.00"));

        let scoped = desk.state.back_office.stats(&middle_admin(&["Uganda"])).await.unwrap();
        assert_eq!(scoped.users, 2);
        assert_eq!(scoped.referrals.rejected, 1);
        assert_eq!(scoped.referrals.accepted, 0);
        assert_eq!(scoped.deposits_by_status["Pending"], 1);
        assert_eq!(scoped.credited_deposit_total, dec("0"));
        assert_eq!(scoped.total_commission, dec("0"));

        let wallets = desk.state.back_office.list_wallets(&middle_admin(&["Kenya"])).await.unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].user_id, kenyan_ib.id);
    }
}
