//! Tests for admin management and the activity log

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::super::test_support::*;
    use crate::error::ServiceError;
    use fxdesk::{AdminIdentity, AdminRole};

    #[tokio::test]
    async fn test_create_middle_admin_with_countries() {
        let desk = TestDesk::new();
        let actor = super_admin();

        let view = desk
            .state
            .admins
            .create_admin(
                &actor,
                "kenya-desk@desk.test",
                "Kenya desk",
                AdminRole::MiddleAdmin,
                vec!["Kenya".to_string(), " kenya".to_string(), "Uganda".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(view.admin.role, AdminRole::MiddleAdmin);
        assert_eq!(view.admin.created_by, Some(actor.id()));
        assert!(view.admin.enabled);
        assert_eq!(view.countries.len(), 2);

        let admins = desk.state.admins.list_admins(&actor).await.unwrap();
        assert_eq!(admins.len(), 1);
    }

    #[tokio::test]
    async fn test_only_super_admins_manage_admins() {
        let desk = TestDesk::new();
        for actor in [normal_admin(), middle_admin(&["Kenya"])] {
            let result = desk
                .state
                .admins
                .create_admin(&actor, "x@desk.test", "X", AdminRole::NormalAdmin, vec![])
                .await;
            assert!(matches!(result, Err(ServiceError::Forbidden(_))));
            assert!(matches!(
                desk.state.admins.list_admins(&actor).await,
                Err(ServiceError::Forbidden(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_assign_and_remove_country() {
        let desk = TestDesk::new();
        let actor = super_admin();
        let view = desk
            .state
            .admins
            .create_admin(&actor, "m@desk.test", "M", AdminRole::MiddleAdmin, vec![])
            .await
            .unwrap();
        let admin_id = view.admin.id;

        desk.state.admins.assign_country(&actor, admin_id, "Kenya").await.unwrap();
        let twice = desk.state.admins.assign_country(&actor, admin_id, "KENYA ").await.unwrap();
        assert_eq!(twice.countries, vec!["Kenya".to_string()]);

        let removed = desk.state.admins.remove_country(&actor, admin_id, "kenya").await.unwrap();
        assert!(removed.countries.is_empty());

        let missing = desk.state.admins.remove_country(&actor, admin_id, "Kenya").await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let blank = desk.state.admins.assign_country(&actor, admin_id, "  ").await;
        assert!(matches!(blank, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_disabled_admin_cannot_authenticate() {
        let desk = TestDesk::new();
        let actor = super_admin();
        let view = desk
            .state
            .admins
            .create_admin(&actor, "n@desk.test", "N", AdminRole::NormalAdmin, vec![])
            .await
            .unwrap();
        let token = desk
            .state
            .auth
            .issue_token(view.admin.id, crate::middleware::TokenKind::Admin)
            .unwrap();
        assert!(desk.state.auth.authenticate_admin(&token).await.is_ok());

        let disabled = desk.state.admins.disable_admin(&actor, view.admin.id).await.unwrap();
        assert!(!disabled.enabled);
        assert!(matches!(
            desk.state.auth.authenticate_admin(&token).await,
            Err(ServiceError::Unauthorized(_))
        ));

        let own = desk.state.admins.disable_admin(&actor, actor.id()).await;
        assert!(matches!(own, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_authenticated_middle_admin_carries_scope() {
        let desk = TestDesk::new();
        let actor = super_admin();
        let view = desk
            .state
            .admins
            .create_admin(&actor, "s@desk.test", "S", AdminRole::MiddleAdmin, vec!["Kenya".to_string()])
            .await
            .unwrap();
        let token = desk
            .state
            .auth
            .issue_token(view.admin.id, crate::middleware::TokenKind::Admin)
            .unwrap();

        let identity = desk.state.auth.authenticate_admin(&token).await.unwrap();
        assert_eq!(identity, AdminIdentity::new(view.admin.id, AdminRole::MiddleAdmin, ["kenya"]));
        assert!(identity.can_see(Some("KENYA")));
        assert!(!identity.can_see(Some("Uganda")));
    }

    #[tokio::test]
    async fn test_bootstrap_only_on_empty_store() {
        let desk = TestDesk::new();
        let first = desk.state.admins.bootstrap_super_admin("root@desk.test").await.unwrap();
        assert_eq!(first.unwrap().role, AdminRole::SuperAdmin);

        let second = desk.state.admins.bootstrap_super_admin("other@desk.test").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_activity_is_scoped_to_caller() {
        let desk = TestDesk::new();
        let (_, one) = desk.referral_pair("Kenya").await;
        let (_, two) = desk.referral_pair("Kenya").await;
        let first = normal_admin();
        let second = normal_admin();
        desk.state.referrals.accept_referral(&first, one.id).await.unwrap();
        desk.state.referrals.reject_referral(&second, two.id, "fraud").await.unwrap();

        let own = desk.state.activity.list_activity(&first, false, None).await.unwrap();
        assert!(!own.is_empty());
        assert!(own.iter().all(|a| a.admin_id == Some(first.id())));

        let forbidden = desk.state.activity.list_activity(&first, true, None).await;
        assert!(matches!(forbidden, Err(ServiceError::Forbidden(_))));

        let all = desk.state.activity.list_activity(&super_admin(), true, None).await.unwrap();
        assert!(all.iter().any(|a| a.admin_id == Some(second.id()) && a.action == "referral_rejected"));
        // newest first
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let limited = desk
            .state
            .activity
            .list_activity(&super_admin(), true, Some(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        let stranger = AdminIdentity::new(Uuid::new_v4(), AdminRole::NormalAdmin, Vec::<String>::new());
        let unknown = desk.state.activity.list_activity(&stranger, false, Some(0)).await.unwrap();
        assert!(unknown.is_empty());
    }
}
