use tracing::{info, warn};

use crate::{
    dao::{
        booking_store::{StrikeResetOutcome, WhitelistOutcome},
        models::NotificationKind,
    },
    dto::admin::WhitelistResponse,
    error::ServiceError,
    services::notification_service,
    state::SharedState,
};

/// Run the periodic strike amnesty: clear every member's strikes and lift
/// every blacklist, then tell the unblacklisted members they can book again.
pub async fn reset_all(state: &SharedState) -> Result<StrikeResetOutcome, ServiceError> {
    let store = state.require_store().await?;
    let outcome = store
        .reset_strikes(state.config().write_batch_size)
        .await?;

    info!(
        users_scanned = outcome.users_scanned,
        struck = outcome.struck_count,
        unblacklisted = outcome.blacklisted_count,
        batches = outcome.batches,
        "strike amnesty swept"
    );

    // A failed unlock push must not fail the sweep that already happened.
    for user in &outcome.unblacklisted {
        if let Err(err) = notification_service::deliver_to_user(
            state,
            user,
            NotificationKind::AccountUnlocked,
            None,
            notification_service::unlock_message(),
        )
        .await
        {
            warn!(user_id = %user.id, error = %err, "failed to deliver unlock notification");
        }
    }

    Ok(outcome)
}

/// Clear one member's strikes on staff request, lifting their blacklist if
/// they carried one.
pub async fn whitelist_user(
    state: &SharedState,
    user_id: String,
) -> Result<WhitelistResponse, ServiceError> {
    let store = state.require_store().await?;

    let outcome = store.clear_strikes(user_id.clone()).await?;
    let (user, effect) = match outcome {
        WhitelistOutcome::Cleared { user, effect } => (user, effect),
        WhitelistOutcome::UserNotFound => {
            return Err(ServiceError::NotFound(format!(
                "user `{user_id}` not found"
            )));
        }
    };

    if effect.was_blacklisted
        && let Err(err) = notification_service::deliver_to_user(
            state,
            &user,
            NotificationKind::AccountUnlocked,
            None,
            notification_service::unlock_message(),
        )
        .await
    {
        warn!(user_id = %user.id, error = %err, "failed to deliver unlock notification");
    }

    Ok(WhitelistResponse {
        user_id: user.id,
        had_strikes: effect.had_strikes,
        was_blacklisted: effect.was_blacklisted,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dao::booking_store::BookingStore;
    use crate::dao::models::UserEntity;
    use crate::state::testing::harness;

    const NOW: time::OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    fn member(id: &str, strikes: u8, blacklisted: bool) -> UserEntity {
        let mut user = UserEntity {
            id: id.to_owned(),
            name: id.to_owned(),
            fcm_tokens: vec![format!("{id}-token")],
            strikes: Default::default(),
            is_admin: false,
            uses_aggregator_pass: false,
        };
        user.strikes.late_cancellations = strikes;
        user.strikes.blacklisted = blacklisted;
        if blacklisted {
            user.strikes.blacklisted_at = Some(NOW);
        }
        user
    }

    #[tokio::test]
    async fn amnesty_notifies_every_unblacklisted_member() {
        let h = harness(NOW).await;
        h.store.upsert_user(member("alice", 2, false)).await.unwrap();
        h.store.upsert_user(member("bob", 3, true)).await.unwrap();
        h.store.upsert_user(member("carol", 3, true)).await.unwrap();

        let outcome = reset_all(&h.state).await.unwrap();

        assert_eq!(outcome.struck_count, 3);
        assert_eq!(outcome.blacklisted_count, 2);
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 2);
        let mut tokens: Vec<_> = sent.iter().flat_map(|push| push.tokens.clone()).collect();
        tokens.sort();
        assert_eq!(tokens, vec!["bob-token", "carol-token"]);
    }

    #[tokio::test]
    async fn whitelisting_a_blacklisted_member_sends_the_unlock_push() {
        let h = harness(NOW).await;
        h.store.upsert_user(member("dave", 3, true)).await.unwrap();

        let response = whitelist_user(&h.state, "dave".to_owned()).await.unwrap();

        assert!(response.had_strikes);
        assert!(response.was_blacklisted);
        assert_eq!(h.notifier.sent().len(), 1);

        let dave = h.store.find_user("dave".to_owned()).await.unwrap().unwrap();
        assert_eq!(dave.strikes.late_cancellations, 0);
        assert!(!dave.strikes.blacklisted);
    }

    #[tokio::test]
    async fn whitelisting_a_clean_member_is_quiet() {
        let h = harness(NOW).await;
        h.store.upsert_user(member("erin", 0, false)).await.unwrap();

        let response = whitelist_user(&h.state, "erin".to_owned()).await.unwrap();

        assert!(!response.had_strikes);
        assert!(!response.was_blacklisted);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn whitelisting_an_unknown_member_is_an_error() {
        let h = harness(NOW).await;

        let err = whitelist_user(&h.state, "nobody".to_owned())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
