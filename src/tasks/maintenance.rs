use anyhow::{Context, Result};
use time::Duration;

use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::services::record_store::RecordStore;

/// Fails submissions that stayed `Pending` past the configured limit. Covers
/// jobs lost to a crash or to a failed force-fail write.
pub(crate) async fn fail_stale_submissions(state: &AppState) -> Result<u64> {
    let stale_after = state.settings().submissions().stale_after_minutes;
    let cutoff = now_utc() - Duration::minutes(stale_after as i64);

    let failed = state
        .records()
        .fail_stale_submissions(cutoff)
        .await
        .context("Failed to fail stale submissions")?;

    if failed > 0 {
        tracing::warn!(failed, stale_after_minutes = stale_after, "Failed stale pending submissions");
        metrics::counter!("stale_submissions_failed_total").increment(failed);
    }

    Ok(failed)
}

/// Deletes refresh tokens past their expiry.
pub(crate) async fn purge_expired_refresh_tokens(state: &AppState) -> Result<u64> {
    let purged = state
        .records()
        .purge_expired_refresh_tokens()
        .await
        .context("Failed to purge expired refresh tokens")?;

    if purged > 0 {
        tracing::info!(purged, "Purged expired refresh tokens");
    }

    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::SubmissionStatus;
    use crate::test_support;

    #[tokio::test]
    async fn only_old_pending_submissions_are_failed() {
        let ctx = test_support::setup_test_context().await;
        let records = ctx.records.clone();
        let answers = vec!["x".to_string()];

        let old = records.create_pending_submission("any", &answers).await.unwrap();
        let fresh = records.create_pending_submission("any", &answers).await.unwrap();
        records.backdate_submission(old, Duration::hours(2));

        let failed = fail_stale_submissions(&ctx.state).await.expect("sweep");

        assert_eq!(failed, 1);
        assert_eq!(records.submission(old).unwrap().status, SubmissionStatus::Failed);
        assert_eq!(records.submission(fresh).unwrap().status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn expired_refresh_tokens_are_purged() {
        let ctx = test_support::setup_test_context().await;
        let user = ctx.records.seed_user("owner@example.com");
        ctx.records
            .save_refresh_token("expired", &user.id, now_utc() - Duration::minutes(1))
            .await
            .unwrap();
        ctx.records
            .save_refresh_token("live", &user.id, now_utc() + Duration::days(1))
            .await
            .unwrap();

        let purged = purge_expired_refresh_tokens(&ctx.state).await.expect("purge");

        assert_eq!(purged, 1);
        assert_eq!(ctx.records.refresh_token_count(), 1);
        assert_eq!(ctx.records.consume_refresh_token("live").await.unwrap(), Some(user.id));
    }
}
