use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::tasks::maintenance;

/// Starts the periodic maintenance loops. They stop once `shutdown` flips to `true`.
pub(crate) fn spawn(state: AppState, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    vec![tokio::spawn(maintenance_loop(state, shutdown))]
}

async fn maintenance_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(state.settings().submissions().sweep_interval_seconds.max(1));
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = maintenance::fail_stale_submissions(&state).await {
                    tracing::error!(error = %err, "fail_stale_submissions failed");
                }
                if let Err(err) = maintenance::purge_expired_refresh_tokens(&state).await {
                    tracing::error!(error = %err, "purge_expired_refresh_tokens failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn loops_stop_on_shutdown() {
        let ctx = test_support::setup_test_context().await;
        let (tx, rx) = watch::channel(false);

        let handles = spawn(ctx.state.clone(), rx);
        tx.send(true).expect("send shutdown");

        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("loop stopped")
                .expect("join");
        }
    }
}
