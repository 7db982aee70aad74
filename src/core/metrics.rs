use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!(
        "generation_jobs_total",
        "Generation jobs that reached a terminal status, labelled by kind and status"
    );
    metrics::describe_histogram!(
        "generation_duration_seconds",
        "Wall time of a generation job from start to terminal status"
    );
    metrics::describe_counter!(
        "submission_jobs_total",
        "Submission evaluations that reached a terminal status, labelled by status"
    );
    metrics::describe_counter!(
        "submission_finalize_failures_total",
        "Submissions whose terminal write and forced failure both failed"
    );
    metrics::describe_counter!(
        "job_queue_rejections_total",
        "Background jobs refused because the queue was full"
    );
    metrics::describe_counter!(
        "stale_submissions_failed_total",
        "Pending submissions failed by the maintenance sweep"
    );
}
