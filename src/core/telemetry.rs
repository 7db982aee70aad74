use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Directives appended to the configured level so driver chatter stays out of
/// job logs unless explicitly requested through `RUST_LOG`.
const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "hyper=warn", "reqwest=warn", "redis=warn"];

pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&settings.telemetry().log_level)));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if settings.telemetry().json {
        builder
            .json()
            .with_current_span(true)
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    } else {
        builder
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    }

    Ok(())
}

fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|item| item.to_string()));
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::default_directives;

    #[test]
    fn default_directives_keep_base_level_first() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("sqlx=warn"));
    }
}
