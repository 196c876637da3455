use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const METRICS_PREFIX: &str = "courier";

/// Installs the global tracing subscriber. Filtering follows `RUST_LOG` and
/// defaults to `info`. Events are also forwarded to Sentry when a DSN is
/// configured; the returned guard flushes them on drop.
pub fn init_logging(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let guard = config.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(sentry_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    guard
}

/// Routes the `metrics` facade to statsd. Failures only cost us metrics.
pub fn init_metrics(config: &MetricsConfig) {
    let recorder = match StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
    {
        Ok(recorder) => recorder,
        Err(err) => {
            tracing::warn!("Could not create statsd recorder: {err}");
            return;
        }
    };

    if let Err(err) = metrics::set_global_recorder(recorder) {
        tracing::warn!("Could not install statsd recorder: {err}");
        return;
    }
    shared::metrics_defs::describe_all(tracker::metrics_defs::ALL_METRICS);
}
