// Path: crates/telemetry/src/init.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output encoding of the stderr log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, for machine consumption.
    Json,
    /// Human-readable single-line events.
    #[default]
    Compact,
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initializes the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the default `info` filter. Records emitted through the
/// `log` facade are forwarded into `tracing`.
pub fn init_tracing(format: LogFormat) -> Result<(), anyhow::Error> {
    let filter = env_filter("info");
    tracing_log::LogTracer::init()?;
    match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true);
            tracing::subscriber::set_global_default(Registry::default().with(filter).with(layer))?;
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true);
            tracing::subscriber::set_global_default(Registry::default().with(filter).with(layer))?;
        }
    }
    Ok(())
}

/// Installs a test-writer subscriber once per test binary; later calls are no-ops.
pub fn init_test_tracing() {
    let layer = fmt::layer().with_test_writer().with_target(true);
    let _ = Registry::default()
        .with(env_filter("info,cluster=debug,validator=debug,state=debug"))
        .with(layer)
        .try_init();
}
