use std::env;
use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

static INIT: Once = Once::new();

/// Installs the global subscriber once. `RUST_LOG` wins over `level`;
/// without it, HTTP client internals are held at `warn`.
pub fn init_logging(level: &str, format: LogFormat) {
    INIT.call_once(|| {
        let filter = if env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::try_new(format!(
                "{krate}={level},job_agent={level},hyper=warn,reqwest=warn",
                krate = env!("CARGO_CRATE_NAME"),
                level = level
            ))
            .unwrap_or_else(|_| EnvFilter::new("info"))
        };

        let registry = tracing_subscriber::registry().with(filter);
        let result = match format {
            LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
        };
        if let Err(err) = result {
            eprintln!("logging already initialised: {}", err);
        }
    });
}
