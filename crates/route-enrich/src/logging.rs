/*!
Logging and profiling setup for the command line.

Two implementations share one API:

- real: compiled with `feature = "profiling"`. Adds a tracing-chrome layer next to the
  log output and hands back the `FlushGuard` that writes the trace file when dropped.
- stub: everything else. Log output only.

Logs always go to stderr so stdout stays valid JSON.
*/

use crate::settings::Settings;

/// Default filter when `RUST_LOG` is unset
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else if cfg!(debug_assertions) {
        "info,route_enrich_lib=debug"
    } else {
        "info"
    }
}

fn env_filter(verbose: bool) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
}

#[cfg(feature = "profiling")]
mod inner {
    use super::env_filter;
    use crate::settings::Settings;
    use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    /// Keeps the trace file open until dropped
    pub struct LoggingGuard {
        _chrome: FlushGuard,
    }

    pub fn setup_logging(settings: &Settings) -> LoggingGuard {
        let mut builder = ChromeLayerBuilder::new().include_args(true);
        if let Some(path) = &settings.trace_file {
            builder = builder.file(path);
        }
        let (chrome_layer, guard) = builder.build();

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(settings.verbose));

        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .init();

        match &settings.trace_file {
            Some(path) => tracing::info!("Recording Chrome trace into {}", path.display()),
            None => tracing::info!("Recording Chrome trace into ./trace-*.json"),
        }

        LoggingGuard { _chrome: guard }
    }
}

#[cfg(not(feature = "profiling"))]
mod inner {
    use super::env_filter;
    use crate::settings::Settings;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    pub struct LoggingGuard;

    pub fn setup_logging(settings: &Settings) -> LoggingGuard {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(settings.verbose));
        tracing_subscriber::registry().with(fmt_layer).init();

        tracing::debug!("Logging initialized (profiling disabled in this build)");
        LoggingGuard
    }
}

pub use inner::LoggingGuard;

/// Install the global subscriber. Hold the returned guard until the program ends.
pub fn init(settings: &Settings) -> LoggingGuard {
    inner::setup_logging(settings)
}
