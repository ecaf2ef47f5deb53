use clap::Parser;

mod commands;
mod error;
mod input;
mod logging;
mod settings;

use settings::Settings;

fn main() {
    let settings = Settings::parse();
    let guard = logging::init(&settings);

    #[cfg(feature = "profiling")]
    profiling::register_thread!("Main");

    tracing::debug!("Starting {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if let Err(e) = commands::run(settings.command) {
        tracing::error!("{}", e);
        drop(guard);
        std::process::exit(1);
    }
}
