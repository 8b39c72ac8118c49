//! ntmul: multiply large integers with number-theoretic transforms.

use ntmul_lib::{app, config, errors};

fn main() {
    let config = config::AppConfig::parse();

    let level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if let Err(e) = app::run(&config) {
        eprintln!("Error: {e:#}");
        std::process::exit(errors::exit_code(&e));
    }
}
