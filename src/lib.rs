use std::io;

use color_eyre::owo_colors::OwoColorize;
use eyre::Result;

pub mod cli;
pub mod config;
pub mod hardware;

mod misc;

pub use cli::CliOpts;

/// Installs error reporting and logging. Call once, before anything else.
pub fn init() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter("cryostat=info")
        .with_writer(io::stderr)
        .init();

    Ok(())
}

pub fn banner() {
    let target = [
        option_env!("CARGO_CFG_TARGET_ARCH"),
        option_env!("CARGO_CFG_TARGET_OS"),
        option_env!("CARGO_CFG_TARGET_ENV"),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("-");

    eprintln!(
        "{} {} {}",
        env!("CARGO_PKG_NAME").bold(),
        env!("CARGO_PKG_VERSION"),
        format!("({target}, {})", option_env!("PROFILE").unwrap_or("unknown")).dimmed()
    );
}

pub fn cli(opts: CliOpts) -> Result<()> {
    cli::execute_command(opts)
}
