//! Chimer - repeating interval alarm
//!
//! Plays a sound and raises a desktop notification every time the interval
//! elapses:
//! - Interactive menu (default command)
//! - Headless `start` for scripts and terminals
//! - Sound and config utilities

mod alarm;
mod cli;
mod logging;
mod notifications;
mod settings;
mod sound;

use std::future::Future;
use std::time::Duration;

use clap::Parser;
use cli::{exit_codes, exit_code_for, Cli, Commands};
use settings::Settings;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = logging::init(cli.verbose, cli.json_output, cli.log_level.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    tracing::debug!(
        "[Main] chimer {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT"),
        env!("BUILD_DATE")
    );

    // Create tokio runtime for async commands
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let settings = Settings::load();
    let system_audio = cli.system_audio;

    let exit_code = match cli.command {
        Some(Commands::Start(args)) => {
            rt.block_on(report(cli::start::run(args, settings, system_audio)))
        }
        Some(Commands::Sound(args)) => {
            rt.block_on(report(cli::sound::run(args, settings, system_audio)))
        }
        Some(Commands::Config(args)) => rt.block_on(report(cli::config::run(args, system_audio))),
        Some(Commands::Menu) | None => {
            rt.block_on(report(cli::menu::run(settings, system_audio)))
        }
    };

    // Stdin is read on a blocking thread that may still be waiting for a line
    rt.shutdown_timeout(Duration::from_millis(100));
    exit_code
}

/// Await a command and turn its result into an exit code
async fn report(command: impl Future<Output = anyhow::Result<()>>) -> i32 {
    match command.await {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            tracing::debug!("[Main] {:?}", e);
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}
