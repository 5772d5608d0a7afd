mod app;
mod cleanup;
mod cli;
mod error;
mod install;
mod model;
mod msg;
mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use cli::Cli;
use install::CommandInstaller;
use model::config::AppConfig;

/// Where and how much to log. Built once, before anything else runs.
#[derive(Debug, Clone)]
struct LogSettings {
    file: PathBuf,
    filter: String,
}

impl LogSettings {
    fn new(config: &AppConfig, verbose: u8) -> Self {
        let filter = match verbose {
            0 => config.general.log_filter.clone(),
            1 => "extpack=debug".to_string(),
            _ => "extpack=trace".to_string(),
        };

        Self {
            file: config.log_file(),
            filter,
        }
    }
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if err.use_stderr() {
                log_usage_error(&err);
            }
            err.exit()
        }
    };
    let config = AppConfig::load(cli.config.as_deref())?;

    let _guard = init_logging(&LogSettings::new(&config, cli.verbose))?;
    tracing::info!("extpack starting");

    let installer = CommandInstaller::from_config(&config.install);
    let mut app = App::new(config, installer, cli.mode());

    match app.run(cli.list.as_deref()) {
        Ok(summary) => {
            let line = summary.describe();
            tracing::info!("{line}");
            println!("{line}");
            Ok(())
        }
        Err(err) => {
            tracing::error!("{err:#}");
            Err(err)
        }
    }
}

/// Wrong arguments are logged too, with the config available without `--config`.
fn log_usage_error(err: &clap::Error) {
    let Ok(config) = AppConfig::load(None) else {
        return;
    };
    let Ok(guard) = init_logging(&LogSettings::new(&config, 0)) else {
        return;
    };
    tracing::error!("{}", cli::usage_error_line(err));
    // `exit` skips destructors; flush the non-blocking writer first.
    drop(guard);
}

/// Append to the log file (never stdout). `RUST_LOG` wins over the configured filter.
fn init_logging(settings: &LogSettings) -> Result<WorkerGuard> {
    let dir = settings
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = settings
        .file
        .file_name()
        .context("log_file must name a file")?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .with_context(|| format!("invalid log filter {:?}", settings.filter))?;

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    Ok(guard)
}
