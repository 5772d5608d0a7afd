use std::path::PathBuf;

use clap::Parser;

use crate::app::RunMode;

/// Install editor extensions from a list and archive the extensions folder.
#[derive(Parser, Debug)]
#[command(name = "extpack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Text file with one extension identifier per line
    pub list: Option<PathBuf>,

    /// Mirror packages the editor downloads into its cache while installing
    #[arg(short, long)]
    pub watch: bool,

    /// Extra config file layered over the defaults and the user config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        if self.watch {
            RunMode::Watch
        } else {
            RunMode::InstallOnly
        }
    }
}

/// First line of a clap error, without styling, for the log file.
pub fn usage_error_line(err: &clap::Error) -> String {
    err.render()
        .to_string()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("invalid arguments")
        .to_string()
}
