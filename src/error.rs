use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtpackError {
    #[error("extension list {} does not exist", .0.display())]
    MissingList(PathBuf),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure of a single extension install. Never aborts the remaining installs.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    ExitStatus { program: String, status: ExitStatus },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("copy {} -> {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watcher: {0}")]
    Watch(#[from] notify::Error),
}
