//! Mirrors files that appear in a watched directory into a destination
//! directory, copying only names the destination does not have yet.
//!
//! A [`SyncHandle`] owns the `notify` watcher and a worker thread. The worker
//! handles one message at a time, in delivery order. [`SyncHandle::stop`]
//! drops the watcher, queues [`SyncMsg::Stop`] behind any delivered events and
//! joins the worker, so every copy has finished when it returns.

pub mod event;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;

use crate::error::SyncError;
use crate::msg::SyncMsg;

pub use event::WatchEvent;

/// What the worker does after a failed copy or a watcher error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorPolicy {
    #[default]
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied(u64),
    AlreadyPresent,
    /// Removed from the watched directory before it could be opened.
    SourceGone,
    NotAFile,
}

#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the worker stopped early under [`SyncErrorPolicy::Stop`].
    pub halted: Option<String>,
}

/// Copy `source` to `target` unless `target` already exists.
///
/// The target is opened with `create_new`, so two deliveries of the same event
/// produce one copy even if they race.
pub fn copy_if_absent(source: &Path, target: &Path) -> Result<CopyOutcome, SyncError> {
    let copy_err = |err: io::Error| SyncError::Copy {
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: err,
    };

    if target.exists() {
        return Ok(CopyOutcome::AlreadyPresent);
    }

    let mut input = match File::open(source) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(CopyOutcome::SourceGone),
        Err(err) => return Err(copy_err(err)),
    };

    let metadata = input.metadata().map_err(copy_err)?;
    if !metadata.is_file() {
        return Ok(CopyOutcome::NotAFile);
    }

    let mut output = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Ok(CopyOutcome::AlreadyPresent);
        }
        Err(err) => return Err(copy_err(err)),
    };

    match io::copy(&mut input, &mut output) {
        Ok(bytes) => {
            output
                .set_permissions(metadata.permissions())
                .map_err(copy_err)?;
            Ok(CopyOutcome::Copied(bytes))
        }
        Err(err) => {
            drop(output);
            // Leave no truncated file behind; the next event can retry the name.
            let _ = fs::remove_file(target);
            Err(copy_err(err))
        }
    }
}

/// Event-handling half of the synchronizer, run on the worker thread.
#[derive(Debug)]
pub struct Synchronizer {
    destination: PathBuf,
    policy: SyncErrorPolicy,
    report: SyncReport,
}

impl Synchronizer {
    pub fn new(destination: PathBuf, policy: SyncErrorPolicy) -> Self {
        Self {
            destination,
            policy,
            report: SyncReport::default(),
        }
    }

    pub fn handle(&mut self, event: &WatchEvent) -> Result<CopyOutcome, SyncError> {
        let target = self.destination.join(&event.file_name);
        let outcome = copy_if_absent(&event.path(), &target)?;

        match &outcome {
            CopyOutcome::Copied(bytes) => {
                tracing::info!(
                    "Copied {} to {} ({bytes} bytes)",
                    event.path().display(),
                    target.display()
                );
                self.report.copied += 1;
            }
            CopyOutcome::AlreadyPresent => {
                tracing::debug!("{} already present, skipping", target.display());
                self.report.skipped += 1;
            }
            CopyOutcome::SourceGone | CopyOutcome::NotAFile => {
                tracing::debug!("{} is not a copyable file, skipping", event.path().display());
                self.report.skipped += 1;
            }
        }

        Ok(outcome)
    }

    /// Consume messages until `Stop`, every sender is gone, or the policy halts.
    pub fn run(mut self, rx: Receiver<SyncMsg>) -> SyncReport {
        let span = tracing::info_span!("sync", destination = %self.destination.display());
        let _enter = span.enter();

        while let Ok(msg) = rx.recv() {
            let result = match msg {
                SyncMsg::Event(raw) => {
                    let Some(event) = WatchEvent::from_notify(&raw) else {
                        tracing::trace!("ignoring {:?}", raw.kind);
                        continue;
                    };
                    tracing::info!("Detected {event}");
                    self.handle(&event).map(|_| ())
                }
                SyncMsg::WatchError(err) => Err(SyncError::Watch(err)),
                SyncMsg::Stop => break,
            };

            if let Err(err) = result {
                if self.should_halt(err) {
                    break;
                }
            }
        }

        tracing::info!(
            "sync finished: {} copied, {} skipped, {} failed",
            self.report.copied,
            self.report.skipped,
            self.report.failed
        );
        self.report
    }

    fn should_halt(&mut self, err: SyncError) -> bool {
        tracing::error!("{err}");
        self.report.failed += 1;

        match self.policy {
            SyncErrorPolicy::Continue => false,
            SyncErrorPolicy::Stop => {
                tracing::warn!("stopping directory sync after failure");
                self.report.halted = Some(err.to_string());
                true
            }
        }
    }
}

/// A running watcher plus its worker thread.
pub struct SyncHandle {
    watcher: RecommendedWatcher,
    tx: Sender<SyncMsg>,
    worker: JoinHandle<SyncReport>,
}

impl SyncHandle {
    pub fn start(
        source: &Path,
        destination: &Path,
        policy: SyncErrorPolicy,
    ) -> Result<Self, SyncError> {
        let (tx, rx) = mpsc::channel::<SyncMsg>();

        let tx_watch = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let msg = match res {
                Ok(event) => SyncMsg::Event(event),
                Err(err) => SyncMsg::WatchError(err),
            };
            // The worker is gone once it halted; late events are dropped.
            let _ = tx_watch.send(msg);
        })?;

        watcher.watch(source, RecursiveMode::NonRecursive)?;
        tracing::info!(
            "watching {} -> {}",
            source.display(),
            destination.display()
        );

        let synchronizer = Synchronizer::new(destination.to_path_buf(), policy);
        let worker = thread::spawn(move || synchronizer.run(rx));

        Ok(Self {
            watcher,
            tx,
            worker,
        })
    }

    /// Stop accepting events, let the worker drain what was delivered, and
    /// return its report.
    pub fn stop(self) -> SyncReport {
        let Self {
            watcher,
            tx,
            worker,
        } = self;

        drop(watcher);
        let _ = tx.send(SyncMsg::Stop);

        match worker.join() {
            Ok(report) => report,
            Err(_) => {
                tracing::error!("sync worker panicked");
                SyncReport {
                    halted: Some("sync worker panicked".to_string()),
                    ..SyncReport::default()
                }
            }
        }
    }
}
