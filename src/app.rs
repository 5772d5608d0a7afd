use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};

use crate::cleanup::{self, CleanupPlan, CleanupReport};
use crate::install::{self, InstallReport, Installer};
use crate::model::config::AppConfig;
use crate::sync::{SyncHandle, SyncReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Install, clean up and archive.
    InstallOnly,
    /// Mirror the package cache into the watch destination while installing,
    /// then clean up, rename and archive that directory instead.
    Watch,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub install: Option<InstallReport>,
    pub sync: Option<SyncReport>,
    pub cleanup: Option<CleanupReport>,
}

impl RunSummary {
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();

        match &self.install {
            Some(report) => parts.push(format!(
                "{} installed, {} failed",
                report.installed.len(),
                report.failed.len()
            )),
            None => parts.push("no extensions installed".to_string()),
        }

        if let Some(report) = &self.sync {
            parts.push(format!("{} packages copied", report.copied));
            if let Some(reason) = &report.halted {
                parts.push(format!("sync halted: {reason}"));
            }
        }

        match &self.cleanup {
            Some(report) => parts.push(format!(
                "{} deleted, {} renamed, archive: {}",
                report.deleted.len(),
                report.renamed.len(),
                report.archive.display()
            )),
            None => parts.push("archive skipped".to_string()),
        }

        parts.join("; ")
    }
}

pub struct App<I: Installer> {
    config: AppConfig,
    installer: I,
    mode: RunMode,
}

impl<I: Installer> App<I> {
    pub fn new(config: AppConfig, installer: I, mode: RunMode) -> Self {
        Self {
            config,
            installer,
            mode,
        }
    }

    /// watcher (watch mode) → install → drain watcher → cleanup → archive.
    pub fn run(&mut self, list: Option<&Path>) -> Result<RunSummary> {
        // The editor's live extensions folder is never renamed.
        let destination = match self.mode {
            RunMode::InstallOnly => self.config.destination(),
            RunMode::Watch => self.config.watch_destination(),
        };
        fs::create_dir_all(&destination)
            .with_context(|| format!("failed to create {}", destination.display()))?;

        let sync = match self.mode {
            RunMode::Watch => self.start_sync(&destination),
            RunMode::InstallOnly => None,
        };

        let mut summary = RunSummary {
            install: self.install(list),
            ..RunSummary::default()
        };

        if let Some(handle) = sync {
            // Trailing notifications from the last install are still in flight.
            thread::sleep(self.config.settle_delay());
            summary.sync = Some(handle.stop());
        }

        if summary.install.is_none() && !self.config.cleanup.archive_without_list {
            tracing::warn!("nothing was installed, skipping cleanup and archive");
            return Ok(summary);
        }

        let pattern = self.config.delete_pattern()?;
        let rename_suffix = match self.mode {
            RunMode::Watch => self.config.cleanup.rename_suffix.as_deref(),
            RunMode::InstallOnly => None,
        };
        let archive_path = self.config.archive_path();

        summary.cleanup = Some(cleanup::run(
            &destination,
            &CleanupPlan {
                delete_pattern: &pattern,
                rename_suffix,
                archive_path: &archive_path,
            },
        )?);

        Ok(summary)
    }

    fn start_sync(&self, destination: &Path) -> Option<SyncHandle> {
        let watch_dir: PathBuf = self.config.watch_dir();
        match SyncHandle::start(&watch_dir, destination, self.config.watch.on_error) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(
                    "cannot watch {}: {err}; continuing without sync",
                    watch_dir.display()
                );
                None
            }
        }
    }

    fn install(&mut self, list: Option<&Path>) -> Option<InstallReport> {
        let Some(path) = list else {
            tracing::error!("Usage: extpack <path_to_text_file>");
            return None;
        };

        match install::install_from_file(path, &mut self.installer) {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::error!("Error: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use crate::cleanup::archive::tests::entries;
    use crate::error::InstallError;
    use crate::install::tests::RecordingInstaller;
    use crate::model::extension_list::ExtensionId;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        config: AppConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let mut config = AppConfig::defaults().unwrap();
            config.paths.destination = path_string(&tmp.path().join("extensions"));
            config.paths.watch_destination = path_string(&tmp.path().join("vsix"));
            config.paths.watch_dir = path_string(&tmp.path().join("cache"));
            config.cleanup.archive_path = path_string(&tmp.path().join("out.tar.gz"));
            config.watch.settle_ms = 0;
            Self { tmp, config }
        }

        fn dest(&self) -> PathBuf {
            self.config.destination()
        }

        fn watch_dest(&self) -> PathBuf {
            self.config.watch_destination()
        }

        fn list(&self, lines: &[&str]) -> PathBuf {
            let path = self.tmp.path().join("extensions.txt");
            fs::write(&path, lines.join("\n")).unwrap();
            path
        }
    }

    fn path_string(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    /// Everything written by `tracing` on this thread while the closure runs.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
            let logs = CapturedLogs::default();
            let writer = logs.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || writer.clone())
                .with_ansi(false)
                .finish();

            let out = tracing::subscriber::with_default(subscriber, f);
            let text = String::from_utf8_lossy(&logs.0.lock().unwrap()).to_string();
            (out, text)
        }
    }

    #[test]
    fn install_only_end_to_end() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.dest()).unwrap();
        fs::write(fx.dest().join("foo.bar-1.0.0.sigzip"), "sig").unwrap();
        fs::write(fx.dest().join("extensions.json"), "[]").unwrap();
        let list = fx.list(&["foo.bar", "", "  ", "baz.qux"]);

        let mut app = App::new(
            fx.config.clone(),
            RecordingInstaller::default(),
            RunMode::InstallOnly,
        );
        let summary = app.run(Some(&list)).unwrap();

        assert_eq!(app.installer.calls, vec!["foo.bar", "baz.qux"]);
        assert_eq!(summary.install.unwrap().installed.len(), 2);
        assert!(summary.sync.is_none());
        assert_eq!(
            entries(&fx.config.archive_path()),
            vec!["extensions", "extensions/extensions.json"]
        );
    }

    #[test]
    fn missing_list_still_archives_by_default() {
        let fx = Fixture::new();
        let mut app = App::new(
            fx.config.clone(),
            RecordingInstaller::default(),
            RunMode::InstallOnly,
        );

        let missing = fx.tmp.path().join("missing.txt");
        let (summary, logs) = CapturedLogs::capture(|| app.run(Some(&missing)).unwrap());

        assert!(app.installer.calls.is_empty());
        assert!(
            logs.lines()
                .any(|line| line.contains("ERROR") && line.contains("missing.txt does not exist")),
            "{logs}"
        );
        assert!(summary.install.is_none());
        assert!(summary.cleanup.is_some());
        assert!(fx.config.archive_path().exists());
        assert!(fx.dest().is_dir());
    }

    #[test]
    fn missing_list_can_skip_the_archive() {
        let mut fx = Fixture::new();
        fx.config.cleanup.archive_without_list = false;
        let mut app = App::new(
            fx.config.clone(),
            RecordingInstaller::default(),
            RunMode::InstallOnly,
        );

        let summary = app.run(None).unwrap();

        assert!(summary.cleanup.is_none());
        assert!(!fx.config.archive_path().exists());
    }

    #[test]
    fn usage_error_is_logged_when_no_list_is_given() {
        let fx = Fixture::new();
        let mut app = App::new(
            fx.config.clone(),
            RecordingInstaller::default(),
            RunMode::InstallOnly,
        );

        let (_, logs) = CapturedLogs::capture(|| app.run(None).unwrap());

        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("Usage: extpack"), "{logs}");
    }

    #[test]
    fn watch_mode_without_cache_dir_still_renames_and_archives() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.watch_dest()).unwrap();
        fs::write(fx.watch_dest().join("foo.bar-1.0.0"), "zip").unwrap();
        let list = fx.list(&["foo.bar"]);

        let mut app = App::new(fx.config.clone(), RecordingInstaller::default(), RunMode::Watch);
        let summary = app.run(Some(&list)).unwrap();

        assert!(summary.sync.is_none());
        assert_eq!(
            entries(&fx.config.archive_path()),
            vec!["vsix", "vsix/foo.bar-1.0.0.vsix"]
        );
    }

    #[test]
    fn watch_mode_leaves_the_editor_extensions_folder_alone() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.dest()).unwrap();
        fs::write(fx.dest().join("extensions.json"), "[]").unwrap();
        fs::write(fx.dest().join("pkg.sigzip"), "sig").unwrap();
        fs::create_dir_all(fx.watch_dest()).unwrap();
        fs::write(fx.watch_dest().join("pkg"), "zip").unwrap();
        let list = fx.list(&["foo.bar"]);

        let mut app = App::new(fx.config.clone(), RecordingInstaller::default(), RunMode::Watch);
        let summary = app.run(Some(&list)).unwrap();

        assert_eq!(fs::read_to_string(fx.dest().join("extensions.json")).unwrap(), "[]");
        assert!(fx.dest().join("pkg.sigzip").exists());
        assert!(!fx.dest().join("extensions.json.vsix").exists());
        assert_eq!(summary.cleanup.unwrap().renamed, vec![fx.watch_dest().join("pkg.vsix")]);
    }

    /// Stands in for the editor: each install drops a package into the cache.
    struct DownloadingInstaller {
        staging: PathBuf,
        cache: PathBuf,
    }

    impl Installer for DownloadingInstaller {
        fn install(&mut self, id: &ExtensionId) -> Result<(), InstallError> {
            let staged = self.staging.join(id.as_str());
            fs::write(&staged, format!("package {id}")).unwrap();
            fs::rename(&staged, self.cache.join(id.as_str())).unwrap();
            Ok(())
        }
    }

    #[test]
    fn watch_mode_mirrors_downloads_before_archiving() {
        let mut fx = Fixture::new();
        fx.config.watch.settle_ms = 1000;
        let cache = fx.config.watch_dir();
        let staging = fx.tmp.path().join("staging");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&staging).unwrap();
        fs::create_dir_all(fx.watch_dest()).unwrap();
        fs::write(fx.watch_dest().join("foo.bar"), "already here").unwrap();
        let list = fx.list(&["foo.bar", "baz.qux"]);

        let installer = DownloadingInstaller {
            staging,
            cache: cache.clone(),
        };
        let mut app = App::new(fx.config.clone(), installer, RunMode::Watch);
        let summary = app.run(Some(&list)).unwrap();

        let sync = summary.sync.unwrap();
        assert_eq!(sync.copied, 1);
        assert_eq!(sync.failed, 0);
        assert_eq!(
            fs::read_to_string(fx.watch_dest().join("baz.qux.vsix")).unwrap(),
            "package baz.qux"
        );
        assert_eq!(
            fs::read_to_string(fx.watch_dest().join("foo.bar.vsix")).unwrap(),
            "already here"
        );
        assert_eq!(
            entries(&fx.config.archive_path()),
            vec!["vsix", "vsix/baz.qux.vsix", "vsix/foo.bar.vsix"]
        );
    }

    #[test]
    fn summary_mentions_each_stage() {
        let summary = RunSummary {
            install: Some(InstallReport::default()),
            sync: Some(SyncReport {
                copied: 3,
                ..SyncReport::default()
            }),
            cleanup: None,
        };

        assert_eq!(
            summary.describe(),
            "0 installed, 0 failed; 3 packages copied; archive skipped"
        );
    }
}
