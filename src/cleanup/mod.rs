pub mod archive;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;

pub use archive::write_archive;

#[derive(Debug, Clone)]
pub struct CleanupPlan<'a> {
    pub delete_pattern: &'a Regex,
    /// Appended to every remaining file; `None` skips the rename step.
    pub rename_suffix: Option<&'a str>,
    pub archive_path: &'a Path,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<PathBuf>,
    pub renamed: Vec<PathBuf>,
    pub archive: PathBuf,
}

/// Delete, rename, then archive `dir`.
pub fn run(dir: &Path, plan: &CleanupPlan<'_>) -> Result<CleanupReport> {
    let span = tracing::info_span!("cleanup", dir = %dir.display());
    let _enter = span.enter();

    let deleted = delete_matching(dir, plan.delete_pattern)?;
    let renamed = match plan.rename_suffix {
        Some(suffix) => append_suffix(dir, suffix)?,
        None => Vec::new(),
    };
    write_archive(dir, plan.archive_path)?;

    Ok(CleanupReport {
        deleted,
        renamed,
        archive: plan.archive_path.to_path_buf(),
    })
}

/// Remove top-level regular files of `dir` whose name matches `pattern`.
pub fn delete_matching(dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    let mut deleted = Vec::new();

    for (path, name) in regular_files(dir)? {
        if !pattern.is_match(&name.to_string_lossy()) {
            continue;
        }
        fs::remove_file(&path).with_context(|| format!("failed to delete {}", path.display()))?;
        tracing::info!("Deleted {}", path.display());
        deleted.push(path);
    }

    Ok(deleted)
}

/// Rename every top-level regular file `name` to `name + suffix`.
///
/// A name that already ends in `suffix` counts as suffixed and is left as it
/// is, so `a.vsix` stays `a.vsix` rather than becoming `a.vsix.vsix` and a
/// second pass renames nothing. Never overwrites: an existing target fails.
pub fn append_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut renamed = Vec::new();
    if suffix.is_empty() {
        return Ok(renamed);
    }

    for (path, name) in regular_files(dir)? {
        if name.to_string_lossy().ends_with(suffix) {
            continue;
        }

        let mut target_name = name;
        target_name.push(suffix);
        let target = dir.join(target_name);
        if target.exists() {
            bail!(
                "cannot rename {} to {}: target exists",
                path.display(),
                target.display()
            );
        }

        fs::rename(&path, &target).with_context(|| {
            format!("failed to rename {} to {}", path.display(), target.display())
        })?;
        tracing::info!("Renamed {} to {}", path.display(), target.display());
        renamed.push(target);
    }

    Ok(renamed)
}

/// Regular files directly inside `dir`, sorted by name.
///
/// Names are kept as raw `OsString`s; matching uses their lossy UTF-8 form.
fn regular_files(dir: &Path) -> Result<Vec<(PathBuf, OsString)>> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            continue;
        }

        files.push((entry.path(), entry.file_name()));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}
