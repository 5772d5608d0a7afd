//! Gzip-compressed tar archives of the destination directory.

use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::Builder as TarBuilder;

/// Top-level name used when the directory has no usable base name (e.g. `/`).
const FALLBACK_ROOT: &str = "extensions";

/// Write `dir` into `archive_path` as a single top-level entry named after `dir`.
pub fn write_archive(dir: &Path, archive_path: &Path) -> Result<()> {
    let root_name = dir
        .file_name()
        .and_then(OsStr::to_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_ROOT);

    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file = File::create(archive_path)
        .with_context(|| format!("failed to create archive {}", archive_path.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());

    let mut builder = TarBuilder::new(encoder);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(root_name, dir)
        .with_context(|| format!("failed to archive {}", dir.display()))?;

    let encoder = builder
        .into_inner()
        .context("failed to finish tar stream")?;
    encoder.finish().context("failed to finish gzip stream")?;

    tracing::info!("Archived {} into {}", dir.display(), archive_path.display());
    Ok(())
}
