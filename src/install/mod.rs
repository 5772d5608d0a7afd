//! Installs every identifier of an extension list through an [`Installer`].
//!
//! Installs are independent: a failure is logged and recorded, and the next
//! identifier is still attempted.

pub mod command;

use std::path::Path;

use crate::error::{ExtpackError, InstallError};
use crate::model::extension_list::{self, ExtensionId};

pub use command::CommandInstaller;

pub trait Installer {
    fn install(&mut self, id: &ExtensionId) -> Result<(), InstallError>;
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<ExtensionId>,
    pub failed: Vec<(ExtensionId, String)>,
}

impl InstallReport {
    pub fn attempted(&self) -> usize {
        self.installed.len() + self.failed.len()
    }
}

/// Read `path` and install each identifier once, in file order.
pub fn install_from_file<I: Installer>(
    path: &Path,
    installer: &mut I,
) -> Result<InstallReport, ExtpackError> {
    let ids = extension_list::read_list(path)?;
    tracing::info!("{} extensions listed in {}", ids.len(), path.display());
    Ok(install_all(&ids, installer))
}

pub fn install_all<I: Installer>(ids: &[ExtensionId], installer: &mut I) -> InstallReport {
    let span = tracing::info_span!("install");
    let _enter = span.enter();

    let mut report = InstallReport::default();

    for id in ids {
        tracing::info!("Installing extension: {id}");
        match installer.install(id) {
            Ok(()) => {
                tracing::info!("Successfully installed extension: {id}");
                report.installed.push(id.clone());
            }
            Err(err) => {
                tracing::error!("Failed to install extension: {id}: {err}");
                report.failed.push((id.clone(), err.to_string()));
            }
        }
    }

    tracing::info!(
        "{} of {} extensions installed",
        report.installed.len(),
        report.attempted()
    );
    report
}
