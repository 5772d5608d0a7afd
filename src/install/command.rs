use std::process::{Command, Stdio};

use crate::error::InstallError;
use crate::install::Installer;
use crate::model::config::InstallConfig;
use crate::model::extension_list::ExtensionId;

/// Shells out to the editor CLI: `<program> <args...> <id>`.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &InstallConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

impl Installer for CommandInstaller {
    fn install(&mut self, id: &ExtensionId) -> Result<(), InstallError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(id.as_str())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| InstallError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(extension = %id, "{}", stdout.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                tracing::debug!(extension = %id, "{}", stderr.trim());
            }
            Err(InstallError::ExitStatus {
                program: self.program.clone(),
                status: output.status,
            })
        }
    }
}
