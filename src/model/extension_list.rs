use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::ExtpackError;

/// Opaque `publisher.name` token handed to the editor CLI as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Trim `raw`; blank input is not an identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn parse_list(text: &str) -> Vec<ExtensionId> {
    text.lines().filter_map(ExtensionId::parse).collect()
}

pub fn read_list(path: &Path) -> Result<Vec<ExtensionId>, ExtpackError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_list(&text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(ExtpackError::MissingList(path.to_path_buf()))
        }
        Err(source) => Err(ExtpackError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
