use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use notify::EventKind;
use notify::event::{CreateKind, ModifyKind, RenameMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Created,
    MovedIn,
}

/// A file that appeared in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchKind,
    pub dir: PathBuf,
    pub file_name: OsString,
}

impl WatchEvent {
    /// Keep create and move-in notifications; everything else yields `None`.
    pub fn from_notify(event: &notify::Event) -> Option<Self> {
        let (kind, path) = match event.kind {
            EventKind::Create(CreateKind::Folder) => return None,
            EventKind::Create(_) => (WatchKind::Created, event.paths.first()?),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                (WatchKind::MovedIn, event.paths.first()?)
            }
            // `Both` carries [from, to]. `Any` (FSEvents) may be either side; a
            // moved-out name is skipped later as `SourceGone`.
            EventKind::Modify(ModifyKind::Name(RenameMode::Both | RenameMode::Any)) => {
                (WatchKind::MovedIn, event.paths.last()?)
            }
            _ => return None,
        };

        Some(Self {
            kind,
            dir: path.parent()?.to_path_buf(),
            file_name: path.file_name()?.to_os_string(),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            WatchKind::Created => "created",
            WatchKind::MovedIn => "moved in",
        };
        write!(f, "{verb}: {}", self.path().display())
    }
}
