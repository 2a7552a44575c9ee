//! The spool directory: one command log per user.
//!
//! ```text
//! <root>/
//!   alice/log
//!   bob/log
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LogError, Result};
use crate::log::{CommandLog, LogConfig};

/// File name of a user's log inside their spool directory.
pub const LOG_FILE_NAME: &str = "log";

/// Root directory holding every user's log.
#[derive(Debug, Clone)]
pub struct SpoolDir {
    root: PathBuf,
    config: LogConfig,
}

impl SpoolDir {
    pub fn new(root: impl AsRef<Path>, config: LogConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open `user`'s log, creating their directory if needed.
    pub fn open(&self, user: &str) -> Result<CommandLog> {
        validate_user(user)?;
        let dir = self.root.join(user);
        fs::create_dir_all(&dir)?;
        Ok(CommandLog::open(dir.join(LOG_FILE_NAME), self.config.clone()))
    }
}

fn validate_user(user: &str) -> Result<()> {
    let bad = user.is_empty()
        || user == "."
        || user == ".."
        || user.contains(['/', '\\', '\0']);
    if bad {
        return Err(LogError::InvalidUser(user.to_string()));
    }
    Ok(())
}
