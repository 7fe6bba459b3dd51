//! Home directory layout.

use crate::runtime::constants::filenames;
use std::path::{Path, PathBuf};
use vaultstrap_shared::errors::{VaultstrapError, VaultstrapResult};

pub mod dirs {
    pub const LOGS_DIR: &str = "logs";
}

/// Paths under the Vaultstrap home directory.
///
/// ```text
/// ~/.vaultstrap/
/// ├── runs.db
/// └── logs/
/// ```
#[derive(Clone, Debug)]
pub struct HomeLayout {
    home_dir: PathBuf,
}

impl HomeLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.home_dir.join(filenames::RUN_LOG_DB)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS_DIR)
    }

    /// Create the home and logs directories.
    pub fn prepare(&self) -> VaultstrapResult<()> {
        for dir in [self.home_dir.clone(), self.logs_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                VaultstrapError::Storage(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_creates_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = HomeLayout::new(temp.path().join("home"));
        layout.prepare().unwrap();

        assert!(layout.logs_dir().is_dir());
        assert_eq!(layout.run_log_path(), temp.path().join("home").join("runs.db"));
    }
}
