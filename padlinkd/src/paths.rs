//! Cross-platform application paths

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, String> {
        let base = dirs::data_dir().ok_or("Could not determine data directory")?;
        Ok(Self::at(base.join("padlink")))
    }

    /// Paths rooted at an explicit directory (tests, `PADLINK_DATA_DIR`).
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }
}
