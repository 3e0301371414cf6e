use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Settings shared by the operation pipeline and the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Directory holding the numbered history artifacts.
    pub cache_dir: PathBuf,
    /// Primary extension, forced onto every output.
    pub extension: String,
    pub allowed_extensions: Vec<String>,
    /// Replace an existing file when rendering or saving.
    pub overwrite: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            extension: "mp4".to_string(),
            allowed_extensions: vec!["mp4".to_string()],
            overwrite: false,
        }
    }
}

impl EditorConfig {
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let config: EditorConfig =
            serde_json::from_str(&data).map_err(|e| CoreError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CoreError::io(path, e))
    }

    /// The primary extension must itself be allowed.
    pub fn check(&self) -> Result<()> {
        if self.extension.is_empty() || !self.allowed_extensions.contains(&self.extension) {
            return Err(CoreError::Config(format!(
                "extension {:?} is not among allowed extensions {:?}",
                self.extension, self.allowed_extensions
            )));
        }
        Ok(())
    }
}

pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("splice").join("cache")
}
