use anyhow::Context;
use serde::{Deserialize, Serialize};
use splice_core::{CacheHandler, EditSession, Editor, EditorConfig};
use splice_render::{FfmpegProvider, FfmpegSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Overrides `editor.cache_dir` from the config file.
pub const CACHE_DIR_ENV: &str = "SPLICE_CACHE_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub editor: EditorConfig,
    pub ffmpeg: FfmpegSettings,
}

impl AppConfig {
    /// Defaults, then the optional JSON file, then the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&data)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => AppConfig::default(),
        };
        config.apply_env(std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from));
        config.editor.check()?;
        Ok(config)
    }

    pub fn apply_env(&mut self, cache_dir: Option<PathBuf>) {
        if let Some(dir) = cache_dir.filter(|d| !d.as_os_str().is_empty()) {
            self.editor.cache_dir = dir;
        }
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub provider: Arc<FfmpegProvider>,
    pub editor: Editor,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let provider = Arc::new(FfmpegProvider::new(config.ffmpeg.clone()));
        let editor = Editor::new(provider.clone(), config.editor.clone());
        Self {
            config,
            provider,
            editor,
        }
    }

    pub fn cache(&self) -> splice_core::Result<CacheHandler> {
        CacheHandler::new(self.config.editor.clone())
    }

    pub fn session(&self) -> splice_core::Result<EditSession> {
        Ok(EditSession::new(self.editor.clone(), self.cache()?))
    }
}
