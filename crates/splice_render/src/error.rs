use splice_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("no usable video stream in {0}")]
    NoVideoStream(PathBuf),

    #[error("failed to execute ffmpeg: {0}")]
    FfmpegExec(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("graph references missing input #{0}")]
    MissingInput(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for CoreError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::FileNotFound(path) => CoreError::FileNotFound(path),
            RenderError::FfprobeExec(_)
            | RenderError::FfprobeFailed(_)
            | RenderError::NoVideoStream(_)
            | RenderError::Json(_) => CoreError::Probe(err.to_string()),
            RenderError::FfmpegExec(_)
            | RenderError::FfmpegFailed(_)
            | RenderError::MissingInput(_)
            | RenderError::Io(_) => CoreError::Transform(err.to_string()),
        }
    }
}
