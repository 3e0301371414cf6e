use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid range: begin {begin}, end {end}")]
    InvalidRange { begin: i64, end: i64 },

    #[error("format error: {0:?} is not in HH:MM:SS form")]
    Format(String),

    #[error("directory not found for {0}")]
    PathNotFound(PathBuf),

    #[error("unsupported format: {path} (allowed: {allowed})")]
    UnsupportedFormat { path: PathBuf, allowed: String },

    #[error("insufficient inputs: need at least {required} videos, got {got}")]
    InsufficientInputs { required: usize, got: usize },

    #[error("offset {offset}s is beyond the end of the video ({duration:.2}s)")]
    OffsetOutOfRange { offset: i64, duration: f64 },

    #[error("range {begin}..{end} exceeds video duration {duration:.2}s")]
    RangeExceedsDuration { begin: i64, end: i64, duration: f64 },

    #[error("shift ({x}, {y}) is outside the main video frame")]
    ShiftOutOfBounds { x: i64, y: i64 },

    #[error("crop rectangle {width}x{height} at ({x}, {y}) does not fit the source frame")]
    CropOutOfBounds {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },

    #[error("invalid speed factor: {0}")]
    InvalidSpeed(f64),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("no active file, open one first")]
    NoActiveFile,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache sweep failed for {} file(s): {}", .0.len(), display_paths(.0))]
    CacheSweep(Vec<PathBuf>),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("another edit is already in progress")]
    Busy,

    #[error("config error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy group used when reporting a failure to the user.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidRange { .. }
            | CoreError::Format(_)
            | CoreError::UnsupportedFormat { .. }
            | CoreError::InsufficientInputs { .. }
            | CoreError::OffsetOutOfRange { .. }
            | CoreError::RangeExceedsDuration { .. }
            | CoreError::ShiftOutOfBounds { .. }
            | CoreError::CropOutOfBounds { .. }
            | CoreError::InvalidSpeed(_)
            | CoreError::Config(_) => "validation",
            CoreError::PathNotFound(_)
            | CoreError::FileNotFound(_)
            | CoreError::NothingToUndo
            | CoreError::NothingToRedo
            | CoreError::NoActiveFile => "not-found",
            CoreError::Probe(_) | CoreError::Transform(_) => "transform",
            CoreError::Io { .. } | CoreError::CacheSweep(_) => "io",
            CoreError::Busy => "busy",
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, CoreError>;
