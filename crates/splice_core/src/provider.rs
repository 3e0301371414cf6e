use std::path::Path;

use crate::error::Result;
use crate::graph::TransformGraph;
use crate::progress::ProgressSink;
use crate::types::StreamInfo;

/// Everything the provider needs to execute one transform.
#[derive(Debug)]
pub struct RenderRequest<'a> {
    pub graph: &'a TransformGraph,
    pub output: &'a Path,
    pub overwrite: bool,
    pub expected_duration: Option<f64>,
    pub progress: Option<ProgressSink>,
}

/// The decode/filter/encode engine behind the editor.
pub trait MediaProvider: Send + Sync {
    /// Read video stream metadata. Fails with `CoreError::Probe`.
    fn probe(&self, path: &Path) -> Result<StreamInfo>;

    /// Execute a transform graph. Fails with `CoreError::Transform`.
    ///
    /// Progress events are sent only when `expected_duration` is known, and
    /// the stream always ends with `ProgressEvent::Done`.
    fn render(&self, request: RenderRequest<'_>) -> Result<()>;
}
