use splice_core::provider::{MediaProvider, RenderRequest};
use splice_core::types::StreamInfo;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::probe::probe_stream;
use crate::render::{compile, execute};
use crate::settings::FfmpegSettings;
use crate::thumbnails::extract_thumbnail;

/// `MediaProvider` backed by the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProvider {
    settings: FfmpegSettings,
}

impl FfmpegProvider {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FfmpegSettings {
        &self.settings
    }

    /// Binaries that cannot be run, for the startup dependency check.
    pub fn missing_tools(&self) -> Vec<PathBuf> {
        [&self.settings.ffmpeg, &self.settings.ffprobe]
            .into_iter()
            .filter(|tool| !tool_runs(tool))
            .cloned()
            .collect()
    }

    pub fn thumbnail(
        &self,
        source: &Path,
        output: &Path,
        time_seconds: f64,
        width: u32,
    ) -> splice_core::Result<()> {
        extract_thumbnail(&self.settings.ffmpeg, source, output, time_seconds, width)?;
        Ok(())
    }
}

impl MediaProvider for FfmpegProvider {
    fn probe(&self, path: &Path) -> splice_core::Result<StreamInfo> {
        Ok(probe_stream(&self.settings.ffprobe, path)?)
    }

    fn render(&self, request: RenderRequest<'_>) -> splice_core::Result<()> {
        let plan = compile(
            request.graph,
            request.output,
            request.overwrite,
            request.expected_duration.is_some(),
            &self.settings,
        )?;
        debug!(filter_graph = %plan.filter_graph, "compiled render plan");
        execute(&self.settings.ffmpeg, &plan, request.progress.as_ref())?;
        Ok(())
    }
}

fn tool_runs(tool: &Path) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
