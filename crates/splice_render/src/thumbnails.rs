use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

use crate::error::{RenderError, Result};

/// Extract a single frame at `time_seconds`, scaled to `width` with the
/// height kept proportional.
pub fn extract_thumbnail(
    ffmpeg: &Path,
    source_path: &Path,
    output_path: &Path,
    time_seconds: f64,
    width: u32,
) -> Result<()> {
    if !source_path.exists() {
        return Err(RenderError::FileNotFound(source_path.to_path_buf()));
    }
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let output = Command::new(ffmpeg)
        .args(thumbnail_args(source_path, output_path, time_seconds, width))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| RenderError::FfmpegExec(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RenderError::FfmpegFailed(format!(
            "thumbnail extraction failed: {}",
            stderr.trim()
        )));
    }
    info!(
        source = %source_path.display(),
        output = %output_path.display(),
        time_seconds,
        "extracted thumbnail"
    );
    Ok(())
}

fn thumbnail_args(source: &Path, output: &Path, time_seconds: f64, width: u32) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        format!("{time_seconds:.3}"),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        format!("scale={width}:-1"),
        "-q:v".to_string(),
        "5".to_string(),
        output.to_string_lossy().to_string(),
    ]
}
