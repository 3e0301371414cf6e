use serde::Deserialize;
use splice_core::types::{Rational, StreamInfo};
use std::path::Path;
use tracing::debug;

use crate::error::{RenderError, Result};

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    sample_aspect_ratio: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run ffprobe on a media file and read its first video stream.
pub fn probe_stream(ffprobe: &Path, path: &Path) -> Result<StreamInfo> {
    if !path.exists() {
        return Err(RenderError::FileNotFound(path.to_path_buf()));
    }

    let output = std::process::Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| RenderError::FfprobeExec(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RenderError::FfprobeFailed(stderr.trim().to_string()));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    let info = parse_probe_output(&probe)
        .ok_or_else(|| RenderError::NoVideoStream(path.to_path_buf()))?;
    debug!(path = %path.display(), ?info, "probed");
    Ok(info)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `None` when there is no video stream, or it lacks a frame size or rate.
fn parse_probe_output(probe: &FfprobeOutput) -> Option<StreamInfo> {
    let video = probe.streams.iter().find(|s| s.codec_type == "video")?;
    let width = video.width.filter(|w| *w > 0)?;
    let height = video.height.filter(|h| *h > 0)?;

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))?;

    let sample_aspect_ratio = video
        .sample_aspect_ratio
        .as_deref()
        .and_then(|s| s.parse::<Rational>().ok())
        .filter(|r| r.num > 0 && r.den > 0)
        .unwrap_or(Rational::ONE);

    let duration = probe
        .format
        .duration
        .as_deref()
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Some(StreamInfo {
        width,
        height,
        fps,
        sample_aspect_ratio,
        duration,
    })
}

/// Parse an ffprobe rate like "30000/1001" down to whole frames per second.
/// "0/0" (unknown) yields `None`.
fn parse_frame_rate(rate: &str) -> Option<u32> {
    rate.parse::<Rational>()
        .ok()?
        .floor()
        .filter(|fps| *fps > 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
