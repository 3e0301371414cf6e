use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Binaries and encoder settings for the ffmpeg backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FfmpegSettings {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub video_codec: String,
    pub crf: u32,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub pixel_format: String,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            video_codec: "libx264".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }
}

impl FfmpegSettings {
    /// Chroma-subsampled pixel formats need even frame dimensions.
    pub fn needs_even_dimensions(&self) -> bool {
        let format = self.pixel_format.as_str();
        format.contains("420") || format.contains("422") || format.starts_with("nv")
    }
}
