//! Declarative description of the filters an edit applies.
//!
//! The graph only names operations and their typed parameters. Turning it into
//! backend syntax is the media provider's job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{FrameParams, Rational};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VideoFilter {
    /// Keep `[start, end)`; `end: None` keeps everything after `start`.
    Trim { start: f64, end: Option<f64> },
    /// Re-base presentation timestamps so the stream starts at zero.
    ResetTimestamps,
    /// Divide presentation timestamps by `factor`.
    Speed { factor: f64 },
    /// Scale into the frame keeping aspect, then letterbox to exact size.
    Fit { width: u32, height: u32 },
    Scale { width: u32, height: u32 },
    SetSar { sar: Rational },
    Fps { fps: u32 },
    Crop { x: u32, y: u32, width: u32, height: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AudioFilter {
    Trim { start: f64, end: Option<f64> },
    ResetTimestamps,
    Tempo { factor: f64 },
    FadeIn { duration: f64 },
    FadeOut { start: f64, duration: f64 },
}

/// One input stream pair with its filter chains.
///
/// `audio: None` means the segment's audio track is not used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub input: usize,
    pub video: Vec<VideoFilter>,
    pub audio: Option<Vec<AudioFilter>>,
}

impl Segment {
    pub fn new(input: usize) -> Self {
        Self {
            input,
            video: Vec::new(),
            audio: Some(Vec::new()),
        }
    }

    /// Video-only segment.
    pub fn video_only(input: usize) -> Self {
        Self {
            input,
            video: Vec::new(),
            audio: None,
        }
    }

    /// Trim both tracks to `[start, end)` and re-base them to zero.
    pub fn trimmed(mut self, start: f64, end: Option<f64>) -> Self {
        self.video.push(VideoFilter::Trim { start, end });
        self.video.push(VideoFilter::ResetTimestamps);
        if let Some(audio) = self.audio.as_mut() {
            audio.push(AudioFilter::Trim { start, end });
            audio.push(AudioFilter::ResetTimestamps);
        }
        self
    }

    pub fn sped_up(mut self, factor: f64) -> Self {
        self.video.push(VideoFilter::Speed { factor });
        if let Some(audio) = self.audio.as_mut() {
            audio.push(AudioFilter::Tempo { factor });
        }
        self
    }

    /// Normalize the frame to `params` and fade the audio at both ends.
    ///
    /// `duration` is the segment length, needed to place the fade-out.
    pub fn normalized(mut self, params: &FrameParams, duration: f64, fade: f64) -> Self {
        self.video.push(VideoFilter::Fit {
            width: params.width,
            height: params.height,
        });
        self.video.push(VideoFilter::SetSar { sar: params.sar });
        self.video.push(VideoFilter::Fps { fps: params.fps });
        if let Some(audio) = self.audio.as_mut() {
            if duration > 2.0 * fade {
                audio.push(AudioFilter::FadeIn { duration: fade });
                audio.push(AudioFilter::FadeOut {
                    start: duration - fade,
                    duration: fade,
                });
            }
        }
        self
    }

    pub fn is_normalized(&self) -> bool {
        self.video.iter().any(|f| matches!(f, VideoFilter::Fit { .. }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Composition {
    Single(Segment),
    /// Segments joined end to end, video and audio in lockstep.
    Concat(Vec<Segment>),
    /// `overlay` drawn on top of `base` at `(x, y)`; audio comes from `base`.
    Overlay {
        base: Segment,
        overlay: Segment,
        x: u32,
        y: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformGraph {
    pub inputs: Vec<PathBuf>,
    pub composition: Composition,
}

impl TransformGraph {
    pub fn segments(&self) -> Vec<&Segment> {
        match &self.composition {
            Composition::Single(s) => vec![s],
            Composition::Concat(segments) => segments.iter().collect(),
            Composition::Overlay { base, overlay, .. } => vec![base, overlay],
        }
    }
}
