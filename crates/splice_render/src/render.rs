use crate::error::{RenderError, Result};
use crate::settings::FfmpegSettings;
use serde::{Deserialize, Serialize};
use splice_core::graph::{AudioFilter, Composition, Segment, TransformGraph, VideoFilter};
use splice_core::progress::{report, ProgressEvent, ProgressSink};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// A compiled render plan ready for ffmpeg execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderPlan {
    pub inputs: Vec<PathBuf>,
    pub filter_graph: String,
    pub output_args: Vec<String>,
    pub output_path: PathBuf,
    pub overwrite: bool,
    /// Ask ffmpeg for machine-readable progress on stdout.
    pub track_progress: bool,
}

/// Compile a transform graph into an ffmpeg render plan.
pub fn compile(
    graph: &TransformGraph,
    output: &Path,
    overwrite: bool,
    track_progress: bool,
    settings: &FfmpegSettings,
) -> Result<RenderPlan> {
    for segment in graph.segments() {
        if segment.input >= graph.inputs.len() {
            return Err(RenderError::MissingInput(segment.input));
        }
    }

    let even = settings.needs_even_dimensions();
    let mut filters: Vec<String> = Vec::new();
    let has_audio = match &graph.composition {
        Composition::Single(segment) => {
            push_segment(&mut filters, segment, even, "outv", "outa");
            segment.audio.is_some()
        }
        Composition::Concat(segments) => {
            let has_audio = segments.iter().all(|s| s.audio.is_some());
            let mut concat_inputs = String::new();
            for (i, segment) in segments.iter().enumerate() {
                push_segment(&mut filters, segment, even, &format!("v{i}"), &format!("a{i}"));
                concat_inputs.push_str(&format!("[v{i}]"));
                if has_audio {
                    concat_inputs.push_str(&format!("[a{i}]"));
                }
            }
            let n = segments.len();
            if has_audio {
                filters.push(format!("{concat_inputs}concat=n={n}:v=1:a=1[outv][outa]"));
            } else {
                filters.push(format!("{concat_inputs}concat=n={n}:v=1:a=0[outv]"));
            }
            has_audio
        }
        Composition::Overlay {
            base,
            overlay,
            x,
            y,
        } => {
            push_segment(&mut filters, base, even, "basev", "outa");
            push_segment(&mut filters, overlay, even, "topv", "topa");
            filters.push(format!("[basev][topv]overlay=x={x}:y={y}[outv]"));
            base.audio.is_some()
        }
    };

    let mut output_args = vec!["-map".to_string(), "[outv]".to_string()];
    if has_audio {
        output_args.extend(["-map".to_string(), "[outa]".to_string()]);
    }
    output_args.extend([
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-crf".to_string(),
        settings.crf.to_string(),
        "-pix_fmt".to_string(),
        settings.pixel_format.clone(),
    ]);
    if has_audio {
        output_args.extend([
            "-c:a".to_string(),
            settings.audio_codec.clone(),
            "-b:a".to_string(),
            settings.audio_bitrate.clone(),
        ]);
    }
    if let Some(format) = output.extension().and_then(|e| e.to_str()) {
        output_args.extend(["-f".to_string(), format.to_string()]);
    }

    Ok(RenderPlan {
        inputs: graph.inputs.clone(),
        filter_graph: filters.join(";"),
        output_args,
        output_path: output.to_path_buf(),
        overwrite,
        track_progress,
    })
}

/// Build ffmpeg args from a render plan.
pub fn build_ffmpeg_args(plan: &RenderPlan) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        if plan.overwrite { "-y" } else { "-n" }.to_string(),
    ];

    for input in &plan.inputs {
        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(plan.filter_graph.clone());

    args.extend(plan.output_args.clone());

    if plan.track_progress {
        args.extend([
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
        ]);
    }

    args.push(plan.output_path.to_string_lossy().to_string());

    args
}

/// Run ffmpeg to completion, forwarding progress to `progress`.
///
/// `Done` is always sent last, whether or not ffmpeg succeeded.
pub fn execute(ffmpeg: &Path, plan: &RenderPlan, progress: Option<&ProgressSink>) -> Result<()> {
    let args = build_ffmpeg_args(plan);
    debug!(ffmpeg = %ffmpeg.display(), ?args, "spawning ffmpeg");
    info!(output = %plan.output_path.display(), "render started");

    let result = run_ffmpeg(ffmpeg, &args, progress);
    report(progress, ProgressEvent::Done);

    if result.is_ok() {
        info!(output = %plan.output_path.display(), "render finished");
    }
    result
}

fn run_ffmpeg(ffmpeg: &Path, args: &[String], progress: Option<&ProgressSink>) -> Result<()> {
    let mut child = Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RenderError::FfmpegExec(e.to_string()))?;

    // Drain stderr on its own thread so a chatty ffmpeg never blocks on a
    // full pipe while we read progress from stdout.
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
            if let Some(event @ ProgressEvent::Elapsed(_)) = parse_progress(&line) {
                report(progress, event);
            }
        }
    }

    let status = child.wait()?;
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if !status.success() {
        return Err(RenderError::FfmpegFailed(format!(
            "ffmpeg exited with {status}: {}",
            stderr_tail(&stderr)
        )));
    }
    Ok(())
}

/// Parse one line of `-progress` output.
///
/// Example lines: `out_time=00:00:05.000000`, `progress=end`.
pub fn parse_progress(line: &str) -> Option<ProgressEvent> {
    if let Some(time) = extract_value(line, "out_time=") {
        return parse_time_str(&time).map(ProgressEvent::Elapsed);
    }
    match extract_value(line, "progress=").as_deref() {
        Some("end") => Some(ProgressEvent::Done),
        _ => None,
    }
}

/// Extract the value of a `key=value` progress line.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let val = line.trim().strip_prefix(key)?.trim();
    if val.is_empty() {
        None
    } else {
        Some(val.to_string())
    }
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    let total = hours * 3600.0 + mins * 60.0 + secs;
    (total >= 0.0).then_some(total)
}

/// Last few lines of ffmpeg's diagnostics, where the actual error lives.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(5)..].join("\n")
}

// ---------------------------------------------------------------------------
// Filter serialization
// ---------------------------------------------------------------------------

fn push_segment(
    filters: &mut Vec<String>,
    segment: &Segment,
    even: bool,
    video_out: &str,
    audio_out: &str,
) {
    let input = segment.input;
    let video_chain = chain(segment.video.iter().map(|f| video_filter(f, even)), "null");
    filters.push(format!("[{input}:v]{video_chain}[{video_out}]"));

    if let Some(audio) = &segment.audio {
        let audio_chain = chain(audio.iter().map(audio_filter), "anull");
        filters.push(format!("[{input}:a]{audio_chain}[{audio_out}]"));
    }
}

fn chain(filters: impl Iterator<Item = String>, passthrough: &str) -> String {
    let joined = filters.collect::<Vec<_>>().join(",");
    if joined.is_empty() {
        passthrough.to_string()
    } else {
        joined
    }
}

fn trim_args(start: f64, end: Option<f64>) -> String {
    match end {
        Some(end) => format!("start={start}:end={end}"),
        None => format!("start={start}"),
    }
}

/// Serialize one video filter. With `even` set, sizes that become the output
/// frame (`Fit`, `Crop`) are rounded down to even values for 4:2:0/4:2:2
/// encoders.
fn video_filter(filter: &VideoFilter, even: bool) -> String {
    let size = |width: u32, height: u32| {
        if !even {
            return (width, height);
        }
        let rounded = (round_even(width), round_even(height));
        if rounded != (width, height) {
            debug!(width, height, ?rounded, "rounding frame size down to even");
        }
        rounded
    };
    match filter {
        VideoFilter::Trim { start, end } => format!("trim={}", trim_args(*start, *end)),
        VideoFilter::ResetTimestamps => "setpts=PTS-STARTPTS".to_string(),
        VideoFilter::Speed { factor } => format!("setpts=PTS/{factor}"),
        VideoFilter::Fit { width, height } => {
            let (width, height) = size(*width, *height);
            format!(
                "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"
            )
        }
        VideoFilter::Scale { width, height } => format!("scale={width}:{height}"),
        VideoFilter::SetSar { sar } => format!("setsar={}/{}", sar.num, sar.den),
        VideoFilter::Fps { fps } => format!("fps={fps}"),
        VideoFilter::Crop {
            x,
            y,
            width,
            height,
        } => {
            let (width, height) = size(*width, *height);
            format!("crop={width}:{height}:{x}:{y}")
        }
    }
}

/// Largest even value not above `value`; 0 and 1 are left alone.
fn round_even(value: u32) -> u32 {
    if value > 1 {
        value & !1
    } else {
        value
    }
}

fn audio_filter(filter: &AudioFilter) -> String {
    match filter {
        AudioFilter::Trim { start, end } => format!("atrim={}", trim_args(*start, *end)),
        AudioFilter::ResetTimestamps => "asetpts=PTS-STARTPTS".to_string(),
        AudioFilter::Tempo { factor } => atempo_chain(*factor)
            .iter()
            .map(|f| format!("atempo={f}"))
            .collect::<Vec<_>>()
            .join(","),
        AudioFilter::FadeIn { duration } => format!("afade=t=in:st=0:d={duration}"),
        AudioFilter::FadeOut { start, duration } => {
            format!("afade=t=out:st={start}:d={duration}")
        }
    }
}

/// atempo accepts factors in [0.5, 100]; split anything else into a product
/// of in-range steps.
fn atempo_chain(factor: f64) -> Vec<f64> {
    const MIN: f64 = 0.5;
    const MAX: f64 = 100.0;

    let mut steps = Vec::new();
    let mut rest = factor;
    while rest < MIN {
        steps.push(MIN);
        rest /= MIN;
    }
    while rest > MAX {
        steps.push(MAX);
        rest /= MAX;
    }
    steps.push(rest);
    steps
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
