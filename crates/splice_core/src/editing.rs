//! Editing operations: validate arguments, probe sources, build the transform
//! graph and compute the expected output duration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::error::{CoreError, Result};
use crate::graph::{Composition, Segment, TransformGraph, VideoFilter};
use crate::progress::ProgressSink;
use crate::provider::{MediaProvider, RenderRequest};
use crate::types::*;
use crate::validate::{prepare_output, validate_paths};

/// Audio fade applied at every join of a normalized concat.
pub const JOIN_FADE_SECS: f64 = 0.1;

/// A validated operation, ready to hand to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct EditPlan {
    pub graph: TransformGraph,
    pub expected_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub output: PathBuf,
    pub expected_duration: f64,
}

/// Runs edit operations against a media provider.
#[derive(Clone)]
pub struct Editor {
    provider: Arc<dyn MediaProvider>,
    config: EditorConfig,
}

impl Editor {
    pub fn new(provider: Arc<dyn MediaProvider>, config: EditorConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn MediaProvider {
        self.provider.as_ref()
    }

    /// Run `op` and write the result to `output`, honoring the configured
    /// overwrite policy.
    pub fn execute(
        &self,
        op: &EditOperation,
        output: &Path,
        progress: Option<ProgressSink>,
    ) -> Result<EditOutcome> {
        self.render_to(op, output, self.config.overwrite, progress)
    }

    pub fn render_to(
        &self,
        op: &EditOperation,
        output: &Path,
        overwrite: bool,
        progress: Option<ProgressSink>,
    ) -> Result<EditOutcome> {
        let output = prepare_output(output, &self.config.extension, &self.config.allowed_extensions)?;
        let plan = self.plan(op)?;
        debug!(operation = op.name(), "rendering planned edit");
        self.render_plan(&plan, &output, overwrite, progress)
    }

    /// Render an already validated plan, skipping a second round of probes.
    pub fn render_plan(
        &self,
        plan: &EditPlan,
        output: &Path,
        overwrite: bool,
        progress: Option<ProgressSink>,
    ) -> Result<EditOutcome> {
        let output = prepare_output(output, &self.config.extension, &self.config.allowed_extensions)?;
        info!(
            output = %output.display(),
            expected_duration = plan.expected_duration,
            "rendering edit"
        );
        self.provider.render(RenderRequest {
            graph: &plan.graph,
            output: &output,
            overwrite,
            expected_duration: Some(plan.expected_duration),
            progress,
        })?;
        Ok(EditOutcome {
            output,
            expected_duration: plan.expected_duration,
        })
    }

    /// Validate `op` and build its transform graph without rendering.
    pub fn plan(&self, op: &EditOperation) -> Result<EditPlan> {
        check_arguments(op)?;
        self.check_sources(op)?;

        let plan = match op {
            EditOperation::Merge { paths, overrides } => self.plan_merge(paths, overrides)?,
            EditOperation::Insert {
                main,
                inserts,
                offset,
            } => self.plan_insert(main, inserts, *offset)?,
            EditOperation::Trim { path, interval } => self.plan_trim(path, interval)?,
            EditOperation::Cut { path, interval } => self.plan_cut(path, interval)?,
            EditOperation::SetSpeed {
                path,
                factor,
                interval,
            } => self.plan_speed(path, *factor, interval.as_ref())?,
            EditOperation::Overlay {
                main,
                overlay,
                x_shift,
                y_shift,
            } => self.plan_overlay(main, overlay, *x_shift, *y_shift)?,
            EditOperation::Crop {
                path,
                x_shift,
                y_shift,
                width,
                height,
            } => self.plan_crop(path, *x_shift, *y_shift, *width, *height)?,
        };
        debug!(operation = op.name(), graph = ?plan.graph, "planned edit");
        Ok(plan)
    }

    fn check_sources(&self, op: &EditOperation) -> Result<()> {
        let sources = op.sources();
        validate_paths(&sources, &self.config.allowed_extensions)?;
        for path in sources {
            if !path.is_file() {
                return Err(CoreError::FileNotFound(path.clone()));
            }
        }
        Ok(())
    }

    fn plan_merge(&self, paths: &[PathBuf], overrides: &FrameOverrides) -> Result<EditPlan> {
        let infos = paths
            .iter()
            .map(|p| self.provider.probe(p))
            .collect::<Result<Vec<_>>>()?;
        let params = FrameParams::from_stream(&infos[0]).with_overrides(overrides);

        let segments = infos
            .iter()
            .enumerate()
            .map(|(i, info)| Segment::new(i).normalized(&params, info.duration, JOIN_FADE_SECS))
            .collect();

        Ok(EditPlan {
            graph: TransformGraph {
                inputs: paths.to_vec(),
                composition: Composition::Concat(segments),
            },
            expected_duration: infos.iter().map(|i| i.duration).sum(),
        })
    }

    fn plan_insert(&self, main: &Path, inserts: &[PathBuf], offset: i64) -> Result<EditPlan> {
        let main_info = self.provider.probe(main)?;
        if offset as f64 > main_info.duration {
            return Err(CoreError::OffsetOutOfRange {
                offset,
                duration: main_info.duration,
            });
        }
        let insert_infos = inserts
            .iter()
            .map(|p| self.provider.probe(p))
            .collect::<Result<Vec<_>>>()?;

        let params = FrameParams::from_stream(&main_info);
        let split = offset as f64;
        let mut segments = Vec::new();
        if split > 0.0 {
            segments.push(
                Segment::new(0)
                    .trimmed(0.0, Some(split))
                    .normalized(&params, split, JOIN_FADE_SECS),
            );
        }
        for (i, info) in insert_infos.iter().enumerate() {
            segments.push(Segment::new(i + 1).normalized(&params, info.duration, JOIN_FADE_SECS));
        }
        if split < main_info.duration {
            segments.push(Segment::new(0).trimmed(split, None).normalized(
                &params,
                main_info.duration - split,
                JOIN_FADE_SECS,
            ));
        }

        let mut inputs = vec![main.to_path_buf()];
        inputs.extend(inserts.iter().cloned());
        Ok(EditPlan {
            graph: TransformGraph {
                inputs,
                composition: compose(segments),
            },
            expected_duration: main_info.duration
                + insert_infos.iter().map(|i| i.duration).sum::<f64>(),
        })
    }

    fn plan_trim(&self, path: &Path, interval: &TimeInterval) -> Result<EditPlan> {
        let info = self.provider.probe(path)?;
        check_in_range(interval, info.duration)?;

        let segment = Segment::new(0).trimmed(interval.begin() as f64, Some(interval.end() as f64));
        Ok(EditPlan {
            graph: TransformGraph {
                inputs: vec![path.to_path_buf()],
                composition: Composition::Single(segment),
            },
            expected_duration: interval.duration() as f64,
        })
    }

    /// Both halves come from one source, so they are joined without
    /// normalization.
    fn plan_cut(&self, path: &Path, interval: &TimeInterval) -> Result<EditPlan> {
        let info = self.provider.probe(path)?;
        check_in_range(interval, info.duration)?;

        let begin = interval.begin() as f64;
        let mut segments = Vec::new();
        if begin > 0.0 {
            segments.push(Segment::new(0).trimmed(0.0, Some(begin)));
        }
        segments.push(Segment::new(0).trimmed(interval.end() as f64, None));

        Ok(EditPlan {
            graph: TransformGraph {
                inputs: vec![path.to_path_buf()],
                composition: compose(segments),
            },
            expected_duration: info.duration - interval.duration() as f64,
        })
    }

    fn plan_speed(
        &self,
        path: &Path,
        factor: f64,
        interval: Option<&TimeInterval>,
    ) -> Result<EditPlan> {
        let info = self.provider.probe(path)?;
        let inputs = vec![path.to_path_buf()];

        let Some(interval) = interval else {
            return Ok(EditPlan {
                graph: TransformGraph {
                    inputs,
                    composition: Composition::Single(Segment::new(0).sped_up(factor)),
                },
                expected_duration: info.duration / factor,
            });
        };

        check_in_range(interval, info.duration)?;
        let begin = interval.begin() as f64;
        let end = interval.end() as f64;
        let mut segments = Vec::new();
        if begin > 0.0 {
            segments.push(Segment::new(0).trimmed(0.0, Some(begin)));
        }
        if end > begin {
            segments.push(Segment::new(0).trimmed(begin, Some(end)).sped_up(factor));
        }
        segments.push(Segment::new(0).trimmed(end, None));

        Ok(EditPlan {
            graph: TransformGraph {
                inputs,
                composition: compose(segments),
            },
            expected_duration: begin + (end - begin) / factor + (info.duration - end),
        })
    }

    fn plan_overlay(&self, main: &Path, overlay: &Path, x: i64, y: i64) -> Result<EditPlan> {
        let main_info = self.provider.probe(main)?;
        let overlay_info = self.provider.probe(overlay)?;
        if x >= i64::from(main_info.width) || y >= i64::from(main_info.height) {
            return Err(CoreError::ShiftOutOfBounds { x, y });
        }
        // Both shifts are inside the frame here, so the casts are lossless.
        let (x, y) = (x as u32, y as u32);

        let (width, height) = fit_overlay(&main_info, &overlay_info, x, y);
        let mut top = Segment::video_only(1);
        if (width, height) != (overlay_info.width, overlay_info.height) {
            debug!(width, height, "shrinking overlay to fit main frame");
            top.video.push(VideoFilter::Scale { width, height });
        }

        Ok(EditPlan {
            graph: TransformGraph {
                inputs: vec![main.to_path_buf(), overlay.to_path_buf()],
                composition: Composition::Overlay {
                    base: Segment::new(0),
                    overlay: top,
                    x,
                    y,
                },
            },
            expected_duration: main_info.duration.max(overlay_info.duration),
        })
    }

    fn plan_crop(&self, path: &Path, x: i64, y: i64, width: i64, height: i64) -> Result<EditPlan> {
        let info = self.provider.probe(path)?;
        let out_of_bounds = || CoreError::CropOutOfBounds {
            x,
            y,
            width,
            height,
        };
        let (x, width) = span_within(x, width, info.width).ok_or_else(out_of_bounds)?;
        let (y, height) = span_within(y, height, info.height).ok_or_else(out_of_bounds)?;

        let mut segment = Segment::new(0);
        segment.video.push(VideoFilter::Crop {
            x,
            y,
            width,
            height,
        });
        Ok(EditPlan {
            graph: TransformGraph {
                inputs: vec![path.to_path_buf()],
                composition: Composition::Single(segment),
            },
            expected_duration: info.duration,
        })
    }
}

/// Checks that need no media metadata.
/// `offset..offset + len` in frame coordinates, if it lies inside `frame`.
fn span_within(offset: i64, len: i64, frame: u32) -> Option<(u32, u32)> {
    let offset = u32::try_from(offset).ok()?;
    let len = u32::try_from(len).ok()?;
    (offset.checked_add(len)? <= frame).then_some((offset, len))
}

fn check_arguments(op: &EditOperation) -> Result<()> {
    match op {
        EditOperation::Merge { paths, .. } if paths.len() < 2 => {
            Err(CoreError::InsufficientInputs {
                required: 2,
                got: paths.len(),
            })
        }
        EditOperation::Insert { inserts, .. } if inserts.is_empty() => {
            Err(CoreError::InsufficientInputs {
                required: 2,
                got: 1,
            })
        }
        EditOperation::Insert { offset, .. } if *offset < 0 => Err(CoreError::OffsetOutOfRange {
            offset: *offset,
            duration: 0.0,
        }),
        EditOperation::SetSpeed { factor, .. } if !(factor.is_finite() && *factor > 0.0) => {
            Err(CoreError::InvalidSpeed(*factor))
        }
        EditOperation::Overlay {
            x_shift, y_shift, ..
        } if *x_shift < 0 || *y_shift < 0 => Err(CoreError::ShiftOutOfBounds {
            x: *x_shift,
            y: *y_shift,
        }),
        EditOperation::Crop {
            x_shift,
            y_shift,
            width,
            height,
            ..
        } if *x_shift < 0 || *y_shift < 0 || *width <= 0 || *height <= 0 => {
            Err(CoreError::CropOutOfBounds {
                x: *x_shift,
                y: *y_shift,
                width: *width,
                height: *height,
            })
        }
        _ => Ok(()),
    }
}

fn check_in_range(interval: &TimeInterval, duration: f64) -> Result<()> {
    if interval.in_range(duration) {
        Ok(())
    } else {
        Err(CoreError::RangeExceedsDuration {
            begin: interval.begin(),
            end: interval.end(),
            duration,
        })
    }
}

/// Shrink each overlay axis independently until it fits inside the main
/// frame at `(x, y)`.
fn fit_overlay(main: &StreamInfo, overlay: &StreamInfo, x: u32, y: u32) -> (u32, u32) {
    (
        overlay.width.min(main.width - x),
        overlay.height.min(main.height - y),
    )
}

fn compose(mut segments: Vec<Segment>) -> Composition {
    if segments.len() == 1 {
        Composition::Single(segments.remove(0))
    } else {
        Composition::Concat(segments)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
