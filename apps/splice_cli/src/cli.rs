use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use splice_core::types::{EditOperation, FrameOverrides, Rational, TimeInterval};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "splice", version)]
#[command(about = "Non-destructive video editing with undo/redo, backed by ffmpeg")]
pub struct Cli {
    /// JSON config file (cache directory, extensions, encoder settings)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Replace existing output files
    #[arg(short = 'y', long, global = true)]
    pub overwrite: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Concatenate videos, normalizing them to a common frame
    Merge {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        frame: FrameArgs,
    },
    /// Insert videos into the first one at an offset
    Insert {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        offset: OffsetArgs,
    },
    /// Keep only the given range
    Trim {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Remove the given range
    Cut {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Change playback speed of the whole video or a range
    Speed {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        speed: SpeedArgs,
    },
    /// Draw the second video on top of the first
    Overlay {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        shifts: ShiftArgs,
    },
    /// Keep a rectangle of the frame
    Crop {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        crop: CropArgs,
    },
    /// Save one frame as an image
    Thumbnail {
        #[arg(short = 'v', long = "video")]
        video: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, default_value = "00:00:00", value_name = "HH:MM:SS")]
        time: String,
        #[arg(long, default_value_t = 320)]
        width: u32,
    },
    /// Interactive editing with undo/redo over the cache
    Session,
    /// Inspect or empty the cache directory
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheAction {
    Status,
    Clear,
}

#[derive(Args, Debug, Clone)]
pub struct IoArgs {
    /// Input videos
    #[arg(short = 'v', long = "videos", num_args = 1.., required = true)]
    pub videos: Vec<PathBuf>,
    /// Output file; the configured extension is appended when missing
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    #[arg(short = 's', long, value_name = "HH:MM:SS")]
    pub start: String,
    #[arg(short = 'e', long, value_name = "HH:MM:SS")]
    pub end: String,
}

#[derive(Args, Debug, Clone)]
pub struct SpeedArgs {
    /// Speed factor, e.g. 2 for twice as fast
    #[arg(long, allow_negative_numbers = true)]
    pub speed: f64,
    #[arg(short = 's', long, value_name = "HH:MM:SS", requires = "end")]
    pub start: Option<String>,
    #[arg(short = 'e', long, value_name = "HH:MM:SS", requires = "start")]
    pub end: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShiftArgs {
    #[arg(
        long,
        num_args = 2,
        value_names = ["X", "Y"],
        allow_negative_numbers = true,
        required = true
    )]
    pub shifts: Vec<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct CropArgs {
    #[command(flatten)]
    pub shifts: ShiftArgs,
    #[arg(long, allow_negative_numbers = true)]
    pub width: i64,
    #[arg(long, allow_negative_numbers = true)]
    pub height: i64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FrameArgs {
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long)]
    pub fps: Option<u32>,
    /// Sample aspect ratio such as 1:1
    #[arg(long)]
    pub sar: Option<Rational>,
}

#[derive(Args, Debug, Clone)]
pub struct OffsetArgs {
    /// Insert position in seconds from the start of the main video
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Edit specs
// ---------------------------------------------------------------------------

/// An edit with its parameters parsed, waiting for its source paths.
#[derive(Debug, Clone, PartialEq)]
pub enum EditSpec {
    Merge(FrameOverrides),
    Insert { offset: i64 },
    Trim(TimeInterval),
    Cut(TimeInterval),
    Speed {
        factor: f64,
        interval: Option<TimeInterval>,
    },
    Overlay { x: i64, y: i64 },
    Crop {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },
}

impl EditSpec {
    pub fn name(&self) -> &'static str {
        match self {
            EditSpec::Merge(_) => "merge",
            EditSpec::Insert { .. } => "insert",
            EditSpec::Trim(_) => "trim",
            EditSpec::Cut(_) => "cut",
            EditSpec::Speed { .. } => "speed",
            EditSpec::Overlay { .. } => "overlay",
            EditSpec::Crop { .. } => "crop",
        }
    }

    /// Sources the edit takes when it is not open-ended.
    fn exact_sources(&self) -> Option<usize> {
        match self {
            EditSpec::Merge(_) | EditSpec::Insert { .. } => None,
            EditSpec::Overlay { .. } => Some(2),
            _ => Some(1),
        }
    }

    pub fn check_sources(&self, count: usize) -> anyhow::Result<()> {
        match self.exact_sources() {
            Some(n) if n != count => bail!(
                "{} takes exactly {n} video(s), got {count}",
                self.name()
            ),
            _ => Ok(()),
        }
    }

    /// Bind the edit to its sources. Merge takes them all in order, insert
    /// treats the first as the main video, the rest use the first one or two.
    pub fn into_operation(self, sources: Vec<PathBuf>) -> EditOperation {
        let mut rest = sources.into_iter();
        let first = rest.next().unwrap_or_default();
        match self {
            EditSpec::Merge(overrides) => EditOperation::Merge {
                paths: std::iter::once(first).chain(rest).collect(),
                overrides,
            },
            EditSpec::Insert { offset } => EditOperation::Insert {
                main: first,
                inserts: rest.collect(),
                offset,
            },
            EditSpec::Trim(interval) => EditOperation::Trim {
                path: first,
                interval,
            },
            EditSpec::Cut(interval) => EditOperation::Cut {
                path: first,
                interval,
            },
            EditSpec::Speed { factor, interval } => EditOperation::SetSpeed {
                path: first,
                factor,
                interval,
            },
            EditSpec::Overlay { x, y } => EditOperation::Overlay {
                main: first,
                overlay: rest.next().unwrap_or_default(),
                x_shift: x,
                y_shift: y,
            },
            EditSpec::Crop {
                x,
                y,
                width,
                height,
            } => EditOperation::Crop {
                path: first,
                x_shift: x,
                y_shift: y,
                width,
                height,
            },
        }
    }
}

impl RangeArgs {
    pub fn interval(&self) -> splice_core::Result<TimeInterval> {
        TimeInterval::from_clock(&self.start, &self.end)
    }
}

impl SpeedArgs {
    pub fn spec(&self) -> splice_core::Result<EditSpec> {
        let interval = match (&self.start, &self.end) {
            (Some(start), Some(end)) => Some(TimeInterval::from_clock(start, end)?),
            _ => None,
        };
        Ok(EditSpec::Speed {
            factor: self.speed,
            interval,
        })
    }
}

impl ShiftArgs {
    pub fn xy(&self) -> (i64, i64) {
        (
            self.shifts.first().copied().unwrap_or(0),
            self.shifts.get(1).copied().unwrap_or(0),
        )
    }
}

impl CropArgs {
    pub fn spec(&self) -> EditSpec {
        let (x, y) = self.shifts.xy();
        EditSpec::Crop {
            x,
            y,
            width: self.width,
            height: self.height,
        }
    }
}

impl FrameArgs {
    pub fn overrides(&self) -> FrameOverrides {
        FrameOverrides {
            width: self.width,
            height: self.height,
            fps: self.fps,
            sar: self.sar,
        }
    }
}

impl Command {
    /// Split an edit subcommand into its spec and io arguments.
    pub fn edit(&self) -> Option<splice_core::Result<(EditSpec, &IoArgs)>> {
        let spec = match self {
            Command::Merge { io, frame } => Ok((EditSpec::Merge(frame.overrides()), io)),
            Command::Insert { io, offset } => Ok((
                EditSpec::Insert {
                    offset: offset.offset,
                },
                io,
            )),
            Command::Trim { io, range } => range.interval().map(|i| (EditSpec::Trim(i), io)),
            Command::Cut { io, range } => range.interval().map(|i| (EditSpec::Cut(i), io)),
            Command::Speed { io, speed } => speed.spec().map(|s| (s, io)),
            Command::Overlay { io, shifts } => {
                let (x, y) = shifts.xy();
                Ok((EditSpec::Overlay { x, y }, io))
            }
            Command::Crop { io, crop } => Ok((crop.spec(), io)),
            Command::Thumbnail { .. } | Command::Session | Command::Cache { .. } => return None,
        };
        Some(spec)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("splice").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trim_parses_clock_range() {
        let cli = parse(&["trim", "-v", "a.mp4", "-o", "out", "-s", "00:00:02", "-e", "10"]);
        let (spec, io) = cli.command.edit().unwrap().unwrap();
        assert_eq!(spec, EditSpec::Trim(TimeInterval::new(2, 10).unwrap()));
        assert_eq!(io.videos, vec![PathBuf::from("a.mp4")]);
        assert_eq!(io.output, PathBuf::from("out"));
    }

    #[test]
    fn merge_takes_many_videos_and_overrides() {
        let cli = parse(&[
            "merge", "-v", "a.mp4", "b.mp4", "c.mp4", "-o", "m.mp4", "--width", "640", "--sar",
            "4:3",
        ]);
        let (spec, io) = cli.command.edit().unwrap().unwrap();
        assert_eq!(io.videos.len(), 3);
        match spec {
            EditSpec::Merge(overrides) => {
                assert_eq!(overrides.width, Some(640));
                assert_eq!(overrides.height, None);
                assert_eq!(overrides.sar, Some(Rational::new(4, 3)));
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn overlay_accepts_negative_shifts_for_validation() {
        let cli = parse(&[
            "overlay", "-v", "a.mp4", "b.mp4", "-o", "o.mp4", "--shifts", "10", "-5",
        ]);
        let (spec, _) = cli.command.edit().unwrap().unwrap();
        assert_eq!(spec, EditSpec::Overlay { x: 10, y: -5 });
    }

    #[test]
    fn speed_range_needs_both_ends() {
        let result = Cli::try_parse_from([
            "splice", "speed", "-v", "a.mp4", "-o", "o", "--speed", "2", "-s", "1",
        ]);
        assert!(result.is_err());

        let cli = parse(&["speed", "-v", "a.mp4", "-o", "o", "--speed", "2"]);
        let (spec, _) = cli.command.edit().unwrap().unwrap();
        assert_eq!(
            spec,
            EditSpec::Speed {
                factor: 2.0,
                interval: None
            }
        );
    }

    #[test]
    fn bad_clock_is_a_format_error() {
        let cli = parse(&["cut", "-v", "a.mp4", "-o", "o", "-s", "1:xx", "-e", "5"]);
        let err = cli.command.edit().unwrap().unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn exact_source_counts_are_checked() {
        let trim = EditSpec::Trim(TimeInterval::new(0, 1).unwrap());
        assert!(trim.check_sources(1).is_ok());
        assert!(trim.check_sources(2).is_err());
        assert!(EditSpec::Overlay { x: 0, y: 0 }.check_sources(1).is_err());
        // Merge arity is left to the editor, which reports InsufficientInputs.
        assert!(EditSpec::Merge(FrameOverrides::default())
            .check_sources(1)
            .is_ok());
    }

    #[test]
    fn insert_splits_main_from_inserts() {
        let op = EditSpec::Insert { offset: 4 }.into_operation(vec![
            PathBuf::from("main.mp4"),
            PathBuf::from("x.mp4"),
            PathBuf::from("y.mp4"),
        ]);
        assert_eq!(
            op,
            EditOperation::Insert {
                main: PathBuf::from("main.mp4"),
                inserts: vec![PathBuf::from("x.mp4"), PathBuf::from("y.mp4")],
                offset: 4,
            }
        );
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = parse(&["cache", "status", "--verbose", "-y"]);
        assert!(cli.verbose);
        assert!(cli.overwrite);
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheAction::Status
            }
        ));
    }
}
