use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// TimeInterval
// ---------------------------------------------------------------------------

/// A validated `[begin, end]` range in whole seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "(i64, i64)", into = "(i64, i64)")]
pub struct TimeInterval {
    begin: i64,
    end: i64,
}

impl TimeInterval {
    pub fn new(begin: i64, end: i64) -> Result<Self> {
        if begin < 0 || begin > end {
            return Err(CoreError::InvalidRange { begin, end });
        }
        Ok(Self { begin, end })
    }

    /// Build an interval from two clock strings such as `"00:01:05"`.
    pub fn from_clock(begin: &str, end: &str) -> Result<Self> {
        Self::new(parse_clock(begin)?, parse_clock(end)?)
    }

    pub fn begin(&self) -> i64 {
        self.begin
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn duration(&self) -> i64 {
        self.end - self.begin
    }

    /// True when the interval ends strictly before `total_duration`.
    ///
    /// An interval ending exactly at end-of-media is rejected.
    pub fn in_range(&self, total_duration: f64) -> bool {
        (self.end as f64) < total_duration
    }
}

impl TryFrom<(i64, i64)> for TimeInterval {
    type Error = CoreError;

    fn try_from((begin, end): (i64, i64)) -> Result<Self> {
        Self::new(begin, end)
    }
}

impl From<TimeInterval> for (i64, i64) {
    fn from(interval: TimeInterval) -> Self {
        (interval.begin, interval.end)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", format_clock(self.begin), format_clock(self.end))
    }
}

/// Parse `"HH:MM:SS"` (or `"MM:SS"`, `"SS"`) into seconds.
///
/// Every field is a base-60 digit; the rightmost is seconds.
pub fn parse_clock(value: &str) -> Result<i64> {
    let mut total: i64 = 0;
    for field in value.trim().split(':') {
        let digit: i64 = field
            .parse()
            .map_err(|_| CoreError::Format(value.to_string()))?;
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(digit))
            .ok_or_else(|| CoreError::Format(value.to_string()))?;
    }
    Ok(total)
}

pub fn format_clock(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let s = seconds.unsigned_abs();
    format!("{sign}{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

// ---------------------------------------------------------------------------
// Rational
// ---------------------------------------------------------------------------

/// A ratio such as a sample aspect ratio (`1:1`) or a frame rate (`30000/1001`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const ONE: Self = Self { num: 1, den: 1 };

    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Integer part of the ratio, `None` for a zero denominator.
    pub fn floor(&self) -> Option<u32> {
        if self.den == 0 {
            None
        } else {
            Some(self.num / self.den)
        }
    }
}

impl FromStr for Rational {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || CoreError::Format(s.to_string());
        let (num, den) = s.split_once(|c| c == '/' || c == ':').unwrap_or((s, "1"));
        Ok(Self {
            num: num.trim().parse().map_err(|_| bad())?,
            den: den.trim().parse().map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

// ---------------------------------------------------------------------------
// StreamInfo
// ---------------------------------------------------------------------------

/// Video stream metadata read back from the media provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_aspect_ratio: Rational,
    pub duration: f64,
}

// ---------------------------------------------------------------------------
// FrameParams
// ---------------------------------------------------------------------------

/// Optional output frame overrides for a merge. Unset fields fall back to the
/// first source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub sar: Option<Rational>,
}

/// Fully resolved common frame that every merged clip is normalized to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FrameParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sar: Rational,
}

impl FrameParams {
    pub fn from_stream(info: &StreamInfo) -> Self {
        Self {
            width: info.width,
            height: info.height,
            fps: info.fps,
            sar: info.sample_aspect_ratio,
        }
    }

    pub fn with_overrides(self, overrides: &FrameOverrides) -> Self {
        Self {
            width: overrides.width.unwrap_or(self.width),
            height: overrides.height.unwrap_or(self.height),
            fps: overrides.fps.unwrap_or(self.fps),
            sar: overrides.sar.unwrap_or(self.sar),
        }
    }
}

// ---------------------------------------------------------------------------
// EditOperation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EditOperation {
    Merge {
        paths: Vec<PathBuf>,
        overrides: FrameOverrides,
    },
    Insert {
        main: PathBuf,
        inserts: Vec<PathBuf>,
        offset: i64,
    },
    Trim {
        path: PathBuf,
        interval: TimeInterval,
    },
    Cut {
        path: PathBuf,
        interval: TimeInterval,
    },
    SetSpeed {
        path: PathBuf,
        factor: f64,
        interval: Option<TimeInterval>,
    },
    Overlay {
        main: PathBuf,
        overlay: PathBuf,
        x_shift: i64,
        y_shift: i64,
    },
    Crop {
        path: PathBuf,
        x_shift: i64,
        y_shift: i64,
        width: i64,
        height: i64,
    },
}

impl EditOperation {
    /// Every source the operation reads, in input order.
    pub fn sources(&self) -> Vec<&PathBuf> {
        match self {
            EditOperation::Merge { paths, .. } => paths.iter().collect(),
            EditOperation::Insert { main, inserts, .. } => {
                std::iter::once(main).chain(inserts.iter()).collect()
            }
            EditOperation::Trim { path, .. }
            | EditOperation::Cut { path, .. }
            | EditOperation::SetSpeed { path, .. }
            | EditOperation::Crop { path, .. } => vec![path],
            EditOperation::Overlay { main, overlay, .. } => vec![main, overlay],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EditOperation::Merge { .. } => "merge",
            EditOperation::Insert { .. } => "insert",
            EditOperation::Trim { .. } => "trim",
            EditOperation::Cut { .. } => "cut",
            EditOperation::SetSpeed { .. } => "speed",
            EditOperation::Overlay { .. } => "overlay",
            EditOperation::Crop { .. } => "crop",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_valid_bounds() {
        let i = TimeInterval::new(2, 10).unwrap();
        assert_eq!(i.begin(), 2);
        assert_eq!(i.end(), 10);
        assert_eq!(i.duration(), 8);

        let empty = TimeInterval::new(5, 5).unwrap();
        assert_eq!(empty.duration(), 0);
    }

    #[test]
    fn interval_rejects_reversed_and_negative() {
        assert!(matches!(
            TimeInterval::new(10, 2),
            Err(CoreError::InvalidRange { begin: 10, end: 2 })
        ));
        assert!(matches!(
            TimeInterval::new(-1, 2),
            Err(CoreError::InvalidRange { .. })
        ));
    }

    #[test]
    fn in_range_is_strict_at_end_of_media() {
        let i = TimeInterval::new(2, 12).unwrap();
        assert!(!i.in_range(12.0));
        assert!(i.in_range(12.01));
        assert!(!i.in_range(11.0));
    }

    #[test]
    fn parse_clock_positional_fields() {
        assert_eq!(parse_clock("00:00:05").unwrap(), 5);
        assert_eq!(parse_clock("00:01:05").unwrap(), 65);
        assert_eq!(parse_clock("01:00:00").unwrap(), 3600);
        assert_eq!(parse_clock("2:30").unwrap(), 150);
        assert_eq!(parse_clock("42").unwrap(), 42);
    }

    #[test]
    fn parse_clock_rejects_non_integer_fields() {
        assert!(matches!(parse_clock("00:aa:05"), Err(CoreError::Format(_))));
        assert!(matches!(parse_clock("00:00:05.5"), Err(CoreError::Format(_))));
        assert!(matches!(parse_clock(""), Err(CoreError::Format(_))));
        assert!(matches!(parse_clock("1::2"), Err(CoreError::Format(_))));
    }

    #[test]
    fn interval_from_clock() {
        let i = TimeInterval::from_clock("00:00:02", "00:00:10").unwrap();
        assert_eq!(i, TimeInterval::new(2, 10).unwrap());
        assert!(TimeInterval::from_clock("00:00:10", "00:00:02").is_err());
    }

    #[test]
    fn format_clock_display() {
        assert_eq!(format_clock(3725), "01:02:05");
        assert_eq!(
            TimeInterval::new(2, 10).unwrap().to_string(),
            "[00:00:02, 00:00:10]"
        );
    }

    #[test]
    fn rational_parses_both_separators() {
        assert_eq!("1:1".parse::<Rational>().unwrap(), Rational::ONE);
        assert_eq!(
            "30000/1001".parse::<Rational>().unwrap(),
            Rational::new(30000, 1001)
        );
        assert_eq!("25".parse::<Rational>().unwrap(), Rational::new(25, 1));
        assert!("a/b".parse::<Rational>().is_err());
    }

    #[test]
    fn rational_floor() {
        assert_eq!(Rational::new(30000, 1001).floor(), Some(29));
        assert_eq!(Rational::new(0, 0).floor(), None);
    }

    #[test]
    fn frame_overrides_apply_per_field() {
        let base = FrameParams {
            width: 1920,
            height: 1080,
            fps: 30,
            sar: Rational::ONE,
        };
        let merged = base.with_overrides(&FrameOverrides {
            width: Some(1280),
            fps: Some(25),
            ..Default::default()
        });
        assert_eq!(merged.width, 1280);
        assert_eq!(merged.height, 1080);
        assert_eq!(merged.fps, 25);
        assert_eq!(merged.sar, Rational::ONE);
    }

    #[test]
    fn operation_sources_in_input_order() {
        let op = EditOperation::Insert {
            main: PathBuf::from("/v/main.mp4"),
            inserts: vec![PathBuf::from("/v/a.mp4"), PathBuf::from("/v/b.mp4")],
            offset: 3,
        };
        let sources: Vec<_> = op.sources().into_iter().cloned().collect();
        assert_eq!(
            sources,
            vec![
                PathBuf::from("/v/main.mp4"),
                PathBuf::from("/v/a.mp4"),
                PathBuf::from("/v/b.mp4"),
            ]
        );
        assert_eq!(op.name(), "insert");
    }

    #[test]
    fn deserialize_rejects_invalid_interval() {
        assert!(serde_json::from_str::<TimeInterval>("[10, 2]").is_err());
        let ok: TimeInterval = serde_json::from_str("[2, 10]").unwrap();
        assert_eq!(ok.duration(), 8);
    }

    #[test]
    fn serde_roundtrip_operation() {
        let op = EditOperation::SetSpeed {
            path: PathBuf::from("/v/a.mp4"),
            factor: 2.0,
            interval: Some(TimeInterval::new(1, 7).unwrap()),
        };
        let json = serde_json::to_string(&op).unwrap();
        let back: EditOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
