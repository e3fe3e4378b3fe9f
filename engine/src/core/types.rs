//! Subtrack Core Type Definitions
//!
//! Defines fundamental types used throughout the engine.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// ID Types
// =============================================================================

/// Stable subtitle item identifier, allocated by the timeline registry
pub type ItemId = i64;

/// Operation unique identifier (ULID)
pub type OpId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Time in frames (integer)
pub type Frame = i64;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Ratio (for fps, aspect ratio, etc.)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    /// Numerator
    pub num: i32,
    /// Denominator
    pub den: i32,
}

impl Ratio {
    /// Creates a new ratio with validation
    pub fn new(num: i32, den: i32) -> Self {
        if den == 0 {
            warn!("Ratio created with zero denominator, defaulting to 1");
            return Self { num, den: 1 };
        }
        Self { num, den }
    }

    /// Builds a frame rate from a floating point value.
    ///
    /// NTSC rates (23.976, 29.97, 59.94...) map to their exact `N*1000/1001` form.
    pub fn from_fps(fps: f64) -> Self {
        if !fps.is_finite() || fps <= 0.0 {
            warn!("Invalid frame rate {}, defaulting to 25fps", fps);
            return Self::new(25, 1);
        }
        if (fps - fps.round()).abs() < 1e-6 {
            return Self::new(fps.round() as i32, 1);
        }
        let ntsc = (fps * 1001.0 / 1000.0).round();
        if (ntsc * 1000.0 / 1001.0 - fps).abs() < 0.005 {
            return Self::new(ntsc as i32 * 1000, 1001);
        }
        Self::new((fps * 1000.0).round() as i32, 1000)
    }

    /// Converts to floating point value
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Returns true if the ratio can be used as a frame rate
    pub fn is_valid_rate(&self) -> bool {
        self.num > 0 && self.den > 0
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self { num: 25, den: 1 } // Default 25fps (PAL)
    }
}

/// Frame display size in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size2D {
    pub width: u32,
    pub height: u32,
}

impl Size2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Size2D {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

// =============================================================================
// GenTime
// =============================================================================

/// A timeline position.
///
/// Stored as integer nanoseconds so it can key ordered maps and convert to and from
/// frame counts without drift. Serialized as seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct GenTime {
    nanos: i64,
}

/// Integer division rounding half away from zero (`den` must be positive).
/// Narrows to i64, saturating at the bounds
fn saturate_i64(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

fn div_round(num: i128, den: i128) -> i128 {
    if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    }
}

impl GenTime {
    pub const ZERO: GenTime = GenTime { nanos: 0 };

    /// Creates a time from seconds. Non-finite input collapses to zero.
    pub fn from_seconds(seconds: TimeSec) -> Self {
        if !seconds.is_finite() {
            return Self::ZERO;
        }
        Self {
            nanos: (seconds * NANOS_PER_SEC as f64).round() as i64,
        }
    }

    pub fn from_millis(millis: i64) -> Self {
        Self {
            nanos: millis.saturating_mul(1_000_000),
        }
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Creates a time from a frame count at the given frame rate
    pub fn from_frames(frames: Frame, fps: Ratio) -> Self {
        if !fps.is_valid_rate() {
            return Self::ZERO;
        }
        let nanos = div_round(
            frames as i128 * NANOS_PER_SEC * fps.den as i128,
            fps.num as i128,
        );
        Self {
            nanos: saturate_i64(nanos),
        }
    }

    pub fn seconds(&self) -> TimeSec {
        self.nanos as f64 / NANOS_PER_SEC as f64
    }

    /// Frame index of this time at the given frame rate, rounded to nearest
    pub fn frames(&self, fps: Ratio) -> Frame {
        if !fps.is_valid_rate() {
            return 0;
        }
        saturate_i64(div_round(
            self.nanos as i128 * fps.num as i128,
            NANOS_PER_SEC * fps.den as i128,
        ))
    }

    /// Milliseconds, rounded to nearest
    pub fn millis(&self) -> i64 {
        saturate_i64(div_round(self.nanos as i128, 1_000_000))
    }

    pub fn nanos(&self) -> i64 {
        self.nanos
    }

    pub fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    /// Scales the time by `num / den` (used for framerate retiming)
    pub fn scaled(&self, num: f64, den: f64) -> Self {
        if den == 0.0 || !num.is_finite() || !den.is_finite() {
            return *self;
        }
        Self::from_seconds(self.seconds() * num / den)
    }
}

impl From<f64> for GenTime {
    fn from(seconds: f64) -> Self {
        Self::from_seconds(seconds)
    }
}

impl From<GenTime> for f64 {
    fn from(time: GenTime) -> Self {
        time.seconds()
    }
}

impl Add for GenTime {
    type Output = GenTime;

    fn add(self, rhs: GenTime) -> GenTime {
        GenTime {
            nanos: self.nanos.saturating_add(rhs.nanos),
        }
    }
}

impl Sub for GenTime {
    type Output = GenTime;

    fn sub(self, rhs: GenTime) -> GenTime {
        GenTime {
            nanos: self.nanos.saturating_sub(rhs.nanos),
        }
    }
}

impl Neg for GenTime {
    type Output = GenTime;

    fn neg(self) -> GenTime {
        GenTime {
            nanos: self.nanos.saturating_neg(),
        }
    }
}

impl fmt::Display for GenTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_exactly() {
        let rates = [
            Ratio::new(25, 1),
            Ratio::new(30000, 1001),
            Ratio::new(24000, 1001),
            Ratio::new(60, 1),
        ];
        for fps in rates {
            for frames in [0, 1, 7, 24, 25, 1799, 90_000, -3] {
                assert_eq!(GenTime::from_frames(frames, fps).frames(fps), frames);
            }
        }
    }

    #[test]
    fn ordering_follows_seconds() {
        let a = GenTime::from_seconds(1.0);
        let b = GenTime::from_frames(26, Ratio::new(25, 1));
        assert!(a < b);
        assert_eq!(GenTime::from_seconds(1.0), GenTime::from_frames(25, Ratio::new(25, 1)));
    }

    #[test]
    fn serializes_as_seconds() {
        let json = serde_json::to_string(&GenTime::from_millis(1500)).unwrap();
        assert_eq!(json, "1.5");
        let back: GenTime = serde_json::from_str("2.25").unwrap();
        assert_eq!(back.millis(), 2250);
    }

    #[test]
    fn ratio_from_fps_detects_ntsc() {
        assert_eq!(Ratio::from_fps(25.0), Ratio::new(25, 1));
        assert_eq!(Ratio::from_fps(29.97), Ratio::new(30000, 1001));
        assert_eq!(Ratio::from_fps(23.976), Ratio::new(24000, 1001));
        assert_eq!(Ratio::from_fps(-1.0), Ratio::new(25, 1));
    }

    #[test]
    fn arithmetic_saturates() {
        let t = GenTime::from_seconds(3.0) - GenTime::from_seconds(1.0);
        assert_eq!(t.millis(), 2000);
        assert!((GenTime::ZERO - GenTime::from_millis(1)).is_negative());
        assert_eq!((-GenTime::from_millis(5)).millis(), -5);
        assert_eq!((-GenTime::from_nanos(i64::MIN)).nanos(), i64::MAX);
    }

    #[test]
    fn large_frame_counts_saturate() {
        let fps = Ratio::new(25, 1);
        assert_eq!(GenTime::from_frames(1_000_000_000, fps).seconds(), 4.0e7);
        // 4e10 seconds is past the nanosecond range: clamp instead of wrapping
        assert_eq!(GenTime::from_frames(1_000_000_000_000, fps).nanos(), i64::MAX);
        assert_eq!(GenTime::from_frames(i64::MAX, fps).nanos(), i64::MAX);
        assert_eq!(GenTime::from_frames(i64::MIN, fps).nanos(), i64::MIN);
        assert_eq!(GenTime::from_nanos(i64::MAX).frames(fps), 230_584_300_921);
    }
}
