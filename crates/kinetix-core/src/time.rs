//! Time newtypes used at the export boundary.
//!
//! The engine itself works in `f64` milliseconds. Once frames leave it they
//! carry a [`Timestamp`] and a [`Duration`], both stored as non-negative
//! seconds.

use serde::{Deserialize, Serialize};
use std::fmt;

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}

/// A length of time. Negative and non-finite inputs become zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Duration {
    seconds: f64,
}

impl Duration {
    pub fn from_seconds(s: f64) -> Self {
        Self { seconds: sanitize(s) }
    }

    pub fn from_millis(ms: f64) -> Self {
        Self::from_seconds(ms / 1000.0)
    }

    /// Length of one frame at `fps`.
    pub fn per_frame(fps: f64) -> Self {
        Self::from_seconds(1.0 / fps)
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn as_seconds(&self) -> f64 {
        self.seconds
    }

    pub fn as_millis(&self) -> f64 {
        self.seconds * 1000.0
    }

    pub fn as_micros(&self) -> u64 {
        (self.seconds * 1_000_000.0).round() as u64
    }

    /// Frames needed to cover this duration at `fps`, rounded up.
    pub fn frame_count(&self, fps: f64) -> u64 {
        (self.seconds * fps).ceil() as u64
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds < 1.0 {
            write!(f, "{:.0}ms", self.as_millis())
        } else {
            write!(f, "{:.2}s", self.seconds)
        }
    }
}

/// Presentation time of a frame, measured from the start of the video.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Timestamp {
    seconds: f64,
}

impl Timestamp {
    pub fn from_seconds(s: f64) -> Self {
        Self { seconds: sanitize(s) }
    }

    pub fn from_millis(ms: f64) -> Self {
        Self::from_seconds(ms / 1000.0)
    }

    /// Timestamp of frame `index` at `fps`: `index / fps` seconds.
    pub fn of_frame(index: u64, fps: f64) -> Self {
        Self::from_seconds(index as f64 / fps)
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn as_seconds(&self) -> f64 {
        self.seconds
    }

    /// Engine time for this timestamp.
    pub fn as_millis(&self) -> f64 {
        self.seconds * 1000.0
    }

    /// Whole microseconds, the unit encoders count in.
    pub fn as_micros(&self) -> u64 {
        (self.seconds * 1_000_000.0).round() as u64
    }
}

impl fmt::Display for Timestamp {
    /// `HH:MM:SS.mmm`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis() as u64;
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            ms / 3_600_000,
            ms / 60_000 % 60,
            ms / 1_000 % 60,
            ms % 1_000
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_millis() {
        let d = Duration::from_millis(2500.0);
        assert!((d.as_seconds() - 2.5).abs() < 0.001);
        assert_eq!(d.as_micros(), 2_500_000);
    }

    #[test]
    fn test_invalid_input_becomes_zero() {
        assert_eq!(Duration::from_seconds(-3.0), Duration::zero());
        assert_eq!(Duration::from_seconds(f64::NAN), Duration::zero());
        assert_eq!(Timestamp::from_millis(f64::INFINITY), Timestamp::zero());
    }

    #[test]
    fn test_frame_count_rounds_up() {
        assert_eq!(Duration::from_seconds(2.0).frame_count(30.0), 60);
        assert_eq!(Duration::from_seconds(1.01).frame_count(30.0), 31);
        assert_eq!(Duration::zero().frame_count(30.0), 0);
    }

    #[test]
    fn test_per_frame() {
        assert_eq!(Duration::per_frame(25.0).as_micros(), 40_000);
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(format!("{}", Duration::from_seconds(2.5)), "2.50s");
        assert_eq!(format!("{}", Duration::from_millis(500.0)), "500ms");
    }

    #[test]
    fn test_timestamp_of_frame() {
        let ts = Timestamp::of_frame(30, 30.0);
        assert!((ts.as_seconds() - 1.0).abs() < 1e-9);
        assert!((ts.as_millis() - 1000.0).abs() < 1e-9);
        assert_eq!(Timestamp::of_frame(1, 30.0).as_micros(), 33_333);
    }

    #[test]
    fn test_timestamp_display() {
        let ts = Timestamp::from_seconds(3661.5);
        assert_eq!(format!("{}", ts), "01:01:01.500");
    }
}
