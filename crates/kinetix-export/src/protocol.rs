//! Messages exchanged with the encoder worker.
//!
//! Requests flow capture → worker, events flow back. The worker never shares
//! memory with the capture loop; every frame is moved into its message.

use kinetix_core::{Duration, FrameBuffer, OutputFormat, Timestamp};
use serde::{Deserialize, Serialize};

/// Bitrate used for outputs at least 1080 pixels tall.
pub const HIGH_BITRATE: u32 = 8_000_000;
/// Bitrate for everything smaller.
pub const STANDARD_BITRATE: u32 = 4_000_000;

/// Pick the target bitrate for an output height.
pub fn bitrate_for_height(height: u32) -> u32 {
    if height >= 1080 {
        HIGH_BITRATE
    } else {
        STANDARD_BITRATE
    }
}

/// Sent once before the first frame (`CONFIG`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Bits per second.
    pub bitrate: u32,
    pub duration: Duration,
    pub format: OutputFormat,
    pub keyframe_interval: u64,
}

impl EncoderConfig {
    /// Number of frames an offline capture of `duration` produces.
    pub fn expected_frames(&self) -> u64 {
        self.duration.frame_count(self.fps)
    }
}

/// One captured frame (`ENCODE_FRAME`).
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeFrame {
    pub bitmap: FrameBuffer,
    pub timestamp: Timestamp,
    pub key_frame: bool,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerRequest {
    Config(EncoderConfig),
    EncodeFrame(EncodeFrame),
    /// Flush the encoder and produce the output.
    Finalize,
    /// Drop whatever has been encoded so far.
    Abort,
}

impl WorkerRequest {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerRequest::Config(_) => "CONFIG",
            WorkerRequest::EncodeFrame(_) => "ENCODE_FRAME",
            WorkerRequest::Finalize => "FINALIZE",
            WorkerRequest::Abort => "ABORT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerEvent {
    /// A frame was consumed; returns one credit.
    FrameDone,
    Complete { data: Vec<u8> },
    Error { error: String },
    Log { message: String },
    /// Reply to ABORT. No event belonging to an earlier request follows it.
    Aborted,
}

impl WorkerEvent {
    pub fn log(message: impl Into<String>) -> Self {
        WorkerEvent::Log {
            message: message.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        WorkerEvent::Error {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate_threshold() {
        assert_eq!(bitrate_for_height(1080), HIGH_BITRATE);
        assert_eq!(bitrate_for_height(2160), HIGH_BITRATE);
        assert_eq!(bitrate_for_height(1078), STANDARD_BITRATE);
    }

    #[test]
    fn test_event_wire_names() {
        let json = serde_json::to_value(WorkerEvent::FrameDone).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "FRAME_DONE" }));
        let json = serde_json::to_value(WorkerEvent::log("ready")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "LOG", "message": "ready" }));
        let json = serde_json::to_value(WorkerEvent::Aborted).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "ABORTED" }));
    }

    #[test]
    fn test_expected_frames() {
        let config = EncoderConfig {
            width: 2,
            height: 2,
            fps: 30.0,
            bitrate: STANDARD_BITRATE,
            duration: Duration::from_seconds(2.0),
            format: OutputFormat::Gif,
            keyframe_interval: 30,
        };
        assert_eq!(config.expected_frames(), 60);
        assert_eq!(WorkerRequest::Config(config).name(), "CONFIG");
    }
}
