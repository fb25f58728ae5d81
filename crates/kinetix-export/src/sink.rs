use std::path::{Path, PathBuf};

use kinetix_core::{FrameBuffer, KinetixError, KinetixResult, OutputFormat};

use crate::apng::ApngSink;
use crate::ffmpeg::{FfmpegCodec, FfmpegSink};
use crate::gif::GifSink;
use crate::protocol::{EncodeFrame, EncoderConfig};

/// A streaming encoder: frames go in one at a time, bytes come out once.
///
/// Dropping a sink without calling [`FrameSink::finish`] discards all output.
pub trait FrameSink: Send {
    fn push(&mut self, frame: &EncodeFrame) -> KinetixResult<()>;

    /// Flush and return the encoded file.
    fn finish(self: Box<Self>) -> KinetixResult<Vec<u8>>;

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;
}

/// Build the sink for `config.format`.
pub fn create(config: &EncoderConfig) -> KinetixResult<Box<dyn FrameSink>> {
    if config.width == 0 || config.height == 0 {
        return Err(KinetixError::Encode(format!(
            "invalid output size {}x{}",
            config.width, config.height
        )));
    }
    if !(config.fps.is_finite() && config.fps > 0.0) {
        return Err(KinetixError::Encode(format!("invalid frame rate {}", config.fps)));
    }
    Ok(match config.format {
        OutputFormat::Mp4 => Box::new(FfmpegSink::new(config, FfmpegCodec::H264)?),
        OutputFormat::Webm => Box::new(FfmpegSink::new(config, FfmpegCodec::Vp9)?),
        OutputFormat::Gif => Box::new(GifSink::new(config)?),
        OutputFormat::Apng => Box::new(ApngSink::new(config)?),
    })
}

/// Reject frames that do not match the configured output size.
pub(crate) fn check_dimensions(
    frame: &FrameBuffer,
    config: &EncoderConfig,
    index: u64,
) -> KinetixResult<()> {
    if frame.width != config.width || frame.height != config.height {
        return Err(KinetixError::Encode(format!(
            "frame {} has dimensions {}x{}, expected {}x{}",
            index, frame.width, frame.height, config.width, config.height
        )));
    }
    Ok(())
}

/// A scratch file the encoder writes into. Removed on drop unless its
/// contents were taken.
#[derive(Debug)]
pub(crate) struct TempOutput {
    path: PathBuf,
}

impl TempOutput {
    pub(crate) fn new(format: OutputFormat) -> Self {
        let name = format!("kinetix-{}.{}", uuid::Uuid::new_v4(), format.extension());
        Self {
            path: std::env::temp_dir().join(name),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the finished file and delete it.
    pub(crate) fn take(self) -> KinetixResult<Vec<u8>> {
        let data = std::fs::read(&self.path)?;
        Ok(data)
    }
}

impl Drop for TempOutput {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use kinetix_core::{Duration, PixelFormat, Timestamp};

    pub fn config(format: OutputFormat, frames: u32) -> EncoderConfig {
        EncoderConfig {
            width: 4,
            height: 4,
            fps: 10.0,
            bitrate: 1_000_000,
            duration: Duration::from_seconds(frames as f64 / 10.0),
            format,
            keyframe_interval: 30,
        }
    }

    pub fn frame(index: u64, shade: u8) -> EncodeFrame {
        let mut bitmap = FrameBuffer::new(4, 4, PixelFormat::Rgba8);
        for y in 0..4 {
            for x in 0..4 {
                bitmap.set_pixel(x, y, [255, shade, 0, 255]);
            }
        }
        EncodeFrame {
            bitmap,
            timestamp: Timestamp::of_frame(index, 10.0),
            key_frame: index == 0,
            duration: Duration::from_seconds(0.1),
        }
    }
}
