use std::fs::File;
use std::io::BufWriter;

use image::codecs::gif::{GifEncoder, Repeat};
use kinetix_core::{KinetixError, KinetixResult, OutputFormat};

use crate::protocol::{EncodeFrame, EncoderConfig};
use crate::sink::{check_dimensions, FrameSink, TempOutput};

/// Animated GIF through the `image` crate. Loops forever.
pub struct GifSink {
    config: EncoderConfig,
    encoder: Option<GifEncoder<BufWriter<File>>>,
    output: Option<TempOutput>,
    frames: u64,
}

impl GifSink {
    pub fn new(config: &EncoderConfig) -> KinetixResult<Self> {
        let output = TempOutput::new(OutputFormat::Gif);
        let file = File::create(output.path())
            .map_err(|e| KinetixError::Encode(format!("failed to create GIF file: {}", e)))?;

        let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), 10);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| KinetixError::Encode(format!("failed to set GIF repeat: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            encoder: Some(encoder),
            output: Some(output),
            frames: 0,
        })
    }
}

/// GIF delays are whole centiseconds and players clamp anything below 2.
fn delay_ms(frame: &EncodeFrame) -> u32 {
    let cs = (frame.duration.as_seconds() * 100.0).round() as u32;
    cs.max(2) * 10
}

impl FrameSink for GifSink {
    fn push(&mut self, frame: &EncodeFrame) -> KinetixResult<()> {
        check_dimensions(&frame.bitmap, &self.config, self.frames)?;
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| KinetixError::Encode("GIF encoder already finished".into()))?;

        let image = image::RgbaImage::from_raw(
            frame.bitmap.width,
            frame.bitmap.height,
            frame.bitmap.data.clone(),
        )
        .ok_or_else(|| KinetixError::Encode(format!("invalid frame data at frame {}", self.frames)))?;
        let gif_frame = image::Frame::from_parts(
            image,
            0,
            0,
            image::Delay::from_numer_denom_ms(delay_ms(frame), 1),
        );
        encoder.encode_frame(gif_frame).map_err(|e| {
            KinetixError::Encode(format!("failed to encode GIF frame {}: {}", self.frames, e))
        })?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> KinetixResult<Vec<u8>> {
        if self.frames == 0 {
            return Err(KinetixError::Encode("no frames to encode for GIF".into()));
        }
        // Dropping the encoder writes the trailer and flushes the file.
        drop(self.encoder.take());
        let output = self
            .output
            .take()
            .ok_or_else(|| KinetixError::Encode("GIF output missing".into()))?;
        let data = output.take()?;
        tracing::info!(
            "Encoded {} frames to GIF ({}x{} @ {}fps, {} bytes)",
            self.frames,
            self.config.width,
            self.config.height,
            self.config.fps,
            data.len()
        );
        Ok(data)
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}
