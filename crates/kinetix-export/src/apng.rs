use std::fs::File;
use std::io::BufWriter;

use kinetix_core::{KinetixError, KinetixResult, OutputFormat};

use crate::protocol::{EncodeFrame, EncoderConfig};
use crate::sink::{check_dimensions, FrameSink, TempOutput};

/// Lossless animated PNG through the `png` crate.
///
/// APNG declares its frame count in the header, so the sink needs the whole
/// timeline up front and only works for offline captures.
pub struct ApngSink {
    config: EncoderConfig,
    writer: Option<png::Writer<BufWriter<File>>>,
    output: Option<TempOutput>,
    expected: u64,
    frames: u64,
}

impl ApngSink {
    pub fn new(config: &EncoderConfig) -> KinetixResult<Self> {
        let expected = config.expected_frames();
        let num_frames = u32::try_from(expected)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| KinetixError::Encode(format!("invalid APNG frame count {}", expected)))?;

        let output = TempOutput::new(OutputFormat::Apng);
        let file = File::create(output.path())
            .map_err(|e| KinetixError::Encode(format!("failed to create APNG file: {}", e)))?;

        // Frame delay is numerator / denominator seconds.
        let delay_den = config.fps.round().clamp(1.0, u16::MAX as f64) as u16;

        let mut encoder = png::Encoder::new(BufWriter::new(file), config.width, config.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder
            .set_animated(num_frames, 0)
            .map_err(|e| KinetixError::Encode(format!("failed to set APNG animation: {}", e)))?;
        encoder
            .set_frame_delay(1, delay_den)
            .map_err(|e| KinetixError::Encode(format!("failed to set APNG frame delay: {}", e)))?;

        let writer = encoder
            .write_header()
            .map_err(|e| KinetixError::Encode(format!("failed to write APNG header: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            writer: Some(writer),
            output: Some(output),
            expected,
            frames: 0,
        })
    }
}

impl FrameSink for ApngSink {
    fn push(&mut self, frame: &EncodeFrame) -> KinetixResult<()> {
        check_dimensions(&frame.bitmap, &self.config, self.frames)?;
        if self.frames >= self.expected {
            return Err(KinetixError::Encode(format!(
                "APNG was configured for {} frames",
                self.expected
            )));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| KinetixError::Encode("APNG writer already finished".into()))?;
        writer.write_image_data(&frame.bitmap.data).map_err(|e| {
            KinetixError::Encode(format!("failed to write APNG frame {}: {}", self.frames, e))
        })?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> KinetixResult<Vec<u8>> {
        if self.frames != self.expected {
            return Err(KinetixError::Encode(format!(
                "APNG expected {} frames, got {}",
                self.expected, self.frames
            )));
        }
        let writer = self
            .writer
            .take()
            .ok_or_else(|| KinetixError::Encode("APNG writer already finished".into()))?;
        writer
            .finish()
            .map_err(|e| KinetixError::Encode(format!("failed to finalize APNG: {}", e)))?;
        let output = self
            .output
            .take()
            .ok_or_else(|| KinetixError::Encode("APNG output missing".into()))?;
        let data = output.take()?;
        tracing::info!(
            "Encoded {} frames to APNG ({}x{} @ {}fps, {} bytes)",
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
