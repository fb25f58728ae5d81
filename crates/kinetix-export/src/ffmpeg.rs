use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

use kinetix_core::{KinetixError, KinetixResult};

use crate::protocol::{EncodeFrame, EncoderConfig};
use crate::sink::{check_dimensions, FrameSink, TempOutput};

/// Video codecs produced through FFmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfmpegCodec {
    /// H.264 in fragmented MP4.
    H264,
    /// VP9 in WebM.
    Vp9,
}

impl FfmpegCodec {
    fn args(&self) -> &'static [&'static str] {
        match self {
            FfmpegCodec::H264 => &[
                "-c:v", "libx264",
                "-pix_fmt", "yuv420p",
                "-preset", "medium",
                "-movflags", "+frag_keyframe+empty_moov+default_base_moof",
                "-f", "mp4",
            ],
            FfmpegCodec::Vp9 => &[
                "-c:v", "libvpx-vp9",
                "-pix_fmt", "yuva420p",
                "-row-mt", "1",
                "-f", "webm",
            ],
        }
    }

    fn format(&self) -> kinetix_core::OutputFormat {
        match self {
            FfmpegCodec::H264 => kinetix_core::OutputFormat::Mp4,
            FfmpegCodec::Vp9 => kinetix_core::OutputFormat::Webm,
        }
    }
}

/// Check if FFmpeg is available on the system.
pub fn is_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Streams raw RGBA frames into an `ffmpeg` child process.
pub struct FfmpegSink {
    config: EncoderConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output: Option<TempOutput>,
    frames: u64,
}

impl FfmpegSink {
    pub fn new(config: &EncoderConfig, codec: FfmpegCodec) -> KinetixResult<Self> {
        if !is_available() {
            return Err(KinetixError::Encode(
                "ffmpeg not found in PATH. Install FFmpeg: https://ffmpeg.org/download.html".into(),
            ));
        }
        let output = TempOutput::new(codec.format());
        let keyframes = format!("expr:eq(mod(n,{}),0)", config.keyframe_interval.max(1));
        let size = format!("{}x{}", config.width, config.height);
        let framerate = config.fps.to_string();
        let bitrate = config.bitrate.to_string();

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-hide_banner", "-nostats", "-loglevel", "error"]);
        cmd.args([
            "-f", "rawvideo",
            "-pixel_format", "rgba",
            "-video_size", size.as_str(),
            "-framerate", framerate.as_str(),
            "-i", "-",
        ]);
        cmd.args(codec.args());
        cmd.args(["-b:v", bitrate.as_str()]);
        cmd.args(["-force_key_frames", keyframes.as_str()]);
        cmd.arg(output.path());

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| KinetixError::Encode(format!("failed to start ffmpeg: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| KinetixError::Encode("failed to open ffmpeg stdin".into()))?;

        tracing::debug!(?codec, "ffmpeg started, writing to {}", output.path().display());

        Ok(Self {
            config: config.clone(),
            child: Some(child),
            stdin: Some(stdin),
            output: Some(output),
            frames: 0,
        })
    }

    /// Wait for the child and turn a failure into an error carrying stderr.
    fn reap(&mut self, context: &str) -> KinetixResult<()> {
        drop(self.stdin.take());
        let Some(child) = self.child.take() else {
            return Ok(());
        };
        let output = child
            .wait_with_output()
            .map_err(|e| KinetixError::Encode(format!("ffmpeg process error: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KinetixError::Encode(format!(
                "{}: ffmpeg exited with {}: {}",
                context,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn push(&mut self, frame: &EncodeFrame) -> KinetixResult<()> {
        check_dimensions(&frame.bitmap, &self.config, self.frames)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| KinetixError::Encode("ffmpeg input already closed".into()))?;
        if let Err(e) = stdin.write_all(&frame.bitmap.data) {
            let context = format!("failed to write frame {} to ffmpeg ({})", self.frames, e);
            self.reap(&context)?;
            return Err(KinetixError::Encode(context));
        }
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> KinetixResult<Vec<u8>> {
        self.reap("finalizing")?;
        let output = self
            .output
            .take()
            .ok_or_else(|| KinetixError::Encode("ffmpeg output missing".into()))?;
        let data = output.take()?;
        tracing::info!(
            "Encoded {} frames with ffmpeg ({}x{} @ {}fps, {} bytes)",
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

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
