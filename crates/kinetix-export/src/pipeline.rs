//! Export state machine: drive the engine, capture frames, feed the worker.

use std::collections::VecDeque;
use std::time::Duration as StdDuration;

use kinetix_core::{
    Duration, ExportConfig, ExportMode, FrameBuffer, KinetixError, KinetixResult, OutputFormat,
    PixelFormat, Timestamp,
};
use kinetix_engine::Engine;
use serde::{Deserialize, Serialize};

use crate::abort::AbortSignal;
use crate::protocol::{bitrate_for_height, EncodeFrame, EncoderConfig, WorkerEvent, WorkerRequest};
use crate::worker::WorkerHandle;

/// User-visible log lines kept by the pipeline.
pub const MAX_LOG_LINES: usize = 20;

/// How often a blocked capture loop re-checks the abort signal.
const ABORT_POLL: StdDuration = StdDuration::from_millis(10);

/// How long an abandoned export waits for the worker to confirm ABORT.
const ABORT_ACK_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Progress reached once every frame has been captured in offline mode.
const CAPTURE_PROGRESS: f64 = 90.0;

/// Lifecycle of an export. `Complete` and `Error` go back to `Idle` through
/// [`ExportPipeline::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    #[default]
    Idle,
    Rendering,
    Encoding,
    Complete,
    Error,
}

/// Parameters of a single export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub duration: Duration,
    pub fps: f64,
    pub mode: ExportMode,
    pub format: OutputFormat,
    /// Output size relative to the canvas.
    pub quality_scale: f64,
    /// Frames allowed in flight before capture blocks.
    pub initial_credits: u32,
    /// Pause after each offline frame hand-off.
    pub frame_yield: StdDuration,
    pub keyframe_interval: u64,
}

impl ExportOptions {
    pub fn new(duration: Duration) -> Self {
        Self::from_config(&ExportConfig::default(), duration)
    }

    pub fn from_config(config: &ExportConfig, duration: Duration) -> Self {
        Self {
            duration,
            fps: config.fps,
            mode: config.mode,
            format: config.format,
            quality_scale: config.quality_scale,
            initial_credits: config.initial_credits,
            frame_yield: StdDuration::from_millis(config.frame_yield_ms),
            keyframe_interval: config.keyframe_interval,
        }
    }

    /// Frames an offline export submits: `ceil(duration × fps)`.
    pub fn total_frames(&self) -> u64 {
        self.duration.frame_count(self.fps)
    }

    /// Encoded frame size for a canvas, rounded to even numbers.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        let even = |v: u32| {
            let scaled = ((v as f64 * self.quality_scale) / 2.0).round() as u32 * 2;
            scaled.max(2)
        };
        (even(width), even(height))
    }

    fn validate(&self) -> KinetixResult<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(KinetixError::InvalidArgument(format!("invalid frame rate {}", self.fps)));
        }
        if self.duration.as_seconds() <= 0.0 {
            return Err(KinetixError::InvalidArgument("export duration must be positive".into()));
        }
        if !(self.quality_scale.is_finite() && self.quality_scale > 0.0) {
            return Err(KinetixError::InvalidArgument(format!(
                "invalid quality scale {}",
                self.quality_scale
            )));
        }
        if self.initial_credits == 0 {
            return Err(KinetixError::InvalidArgument(
                "at least one encoder credit is required".into(),
            ));
        }
        if self.mode == ExportMode::Realtime && self.format == OutputFormat::Apng {
            return Err(KinetixError::Unsupported(
                "APNG needs the frame count up front; use offline mode".into(),
            ));
        }
        Ok(())
    }
}

/// A finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Frames submitted to the encoder.
    pub frames: u64,
}

impl ExportOutput {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// Puts the engine into capture state and restores it when dropped, including
/// when the export future is dropped mid-way.
struct CaptureSession<'a> {
    engine: &'a mut Engine,
    overlay: bool,
    looping: bool,
}

impl<'a> CaptureSession<'a> {
    fn begin(engine: &'a mut Engine) -> Self {
        let overlay = engine.overlay_enabled();
        let looping = engine.is_looping();
        engine.pause();
        engine.set_overlay_enabled(false);
        Self {
            engine,
            overlay,
            looping,
        }
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        self.engine.pause();
        self.engine.set_looping(self.looping);
        self.engine.set_overlay_enabled(self.overlay);
    }
}

/// Drives exports through one encoder worker.
#[derive(Debug)]
pub struct ExportPipeline {
    worker: WorkerHandle,
    status: ExportStatus,
    progress: f64,
    logs: VecDeque<String>,
    /// The worker may still be processing requests of an export that never
    /// finished. Cleared by COMPLETE or by the ABORT acknowledgement.
    unsettled: bool,
}

impl ExportPipeline {
    pub fn new(worker: WorkerHandle) -> Self {
        Self {
            worker,
            status: ExportStatus::Idle,
            progress: 0.0,
            logs: VecDeque::with_capacity(MAX_LOG_LINES),
            unsettled: false,
        }
    }

    /// Pipeline backed by the built-in encoder thread.
    pub fn spawn() -> KinetixResult<Self> {
        Ok(Self::new(WorkerHandle::spawn()?))
    }

    pub fn status(&self) -> ExportStatus {
        self.status
    }

    /// Last reported progress, 0 to 100.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn logs(&self) -> impl Iterator<Item = &str> + '_ {
        self.logs.iter().map(String::as_str)
    }

    /// Leave `Complete` or `Error` so another export can be started.
    pub fn reset(&mut self) {
        if matches!(self.status, ExportStatus::Complete | ExportStatus::Error) {
            self.status = ExportStatus::Idle;
            self.progress = 0.0;
        }
    }

    /// Stop the worker thread.
    pub fn shutdown(self) {
        self.worker.shutdown();
    }

    fn push_log(&mut self, line: impl Into<String>) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(line.into());
    }

    /// Export `options.duration` of the engine's timeline.
    ///
    /// Rejects with [`KinetixError::Cancelled`] when `abort` fires; the
    /// pipeline then returns to `Idle` and the worker discards its output.
    /// Encoder failures leave the pipeline in `Error`. Either way the worker
    /// has confirmed the abort before this returns, so nothing from this
    /// export reaches the next one.
    pub async fn export(
        &mut self,
        engine: &mut Engine,
        options: &ExportOptions,
        mut on_progress: impl FnMut(f64),
        abort: &AbortSignal,
    ) -> KinetixResult<ExportOutput> {
        options.validate()?;

        self.status = ExportStatus::Rendering;
        self.progress = 0.0;
        self.logs.clear();
        on_progress(0.0);

        let result = match self.settle().await {
            Ok(()) => {
                self.unsettled = true;
                self.run(engine, options, &mut on_progress, abort).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => {
                self.unsettled = false;
                self.status = ExportStatus::Complete;
                self.progress = 100.0;
                on_progress(100.0);
                self.push_log(format!("Export complete: {} bytes", output.data.len()));
                tracing::info!(
                    frames = output.frames,
                    bytes = output.data.len(),
                    "export complete ({}x{} {:?})",
                    output.width,
                    output.height,
                    output.format
                );
                if options.mode == ExportMode::Offline {
                    engine.seek(0.0);
                }
                Ok(output)
            }
            Err(e) if e.is_cancelled() => {
                self.abort_worker().await;
                self.status = ExportStatus::Idle;
                self.progress = 0.0;
                self.push_log("Export cancelled");
                tracing::info!("export cancelled");
                Err(e)
            }
            Err(e) => {
                self.abort_worker().await;
                self.status = ExportStatus::Error;
                self.push_log(format!("[Error] {}", e));
                tracing::error!("export failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        engine: &mut Engine,
        options: &ExportOptions,
        on_progress: &mut dyn FnMut(f64),
        abort: &AbortSignal,
    ) -> KinetixResult<ExportOutput> {
        let (width, height) =
            options.output_size(engine.canvas().width(), engine.canvas().height());
        let config = EncoderConfig {
            width,
            height,
            fps: options.fps,
            bitrate: bitrate_for_height(height),
            duration: options.duration,
            format: options.format,
            keyframe_interval: options.keyframe_interval.max(1),
        };

        self.push_log("Starting export...");
        self.push_log(format!("Resolution: {}x{}", width, height));
        tracing::info!(
            mode = ?options.mode,
            format = ?options.format,
            "starting export: {}x{} @ {}fps, {}",
            width,
            height,
            options.fps,
            options.duration
        );
        self.worker.send(WorkerRequest::Config(config.clone()))?;

        let frames = {
            let mut session = CaptureSession::begin(engine);
            match options.mode {
                ExportMode::Offline => {
                    self.capture_offline(&mut session, &config, options, on_progress, abort)
                        .await?
                }
                ExportMode::Realtime => {
                    self.capture_realtime(&mut session, &config, options, on_progress, abort)
                        .await?
                }
            }
        };

        self.status = ExportStatus::Encoding;
        self.push_log(format!("Finalizing {} frames...", frames));
        self.worker.send(WorkerRequest::Finalize)?;
        let data = self.await_complete(abort).await?;

        Ok(ExportOutput {
            data,
            format: options.format,
            width,
            height,
            frames,
        })
    }

    /// Frame-by-frame: seek to `i / fps`, capture, hand off.
    async fn capture_offline(
        &mut self,
        session: &mut CaptureSession<'_>,
        config: &EncoderConfig,
        options: &ExportOptions,
        on_progress: &mut dyn FnMut(f64),
        abort: &AbortSignal,
    ) -> KinetixResult<u64> {
        let total = options.total_frames();
        let frame_duration = Duration::per_frame(options.fps);
        let mut credits = options.initial_credits;

        for i in 0..total {
            self.wait_for_credit(&mut credits, abort).await?;

            let timestamp = Timestamp::of_frame(i, options.fps);
            session.engine.seek(timestamp.as_millis());
            let bitmap = scale_frame(session.engine.capture_frame(), config.width, config.height)?;
            self.worker.send(WorkerRequest::EncodeFrame(EncodeFrame {
                bitmap,
                timestamp,
                key_frame: i % config.keyframe_interval == 0,
                duration: frame_duration,
            }))?;
            tracing::debug!(frame = i, %timestamp, "frame submitted");

            self.progress = (i + 1) as f64 / total as f64 * CAPTURE_PROGRESS;
            on_progress(self.progress);
            pause(options.frame_yield).await;
        }
        Ok(total)
    }

    /// Live playback: capture whatever the engine shows every `1 / fps` of
    /// wall-clock time until the target duration is reached.
    async fn capture_realtime(
        &mut self,
        session: &mut CaptureSession<'_>,
        config: &EncoderConfig,
        options: &ExportOptions,
        on_progress: &mut dyn FnMut(f64),
        abort: &AbortSignal,
    ) -> KinetixResult<u64> {
        let target_ms = options.duration.as_millis();
        let interval = StdDuration::from_secs_f64(1.0 / options.fps);
        let frame_duration = Duration::per_frame(options.fps);
        let mut credits = options.initial_credits;

        session.engine.set_looping(false);
        session.engine.seek(0.0);
        session.engine.play();

        let mut frames = 0u64;
        loop {
            self.wait_for_credit(&mut credits, abort).await?;

            let now = session.engine.current_time();
            let bitmap = scale_frame(session.engine.capture_frame(), config.width, config.height)?;
            self.worker.send(WorkerRequest::EncodeFrame(EncodeFrame {
                bitmap,
                timestamp: Timestamp::from_millis(now),
                key_frame: frames % config.keyframe_interval == 0,
                duration: frame_duration,
            }))?;
            tracing::debug!(frame = frames, time = now, "live frame submitted");
            frames += 1;

            self.progress = (now / target_ms * 100.0).min(99.0);
            on_progress(self.progress);

            if now >= target_ms || !session.engine.is_playing() {
                break;
            }
            tokio::time::sleep(interval).await;
            session.engine.tick();
        }
        Ok(frames)
    }

    /// Block until the worker returns a credit, then spend it.
    async fn wait_for_credit(&mut self, credits: &mut u32, abort: &AbortSignal) -> KinetixResult<()> {
        loop {
            if abort.is_aborted() {
                return Err(KinetixError::Cancelled);
            }
            self.pump(credits)?;
            if *credits > 0 {
                *credits -= 1;
                return Ok(());
            }
            let event = tokio::select! {
                event = self.worker.recv() => Some(event),
                _ = tokio::time::sleep(ABORT_POLL) => None,
            };
            if let Some(event) = event {
                let event = event.ok_or_else(worker_gone)?;
                self.handle_capture_event(event, credits)?;
            }
        }
    }

    /// Process everything already queued without waiting.
    fn pump(&mut self, credits: &mut u32) -> KinetixResult<()> {
        while let Some(event) = self.worker.try_recv()? {
            self.handle_capture_event(event, credits)?;
        }
        Ok(())
    }

    fn handle_capture_event(&mut self, event: WorkerEvent, credits: &mut u32) -> KinetixResult<()> {
        match event {
            WorkerEvent::FrameDone => *credits += 1,
            WorkerEvent::Log { message } => self.push_log(format!("[Worker] {}", message)),
            WorkerEvent::Error { error } => return Err(KinetixError::Encode(error)),
            WorkerEvent::Complete { .. } => {
                tracing::warn!("ignoring COMPLETE received before FINALIZE");
            }
            WorkerEvent::Aborted => tracing::warn!("ignoring unrequested ABORTED"),
        }
        Ok(())
    }

    async fn await_complete(&mut self, abort: &AbortSignal) -> KinetixResult<Vec<u8>> {
        loop {
            if abort.is_aborted() {
                return Err(KinetixError::Cancelled);
            }
            let event = tokio::select! {
                event = self.worker.recv() => Some(event),
                _ = tokio::time::sleep(ABORT_POLL) => None,
            };
            match event {
                None | Some(Some(WorkerEvent::FrameDone | WorkerEvent::Aborted)) => {}
                Some(Some(WorkerEvent::Complete { data })) => {
                    // A late abort wins over a finished file.
                    if abort.is_aborted() {
                        return Err(KinetixError::Cancelled);
                    }
                    return Ok(data);
                }
                Some(Some(WorkerEvent::Log { message })) => {
                    self.push_log(format!("[Worker] {}", message))
                }
                Some(Some(WorkerEvent::Error { error })) => return Err(KinetixError::Encode(error)),
                Some(None) => return Err(worker_gone()),
            }
        }
    }

    /// Make sure no earlier export can still talk to this one.
    async fn settle(&mut self) -> KinetixResult<()> {
        if self.unsettled {
            tracing::debug!("previous export was abandoned; aborting it first");
            self.abort_worker().await;
            if self.unsettled {
                return Err(KinetixError::Encode(
                    "encoder is still busy with an abandoned export".into(),
                ));
            }
        }
        self.drain_stale()
    }

    /// Send ABORT and discard everything up to its acknowledgement. Leaves
    /// `unsettled` set if the worker does not answer in time.
    async fn abort_worker(&mut self) {
        if self.worker.send(WorkerRequest::Abort).is_err() {
            // Nobody left to send stale events.
            self.unsettled = false;
            return;
        }
        let mut dropped = 0usize;
        let acked = tokio::time::timeout(ABORT_ACK_TIMEOUT, async {
            while let Some(event) = self.worker.recv().await {
                match event {
                    WorkerEvent::Aborted => return,
                    WorkerEvent::Log { message } => {
                        self.push_log(format!("[Worker] {}", message))
                    }
                    WorkerEvent::FrameDone
                    | WorkerEvent::Error { .. }
                    | WorkerEvent::Complete { .. } => dropped += 1,
                }
            }
        })
        .await;
        match acked {
            Ok(()) => {
                self.unsettled = false;
                if dropped > 0 {
                    tracing::debug!(dropped, "discarded events of the aborted export");
                }
            }
            Err(_) => tracing::warn!(
                "encoder did not acknowledge ABORT within {:?}",
                ABORT_ACK_TIMEOUT
            ),
        }
    }

    /// Drop events the worker sent without being asked.
    fn drain_stale(&mut self) -> KinetixResult<()> {
        let mut dropped = 0;
        while self.worker.try_recv()?.is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "discarded stale worker events");
        }
        Ok(())
    }
}

fn worker_gone() -> KinetixError {
    KinetixError::Encode("encoder worker exited unexpectedly".into())
}

async fn pause(delay: StdDuration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}

/// Resample a captured frame to the encoder size.
fn scale_frame(frame: FrameBuffer, width: u32, height: u32) -> KinetixResult<FrameBuffer> {
    if frame.width == width && frame.height == height {
        return Ok(frame);
    }
    let (src_w, src_h) = (frame.width, frame.height);
    let image = image::RgbaImage::from_raw(src_w, src_h, frame.data).ok_or_else(|| {
        KinetixError::Render(format!("captured frame does not match {}x{}", src_w, src_h))
    })?;
    let resized =
        image::imageops::resize(&image, width, height, image::imageops::FilterType::Triangle);
    Ok(FrameBuffer {
        data: resized.into_raw(),
        width,
        height,
        format: PixelFormat::Rgba8,
    })
}
