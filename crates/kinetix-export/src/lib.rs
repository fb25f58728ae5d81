//! # kinetix-export
//!
//! Turns an [`Engine`](kinetix_engine::Engine) timeline into a video file.
//!
//! The [`ExportPipeline`] drives the engine (frame-by-frame seeks in offline
//! mode, live playback in realtime mode), captures each frame and hands it to
//! an encoder worker running on its own thread. Workers speak a small message
//! protocol ([`WorkerRequest`] / [`WorkerEvent`]); every `FrameDone` returns
//! one credit, and capture blocks while no credits are left.

pub mod abort;
pub mod apng;
pub mod ffmpeg;
pub mod gif;
pub mod pipeline;
pub mod protocol;
pub mod sink;
pub mod worker;

pub use abort::{AbortController, AbortSignal};
pub use pipeline::{ExportOptions, ExportOutput, ExportPipeline, ExportStatus, MAX_LOG_LINES};
pub use protocol::{EncodeFrame, EncoderConfig, WorkerEvent, WorkerRequest};
pub use sink::FrameSink;
pub use worker::WorkerHandle;
