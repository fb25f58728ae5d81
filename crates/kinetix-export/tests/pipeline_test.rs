use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use kinetix_core::{Duration, ExportMode, KinetixError, OutputFormat};
use kinetix_engine::{Clock, Engine, ManualClock};
use kinetix_export::{
    AbortController, AbortSignal, ExportOptions, ExportPipeline, ExportStatus, WorkerEvent,
    WorkerHandle, WorkerRequest,
};
use kinetix_render::{Canvas, TextRenderer};
use kinetix_scene::factory::{self, boxed};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn engine(clock: impl Clock + 'static) -> Engine {
    let canvas = Canvas::with_text_renderer(32, 18, Arc::new(TextRenderer::new()));
    let mut engine = Engine::new(Some(canvas)).unwrap().with_clock(clock);
    engine.resize(32, 18);
    engine.edit_scene(|s| s.add(boxed(factory::heading(s))));
    engine
}

fn options(seconds: f64, fps: f64) -> ExportOptions {
    let mut options = ExportOptions::new(Duration::from_seconds(seconds));
    options.fps = fps;
    options.format = OutputFormat::Gif;
    options.frame_yield = StdDuration::ZERO;
    options
}

/// Stand-in encoder: acknowledges every frame, optionally failing on frame
/// `fail_at` (1-based), and answers FINALIZE with a fixed payload. Returns
/// every request it saw once the pipeline is dropped.
fn fake_worker(fail_at: Option<usize>) -> (WorkerHandle, JoinHandle<Vec<WorkerRequest>>) {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut seen = Vec::new();
        let mut frames = 0;
        while let Some(request) = request_rx.recv().await {
            let reply = match &request {
                WorkerRequest::Config(_) => Some(WorkerEvent::log("configured")),
                WorkerRequest::EncodeFrame(_) => {
                    frames += 1;
                    if Some(frames) == fail_at {
                        Some(WorkerEvent::error("disk full"))
                    } else {
                        Some(WorkerEvent::FrameDone)
                    }
                }
                WorkerRequest::Finalize => Some(WorkerEvent::Complete {
                    data: vec![1, 2, 3],
                }),
                WorkerRequest::Abort => Some(WorkerEvent::Aborted),
            };
            if let Some(event) = reply {
                let _ = event_tx.send(event);
            }
            seen.push(request);
        }
        seen
    });
    (WorkerHandle::from_channels(request_tx, event_rx), task)
}

/// Encoder that works through a backlog. Before answering a request it pulls
/// in everything already queued, so it sees every frame the pipeline has in
/// flight; the task returns the largest such count. On ABORT it first flushes
/// `late_done` FRAME_DONE events and an ERROR for work it had accepted.
fn backlogged_worker(late_done: usize) -> (WorkerHandle, JoinHandle<usize>) {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut queue = VecDeque::new();
        let mut max_in_flight = 0;
        loop {
            if queue.is_empty() {
                match request_rx.recv().await {
                    Some(request) => queue.push_back(request),
                    None => break,
                }
            }
            while let Ok(request) = request_rx.try_recv() {
                queue.push_back(request);
            }
            let in_flight = queue
                .iter()
                .filter(|r| matches!(r, WorkerRequest::EncodeFrame(_)))
                .count();
            max_in_flight = max_in_flight.max(in_flight);

            let Some(request) = queue.pop_front() else {
                continue;
            };
            let replies = match request {
                WorkerRequest::Config(_) => vec![WorkerEvent::log("configured")],
                WorkerRequest::EncodeFrame(_) => vec![WorkerEvent::FrameDone],
                WorkerRequest::Finalize => vec![WorkerEvent::Complete { data: vec![7] }],
                WorkerRequest::Abort => {
                    let mut late = vec![WorkerEvent::FrameDone; late_done];
                    late.push(WorkerEvent::error("late failure"));
                    late.push(WorkerEvent::Aborted);
                    late
                }
            };
            tokio::task::yield_now().await;
            for event in replies {
                let _ = event_tx.send(event);
            }
        }
        max_in_flight
    });
    (WorkerHandle::from_channels(request_tx, event_rx), task)
}

fn frame_timestamps(requests: &[WorkerRequest]) -> Vec<f64> {
    requests
        .iter()
        .filter_map(|r| match r {
            WorkerRequest::EncodeFrame(f) => Some(f.timestamp.as_seconds()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_offline_export_submits_every_frame_in_order() {
    let (worker, task) = fake_worker(None);
    let mut pipeline = ExportPipeline::new(worker);
    let mut engine = engine(ManualClock::new());
    let mut reported = Vec::new();

    let output = pipeline
        .export(
            &mut engine,
            &options(2.0, 30.0),
            |p| reported.push(p),
            &AbortSignal::never(),
        )
        .await
        .unwrap();

    assert_eq!(output.frames, 60);
    assert_eq!(output.data, vec![1, 2, 3]);
    assert_eq!(pipeline.status(), ExportStatus::Complete);
    assert_eq!(pipeline.progress(), 100.0);
    assert_eq!(engine.current_time(), 0.0);
    assert!(engine.overlay_enabled());

    // Capture progress tops out at 90 before the encoder finishes.
    assert_eq!(reported.last(), Some(&100.0));
    let capture_max = reported[..reported.len() - 1]
        .iter()
        .cloned()
        .fold(0.0, f64::max);
    assert!((capture_max - 90.0).abs() < 1e-9);
    assert!(pipeline.logs().any(|l| l == "[Worker] configured"));

    drop(pipeline);
    let requests = task.await.unwrap();
    assert!(matches!(requests.first(), Some(WorkerRequest::Config(c)) if c.width == 32 && c.fps == 30.0));
    assert!(matches!(requests.last(), Some(WorkerRequest::Finalize)));

    let stamps = frame_timestamps(&requests);
    assert_eq!(stamps.len(), 60);
    for (i, pair) in stamps.windows(2).enumerate() {
        assert!(pair[1] > pair[0], "frame {} is not after frame {}", i + 1, i);
        assert!((pair[1] - pair[0] - 1.0 / 30.0).abs() < 1e-9);
    }

    let key_frames: Vec<usize> = requests
        .iter()
        .filter_map(|r| match r {
            WorkerRequest::EncodeFrame(f) => Some(f.key_frame),
            _ => None,
        })
        .enumerate()
        .filter(|(_, key)| *key)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(key_frames, vec![0, 30]);
}

#[tokio::test]
async fn test_capture_stalls_without_credits() {
    // Nobody answers, so after the initial credits are spent capture must wait.
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let (_event_tx, event_rx) = mpsc::unbounded_channel::<WorkerEvent>();
    let mut pipeline = ExportPipeline::new(WorkerHandle::from_channels(request_tx, event_rx));
    let mut engine = engine(ManualClock::new());

    let result = tokio::time::timeout(
        StdDuration::from_millis(200),
        pipeline.export(&mut engine, &options(2.0, 30.0), |_| {}, &AbortSignal::never()),
    )
    .await;
    assert!(result.is_err(), "export should still be waiting for credits");
    assert!(engine.overlay_enabled());

    let mut frames = 0;
    let mut finalized = false;
    while let Ok(request) = request_rx.try_recv() {
        match request {
            WorkerRequest::EncodeFrame(_) => frames += 1,
            WorkerRequest::Finalize => finalized = true,
            _ => {}
        }
    }
    assert_eq!(frames, 3);
    assert!(!finalized);
}

#[tokio::test]
async fn test_cancel_rejects_and_never_finalizes() {
    let (worker, task) = fake_worker(None);
    let mut pipeline = ExportPipeline::new(worker);
    let mut engine = engine(ManualClock::new());
    let controller = AbortController::new();
    let signal = controller.signal();

    let result = pipeline
        .export(
            &mut engine,
            &options(2.0, 30.0),
            |p| {
                if p >= 30.0 {
                    controller.abort();
                }
            },
            &signal,
        )
        .await;

    assert!(matches!(result, Err(KinetixError::Cancelled)));
    assert_eq!(pipeline.status(), ExportStatus::Idle);
    assert!(!engine.is_playing());

    drop(pipeline);
    let requests = task.await.unwrap();
    assert!(!requests.iter().any(|r| matches!(r, WorkerRequest::Finalize)));
    assert!(matches!(requests.last(), Some(WorkerRequest::Abort)));
    let frames = frame_timestamps(&requests).len();
    assert!(frames >= 20 && frames < 60, "stopped after {} frames", frames);
}

#[tokio::test]
async fn test_late_events_of_cancelled_export_do_not_leak() {
    let (worker, task) = backlogged_worker(5);
    let mut pipeline = ExportPipeline::new(worker);
    let mut engine = engine(ManualClock::new());
    let options = options(2.0, 30.0);
    let controller = AbortController::new();
    let signal = controller.signal();

    let first = pipeline
        .export(
            &mut engine,
            &options,
            |p| {
                if p >= 30.0 {
                    controller.abort();
                }
            },
            &signal,
        )
        .await;
    assert!(matches!(first, Err(KinetixError::Cancelled)));
    assert!(pipeline.logs().any(|l| l == "Export cancelled"));

    let second = pipeline
        .export(&mut engine, &options, |_| {}, &AbortSignal::never())
        .await
        .unwrap();
    assert_eq!(second.frames, 60);
    assert_eq!(second.data, vec![7]);
    assert_eq!(pipeline.status(), ExportStatus::Complete);

    drop(pipeline);
    let max_in_flight = task.await.unwrap();
    assert!(max_in_flight >= 1);
    assert!(
        max_in_flight <= options.initial_credits as usize,
        "{} frames in flight with {} credits",
        max_in_flight,
        options.initial_credits
    );
}

#[tokio::test]
async fn test_abandoned_export_is_aborted_before_the_next() {
    let (worker, task) = fake_worker(None);
    let mut pipeline = ExportPipeline::new(worker);
    let mut engine = engine(ManualClock::new());
    // A zero timeout polls the export once, then drops it mid-capture.
    let abandoned = tokio::time::timeout(
        StdDuration::ZERO,
        pipeline.export(&mut engine, &options(2.0, 30.0), |_| {}, &AbortSignal::never()),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(pipeline.status(), ExportStatus::Rendering);

    pipeline
        .export(&mut engine, &options(0.5, 10.0), |_| {}, &AbortSignal::never())
        .await
        .unwrap();

    drop(pipeline);
    let requests = task.await.unwrap();
    let configs: Vec<usize> = requests
        .iter()
        .enumerate()
        .filter(|(_, r)| matches!(r, WorkerRequest::Config(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(configs.len(), 2);
    assert!(matches!(requests[configs[1] - 1], WorkerRequest::Abort));
}

#[tokio::test]
async fn test_encoder_error_moves_to_error_then_reset() {
    let (worker, task) = fake_worker(Some(5));
    let mut pipeline = ExportPipeline::new(worker);
    let mut engine = engine(ManualClock::new());

    let result = pipeline
        .export(&mut engine, &options(2.0, 30.0), |_| {}, &AbortSignal::never())
        .await;

    match result {
        Err(KinetixError::Encode(message)) => assert_eq!(message, "disk full"),
        other => panic!("expected encode error, got {:?}", other),
    }
    assert_eq!(pipeline.status(), ExportStatus::Error);
    assert!(pipeline.logs().any(|l| l.starts_with("[Error]") && l.contains("disk full")));

    pipeline.reset();
    assert_eq!(pipeline.status(), ExportStatus::Idle);

    drop(pipeline);
    let requests = task.await.unwrap();
    assert!(!requests.iter().any(|r| matches!(r, WorkerRequest::Finalize)));
    assert!(frame_timestamps(&requests).len() < 60);
}

/// Advances 100 ms every time it is read.
struct SteppingClock(AtomicU64);

impl Clock for SteppingClock {
    fn now_ms(&self) -> f64 {
        self.0.fetch_add(1, Ordering::SeqCst) as f64 * 100.0
    }
}

#[tokio::test]
async fn test_realtime_export_follows_playback() {
    let (worker, task) = fake_worker(None);
    let mut pipeline = ExportPipeline::new(worker);
    let mut engine = engine(SteppingClock(AtomicU64::new(0)));
    assert!(engine.is_looping());

    let mut options = options(1.0, 30.0);
    options.mode = ExportMode::Realtime;
    let output = pipeline
        .export(&mut engine, &options, |_| {}, &AbortSignal::never())
        .await
        .unwrap();

    assert_eq!(pipeline.status(), ExportStatus::Complete);
    assert!(engine.is_looping());
    assert!(!engine.is_playing());
    assert!(engine.current_time() >= 1000.0);

    drop(pipeline);
    let requests = task.await.unwrap();
    let stamps = frame_timestamps(&requests);
    assert_eq!(stamps.len() as u64, output.frames);
    assert_eq!(stamps[0], 0.0);
    assert!(stamps.windows(2).all(|w| w[1] >= w[0]));
    assert!(*stamps.last().unwrap() >= 1.0);
}

#[tokio::test]
async fn test_realtime_apng_is_rejected() {
    let (worker, _task) = fake_worker(None);
    let mut pipeline = ExportPipeline::new(worker);
    let mut engine = engine(ManualClock::new());
    let mut options = options(1.0, 30.0);
    options.mode = ExportMode::Realtime;
    options.format = OutputFormat::Apng;

    let result = pipeline
        .export(&mut engine, &options, |_| {}, &AbortSignal::never())
        .await;
    assert!(matches!(result, Err(KinetixError::Unsupported(_))));
    assert_eq!(pipeline.status(), ExportStatus::Idle);
}

#[tokio::test]
async fn test_gif_export_with_builtin_encoder() {
    let mut pipeline = ExportPipeline::spawn().unwrap();
    let mut engine = engine(ManualClock::new());
    let mut options = options(0.5, 10.0);
    options.quality_scale = 0.5;

    let output = pipeline
        .export(&mut engine, &options, |_| {}, &AbortSignal::never())
        .await
        .unwrap();

    assert_eq!((output.width, output.height), (16, 10));
    assert_eq!(output.frames, 5);
    assert_eq!(output.mime_type(), "image/gif");
    assert_eq!(&output.data[..6], b"GIF89a");
    pipeline.shutdown();
}
