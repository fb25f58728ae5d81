//! The encoder worker: a dedicated thread that owns the active [`FrameSink`].
//!
//! The capture side only ever talks to it through a [`WorkerHandle`].

use std::thread::JoinHandle;

use kinetix_core::{KinetixError, KinetixResult};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::protocol::{WorkerEvent, WorkerRequest};
use crate::sink::{self, FrameSink};

/// Channel pair to an encoder worker.
#[derive(Debug)]
pub struct WorkerHandle {
    requests: UnboundedSender<WorkerRequest>,
    events: UnboundedReceiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Start the built-in encoder on a new thread.
    pub fn spawn() -> KinetixResult<Self> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let thread = std::thread::Builder::new()
            .name("kinetix-encoder".into())
            .spawn(move || run(request_rx, event_tx))
            .map_err(|e| KinetixError::Init(format!("failed to start encoder thread: {}", e)))?;
        Ok(Self {
            requests: request_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }

    /// Wrap an externally driven worker. Anything that reads requests and
    /// answers with events can stand in for the built-in encoder.
    pub fn from_channels(
        requests: UnboundedSender<WorkerRequest>,
        events: UnboundedReceiver<WorkerEvent>,
    ) -> Self {
        Self {
            requests,
            events,
            thread: None,
        }
    }

    pub fn send(&self, request: WorkerRequest) -> KinetixResult<()> {
        let name = request.name();
        self.requests
            .send(request)
            .map_err(|_| KinetixError::Encode(format!("encoder worker is gone ({} not delivered)", name)))
    }

    /// Next event, or `None` once the worker has exited.
    pub async fn recv(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> KinetixResult<Option<WorkerEvent>> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(KinetixError::Encode("encoder worker exited unexpectedly".into()))
            }
        }
    }

    /// Close the request channel and wait for the worker thread to exit.
    pub fn shutdown(self) {
        let WorkerHandle {
            requests, thread, ..
        } = self;
        drop(requests);
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::error!("encoder thread panicked");
            }
        }
    }
}

fn emit(events: &UnboundedSender<WorkerEvent>, event: WorkerEvent) {
    // The capture side may already have given up on this export.
    let _ = events.send(event);
}

fn run(mut requests: UnboundedReceiver<WorkerRequest>, events: UnboundedSender<WorkerEvent>) {
    let mut active: Option<Box<dyn FrameSink>> = None;
    // Set after an error; frames are dropped until the next CONFIG.
    let mut failed = false;

    while let Some(request) = requests.blocking_recv() {
        tracing::trace!("encoder received {}", request.name());
        match request {
            WorkerRequest::Config(config) => {
                active = None;
                match sink::create(&config) {
                    Ok(created) => {
                        failed = false;
                        active = Some(created);
                        emit(
                            &events,
                            WorkerEvent::log(format!(
                                "Encoder configured: {}x{} @ {}fps, {:?} ({} bps)",
                                config.width,
                                config.height,
                                config.fps,
                                config.format,
                                config.bitrate
                            )),
                        );
                    }
                    Err(e) => {
                        failed = true;
                        emit(&events, WorkerEvent::error(e.to_string()));
                    }
                }
            }
            WorkerRequest::EncodeFrame(frame) => {
                if failed {
                    continue;
                }
                let Some(current) = active.as_mut() else {
                    failed = true;
                    emit(&events, WorkerEvent::error("frame received before CONFIG"));
                    continue;
                };
                match current.push(&frame) {
                    Ok(()) => emit(&events, WorkerEvent::FrameDone),
                    Err(e) => {
                        active = None;
                        failed = true;
                        emit(&events, WorkerEvent::error(e.to_string()));
                    }
                }
            }
            WorkerRequest::Finalize => match active.take() {
                Some(current) => {
                    let frames = current.frames_written();
                    match current.finish() {
                        Ok(data) => {
                            emit(
                                &events,
                                WorkerEvent::log(format!("Finalized {} frames", frames)),
                            );
                            emit(&events, WorkerEvent::Complete { data });
                        }
                        Err(e) => emit(&events, WorkerEvent::error(e.to_string())),
                    }
                }
                None if failed => {}
                None => emit(&events, WorkerEvent::error("FINALIZE received before CONFIG")),
            },
            WorkerRequest::Abort => {
                if active.take().is_some() {
                    emit(&events, WorkerEvent::log("Encoder aborted"));
                }
                failed = false;
                emit(&events, WorkerEvent::Aborted);
            }
        }
    }
    tracing::debug!("encoder worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support;
    use kinetix_core::{FrameBuffer, OutputFormat, PixelFormat};

    async fn next(worker: &mut WorkerHandle) -> WorkerEvent {
        worker.recv().await.expect("worker exited")
    }

    #[tokio::test]
    async fn test_gif_round_through_worker() {
        let mut worker = WorkerHandle::spawn().unwrap();
        worker
            .send(WorkerRequest::Config(test_support::config(OutputFormat::Gif, 2)))
            .unwrap();
        assert!(matches!(next(&mut worker).await, WorkerEvent::Log { .. }));

        for i in 0..2 {
            worker
                .send(WorkerRequest::EncodeFrame(test_support::frame(i, 10)))
                .unwrap();
            assert_eq!(next(&mut worker).await, WorkerEvent::FrameDone);
        }

        worker.send(WorkerRequest::Finalize).unwrap();
        assert!(matches!(next(&mut worker).await, WorkerEvent::Log { .. }));
        match next(&mut worker).await {
            WorkerEvent::Complete { data } => assert_eq!(&data[..3], b"GIF"),
            other => panic!("expected COMPLETE, got {:?}", other),
        }
        worker.shutdown();
    }

    #[tokio::test]
    async fn test_frame_before_config_is_an_error() {
        let mut worker = WorkerHandle::spawn().unwrap();
        worker
            .send(WorkerRequest::EncodeFrame(test_support::frame(0, 0)))
            .unwrap();
        assert!(matches!(next(&mut worker).await, WorkerEvent::Error { .. }));
        worker.shutdown();
    }

    #[tokio::test]
    async fn test_frames_after_error_are_dropped_until_config() {
        let mut worker = WorkerHandle::spawn().unwrap();
        worker
            .send(WorkerRequest::Config(test_support::config(OutputFormat::Gif, 3)))
            .unwrap();
        assert!(matches!(next(&mut worker).await, WorkerEvent::Log { .. }));

        let mut bad = test_support::frame(0, 0);
        bad.bitmap = FrameBuffer::new(2, 2, PixelFormat::Rgba8);
        worker.send(WorkerRequest::EncodeFrame(bad)).unwrap();
        worker
            .send(WorkerRequest::EncodeFrame(test_support::frame(1, 0)))
            .unwrap();
        worker.send(WorkerRequest::Finalize).unwrap();
        worker
            .send(WorkerRequest::Config(test_support::config(OutputFormat::Gif, 3)))
            .unwrap();

        // One error, then nothing until the new CONFIG is acknowledged.
        assert!(matches!(next(&mut worker).await, WorkerEvent::Error { .. }));
        assert!(matches!(next(&mut worker).await, WorkerEvent::Log { .. }));
        worker.shutdown();
    }

    #[tokio::test]
    async fn test_abort_is_acknowledged_after_pending_frames() {
        let mut worker = WorkerHandle::spawn().unwrap();
        worker
            .send(WorkerRequest::Config(test_support::config(OutputFormat::Gif, 3)))
            .unwrap();
        worker
            .send(WorkerRequest::EncodeFrame(test_support::frame(0, 0)))
            .unwrap();
        worker.send(WorkerRequest::Abort).unwrap();

        assert!(matches!(next(&mut worker).await, WorkerEvent::Log { .. }));
        assert_eq!(next(&mut worker).await, WorkerEvent::FrameDone);
        assert_eq!(next(&mut worker).await, WorkerEvent::log("Encoder aborted"));
        assert_eq!(next(&mut worker).await, WorkerEvent::Aborted);

        // Nothing to drop, but the reply still comes.
        worker.send(WorkerRequest::Abort).unwrap();
        assert_eq!(next(&mut worker).await, WorkerEvent::Aborted);
        worker.shutdown();
    }

    #[tokio::test]
    async fn test_send_fails_once_worker_is_gone() {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::from_channels(request_tx, event_rx);
        drop(request_rx);
        assert!(worker.send(WorkerRequest::Finalize).is_err());
    }

    #[test]
    fn test_try_recv_reports_disconnect() {
        let (request_tx, _request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut worker = WorkerHandle::from_channels(request_tx, event_rx);
        assert!(matches!(worker.try_recv(), Ok(None)));
        event_tx.send(WorkerEvent::FrameDone).unwrap();
        assert_eq!(worker.try_recv().unwrap(), Some(WorkerEvent::FrameDone));
        drop(event_tx);
        assert!(worker.try_recv().is_err());
    }
}
