use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owner side of a cancellation flag.
#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Request cancellation. Observed between frames, never mid-frame.
    pub fn abort(&self) {
        self.signal.flag.store(true, Ordering::SeqCst);
    }
}

/// Read side handed to the export loop.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    /// A signal that is never aborted.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
