//! Bounded pool for CPU-bound frame work.

use std::sync::Arc;

use organtrack_engine::{
    decode_image, gesture, image_size, ImageSize, LandmarkDetector, PositionEngine, PositionResult,
};
use organtrack_protocol::Gesture;
use tokio::sync::Semaphore;

use crate::error::{RelayError, Result};

/// Runs blocking jobs with at most `workers` in flight
#[derive(Debug, Clone)]
pub struct FramePool {
    permits: Arc<Semaphore>,
}

impl FramePool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Wait for a free worker, then run `job` off the async runtime.
    ///
    /// A panic inside `job` comes back as `RelayError::Worker`.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RelayError::PoolClosed)?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });
        Ok(handle.await?)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// What one Host image produced
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The bytes were not a decodable image
    Undecodable(String),
    /// The detector found nobody
    NoSubject,
    Computed {
        size: ImageSize,
        result: PositionResult,
        gesture: Option<Gesture>,
    },
}

/// Decode, detect and place one organ
pub fn process_frame(
    engine: &PositionEngine,
    detector: &dyn LandmarkDetector,
    image: &[u8],
    organ: &str,
) -> FrameOutcome {
    let image = match decode_image(image) {
        Ok(image) => image,
        Err(e) => return FrameOutcome::Undecodable(e.to_string()),
    };
    let size = image_size(&image);

    let Some(frame) = detector.detect(&image) else {
        return FrameOutcome::NoSubject;
    };

    let result = engine.compute_organ_position(&frame, organ, size);
    let gesture = if engine.settings().gestures {
        gesture::detect(&frame)
    } else {
        None
    };

    FrameOutcome::Computed {
        size,
        result,
        gesture,
    }
}
