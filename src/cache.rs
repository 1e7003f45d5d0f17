//! Invalidation hook for the external wear-prediction cache.
//!
//! Predictions are derived from component hours, so any write that changes a
//! bike's components invalidates before the transaction starts and again
//! after it commits. Readers can then only observe stale predictions for the
//! duration of the write itself.

use std::sync::Mutex;

use uuid::Uuid;

/// Receiver of cache invalidations.
pub trait PredictionCache {
    /// Drop cached predictions for a bike, or for every bike of the user when `bike_id` is `None`.
    fn invalidate(&self, user_id: Uuid, bike_id: Option<Uuid>);
}

/// Cache hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPredictionCache;

impl PredictionCache for NoopPredictionCache {
    fn invalidate(&self, _user_id: Uuid, _bike_id: Option<Uuid>) {}
}

/// Cache hook that records every invalidation, in order.
#[derive(Debug, Default)]
pub struct RecordingPredictionCache {
    calls: Mutex<Vec<(Uuid, Option<Uuid>)>>,
}

impl RecordingPredictionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidations seen so far.
    pub fn calls(&self) -> Vec<(Uuid, Option<Uuid>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

impl PredictionCache for RecordingPredictionCache {
    fn invalidate(&self, user_id: Uuid, bike_id: Option<Uuid>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((user_id, bike_id));
        }
    }
}
