// SPDX-License-Identifier: GPL-3.0-only

//! Background photo finishing pipeline
//!
//! ```text
//! Producer → Scheduler (bounded FIFO) → Finisher → Storage
//!                                          │
//!                  stabilize → stamp → encode / verbatim → EXIF → notify
//! ```
//!
//! # Stages
//!
//! 1. **Scheduling**: requests are queued for a single worker, or run inline
//!    after everything queued before them has finished
//! 2. **Geometry**: optional tilt correction with an axis-aligned crop
//! 3. **Overlay**: optional date/time, location and custom text stamp
//! 4. **Persistence**: re-encode when pixels changed, otherwise write the
//!    capture bytes verbatim
//! 5. **Metadata**: original EXIF carried across re-encodes, heading and GPS
//!    time fix-ups applied in place
//!
//! Raw sensor frames take a separate path through a [`RawEncoder`].

pub mod encoding;
pub mod metadata;
pub mod processing;
pub mod raw;
pub mod request;
pub mod scheduler;
pub mod stabilize;
pub mod stamp;

pub use processing::Finisher;
pub use raw::{CfaPattern, DngRawEncoder, RawEncoder, SensorBuffer, SensorLayout};
pub use request::{
    CaptureBackend, DateFormat, FinishedArtifact, GeoLocation, GpsFormat, RasterRequest,
    RawRequest, SaveIntent, SaveRequest, StampConfig, StampStyle, TimeFormat,
};
pub use scheduler::{Scheduler, SubmitOutcome};

use crate::app::ApplicationState;
use crate::config::SaverConfig;
use crate::errors::{AppError, AppResult, PhotoError};
use crate::storage::StorageSink;
use std::sync::Arc;

/// Async front end over the [`Scheduler`]
///
/// Submissions block while the queue is full, so they run on tokio's blocking
/// pool instead of stalling the runtime.
#[derive(Clone)]
pub struct PhotoPipeline {
    scheduler: Arc<Scheduler>,
}

impl PhotoPipeline {
    /// Start a pipeline with its own worker thread
    pub fn new(
        storage: Arc<dyn StorageSink>,
        state: Arc<dyn ApplicationState>,
        config: SaverConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            scheduler: Arc::new(Scheduler::new(storage, state, config)?),
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Queue a request for background processing
    pub async fn save(&self, request: SaveRequest) -> Result<SubmitOutcome, AppError> {
        let scheduler = Arc::clone(&self.scheduler);
        tokio::task::spawn_blocking(move || scheduler.submit(request, true))
            .await
            .map_err(|e| PhotoError::SaveFailed(format!("Save task error: {}", e)))?
    }

    /// Process a request once all earlier background saves are done
    pub async fn save_now(&self, request: SaveRequest) -> Result<FinishedArtifact, AppError> {
        let scheduler = Arc::clone(&self.scheduler);
        let outcome = tokio::task::spawn_blocking(move || scheduler.submit(request, false))
            .await
            .map_err(|e| PhotoError::SaveFailed(format!("Save task error: {}", e)))??;

        match outcome {
            SubmitOutcome::Finished(artifact) => Ok(artifact),
            SubmitOutcome::Queued => Err(PhotoError::SaveFailed("Save was queued instead of run".into()).into()),
        }
    }

    /// Resolve once every accepted request has been processed
    pub async fn wait_until_done(&self) -> Result<(), AppError> {
        let scheduler = Arc::clone(&self.scheduler);
        tokio::task::spawn_blocking(move || scheduler.wait_until_done())
            .await
            .map_err(|e| PhotoError::SaveFailed(format!("Save task error: {}", e)).into())
    }
}
