// SPDX-License-Identifier: GPL-3.0-only

//! Photo Saver - background finishing and persistence for camera captures
//!
//! Captured frames are handed off to a single worker that optionally
//! straightens and stamps them, writes them to storage with their EXIF
//! metadata intact, and reports progress back to the application.
//!
//! # Architecture
//!
//! - [`app`]: Application-facing callbacks and a recording implementation
//! - [`pipelines`]: Scheduler, geometry, overlay, metadata and raw pipelines
//! - [`config`]: Saver configuration handling
//! - [`storage`]: Destination creation and media announcements
//!
//! # Example
//!
//! ```ignore
//! let (state, _thumbnails) = SharedAppState::new(Some(1080));
//! let storage = Arc::new(FileStorage::new("/tmp/photos"));
//! let pipeline = PhotoPipeline::new(storage, Arc::new(state), SaverConfig::default())?;
//! pipeline.save(SaveRequest::Raster(RasterRequest::new(jpeg, Local::now()))).await?;
//! ```

pub mod app;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use app::{ApplicationState, IntentResult, Notice, SharedAppState};
pub use config::SaverConfig;
pub use constants::EncodingQuality;
pub use errors::{AppError, AppResult, PhotoError};
pub use pipelines::photo::{PhotoPipeline, RasterRequest, SaveRequest, Scheduler, SubmitOutcome};
pub use storage::{Destination, FileStorage, MediaUri, StorageSink};
