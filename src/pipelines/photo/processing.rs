// SPDX-License-Identifier: GPL-3.0-only

//! Raster finishing pipeline
//!
//! ```text
//! Start → [Stabilize] → [Stamp] → Resolve destination → Persist bytes
//!       → [Rewrite metadata] → Broadcast → [Intent result] → Thumbnail → Cleanup
//! ```
//!
//! The capture is decoded at full size at most once. When neither stabilization nor
//! stamping produced a raster the original bytes are written verbatim, which
//! keeps their metadata intact and avoids a lossy re-encode.

use super::encoding;
use super::metadata::{self, Fixups};
use super::raw;
use super::request::{FinishedArtifact, RasterRequest, SaveIntent, SaveRequest};
use super::stabilize::stabilize;
use super::stamp::{StampContext, apply_stamp, load_font};
use crate::app::{ApplicationState, IntentResult, Notice};
use crate::config::SaverConfig;
use crate::constants::JPEG_EXTENSION;
use crate::errors::{AppError, PhotoError};
use crate::storage::{Destination, MediaKind, StorageSink};
use ab_glyph::FontVec;
use chrono::Utc;
use image::RgbImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

/// Decode state of the capture, threaded through the stages
enum SourceRaster {
    NotDecoded,
    Decoded(RgbImage),
    Failed,
}

impl SourceRaster {
    /// Mutable raster, decoding on first use; a failed decode is not retried
    fn get_or_decode(&mut self, data: &[u8]) -> Option<&mut RgbImage> {
        if let SourceRaster::NotDecoded = self {
            *self = match encoding::decode(data) {
                Ok(image) => {
                    debug!(width = image.width(), height = image.height(), "Decoded capture");
                    SourceRaster::Decoded(image)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to decode capture");
                    SourceRaster::Failed
                }
            };
        }
        match self {
            SourceRaster::Decoded(image) => Some(image),
            _ => None,
        }
    }

    fn image(&self) -> Option<&RgbImage> {
        match self {
            SourceRaster::Decoded(image) => Some(image),
            _ => None,
        }
    }
}

/// Private file standing in for a URI destination; removed on drop
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.0.display(), error = %e, "Failed to delete temporary file");
        }
    }
}

/// Runs finishing pipelines against shared collaborators
///
/// One instance is shared by the scheduler worker and synchronous callers.
pub struct Finisher {
    storage: Arc<dyn StorageSink>,
    state: Arc<dyn ApplicationState>,
    config: SaverConfig,
    font: OnceLock<Option<FontVec>>,
}

impl Finisher {
    pub fn new(
        storage: Arc<dyn StorageSink>,
        state: Arc<dyn ApplicationState>,
        config: SaverConfig,
    ) -> Self {
        Self {
            storage,
            state,
            config,
            font: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &SaverConfig {
        &self.config
    }

    /// Dispatch a request to its pipeline
    pub fn finish(&self, request: SaveRequest) -> Result<FinishedArtifact, AppError> {
        match request {
            SaveRequest::Raster(request) => self.finish_raster(request),
            SaveRequest::Raw(request) => {
                raw::finish_raw(request, self.storage.as_ref(), self.state.as_ref())
            }
        }
    }

    /// Finish and persist a compressed capture
    pub fn finish_raster(&self, request: RasterRequest) -> Result<FinishedArtifact, AppError> {
        self.state.on_save_start();
        let result = self.run_raster(request);

        if let Err(e) = &result {
            error!(error = %e, "Failed to save photo");
            self.state.clear_last_saved_image();
            self.state.show_notice(Notice::SaveFailed);
        }

        self.state.on_save_end();
        result
    }

    fn font(&self) -> Option<&FontVec> {
        self.font
            .get_or_init(|| load_font(&self.config.font_candidates()))
            .as_ref()
    }

    fn run_raster(&self, request: RasterRequest) -> Result<FinishedArtifact, AppError> {
        let mut raster = SourceRaster::NotDecoded;

        if let Some(angle) = request.stabilize_angle {
            match raster.get_or_decode(&request.data) {
                Some(image) => *image = stabilize(image, angle, request.front_facing),
                None => self.state.show_notice(Notice::StabilizeFailed),
            }
        }

        if request.stamp.is_active() {
            match self.font() {
                None => self.state.show_notice(Notice::FontUnavailable),
                Some(font) => match raster.get_or_decode(&request.data) {
                    Some(image) => {
                        let ctx = StampContext {
                            timestamp: request.timestamp,
                            location: request.location,
                            heading: request.heading,
                        };
                        apply_stamp(image, font, &request.stamp, &ctx, self.config.stamp_shadow_alpha);
                    }
                    None => self.state.show_notice(Notice::StampFailed),
                },
            }
        }

        if matches!(request.intent, SaveIntent::ReturnToCaller { uri: None }) {
            return self.hand_back_inline(&request, raster);
        }

        // Resolve destination
        let caller_uri = match &request.intent {
            SaveIntent::ReturnToCaller { uri: Some(uri) } => Some(uri.clone()),
            _ => None,
        };
        let destination = match &caller_uri {
            Some(uri) => Destination::Uri(uri.clone()),
            None => self
                .storage
                .create_destination(MediaKind::Image, JPEG_EXTENSION, request.timestamp)
                .map_err(PhotoError::from)?,
        };

        let (target, temp) = match &destination {
            Destination::File(path) => (path.clone(), None),
            Destination::Uri(_) => {
                std::fs::create_dir_all(&self.config.scratch_dir).map_err(PhotoError::from)?;
                let path = self
                    .config
                    .scratch_dir
                    .join(format!("save-{}.{}", uuid::Uuid::new_v4(), JPEG_EXTENSION));
                (path.clone(), Some(TempFile(path)))
            }
        };
        debug!(destination = %destination, target = %target.display(), "Resolved destination");

        // Persist bytes
        let fixups = Fixups {
            heading: request.heading,
            gps_time: request.needs_gps_timestamp_fix().then(Utc::now),
        };
        let metadata_rewritten = match raster.image() {
            Some(image) => {
                // Read the original metadata before the re-encode replaces it
                let carried = metadata::read_original(&request.data, &self.config.scratch_dir);
                let encoded = encoding::encode_jpeg(image, request.quality.jpeg_quality())?;
                std::fs::write(&target, &encoded).map_err(PhotoError::from)?;

                match carried {
                    Ok(carried) => log_metadata_result(
                        metadata::transplant(&target, &carried, &fixups),
                        &target,
                    ),
                    Err(e) => {
                        warn!(error = %e, "Failed to read original metadata, skipping rewrite");
                        false
                    }
                }
            }
            None => {
                std::fs::write(&target, &request.data).map_err(PhotoError::from)?;
                if fixups.is_empty() {
                    false
                } else {
                    log_metadata_result(metadata::fix_in_place(&target, &fixups), &target)
                }
            }
        };

        let bytes_written = std::fs::metadata(&target).map_err(PhotoError::from)?.len();

        // URI destinations receive the finished temp file as the last write
        if let Destination::Uri(_) = &destination {
            self.copy_to_destination(&target, &destination)?;
        }

        match (&destination, &caller_uri) {
            (_, Some(uri)) => {
                if let Some(file) = self.storage.resolve_underlying_file(uri) {
                    self.storage
                        .broadcast_new_media(&file, true, false, metadata_rewritten);
                }
                self.state.deliver_intent_result(IntentResult::Saved(uri.clone()));
                self.state.clear_last_saved_image();
            }
            (Destination::File(path), None) => {
                self.storage
                    .broadcast_new_media(path, true, false, metadata_rewritten);
                self.state.set_last_saved_image(destination.clone());
            }
            (Destination::Uri(uri), None) => {
                match self.storage.resolve_underlying_file(uri) {
                    Some(file) => {
                        self.storage
                            .broadcast_new_media(&file, true, false, metadata_rewritten)
                    }
                    None => self.storage.announce(uri, true, false),
                }
                self.state.set_last_saved_image(destination.clone());
            }
        }

        self.deliver_thumbnail(&request, &raster, &target);

        info!(
            destination = %destination,
            bytes = bytes_written,
            metadata_rewritten,
            "Photo saved"
        );

        // Cleanup: raster and temp file are released here
        drop(raster);
        drop(temp);

        Ok(FinishedArtifact {
            destination: Some(destination),
            bytes_written,
            metadata_rewritten,
        })
    }

    fn hand_back_inline(
        &self,
        request: &RasterRequest,
        mut raster: SourceRaster,
    ) -> Result<FinishedArtifact, AppError> {
        let image = raster.get_or_decode(&request.data).ok_or_else(|| {
            PhotoError::DecodeFailed("capture could not be decoded for the inline result".into())
        })?;
        let preview = encoding::preview(image, self.config.preview_max_side);
        debug!(
            width = preview.width(),
            height = preview.height(),
            "Returning inline preview to caller"
        );
        self.state.deliver_intent_result(IntentResult::Inline(preview));
        self.state.clear_last_saved_image();

        Ok(FinishedArtifact {
            destination: None,
            bytes_written: 0,
            metadata_rewritten: false,
        })
    }

    fn copy_to_destination(&self, source: &Path, destination: &Destination) -> Result<(), PhotoError> {
        let mut input = std::fs::File::open(source)?;
        let mut output = self.storage.open_for_write(destination)?;
        let copied = std::io::copy(&mut input, &mut output)?;
        output.flush()?;
        debug!(bytes = copied, destination = %destination, "Copied photo to destination");
        Ok(())
    }

    fn deliver_thumbnail(&self, request: &RasterRequest, raster: &SourceRaster, finished: &Path) {
        let Some(display_width) = self.state.display_width() else {
            return;
        };

        // Sized from the captured width, not the cropped one
        let thumbnail = encoding::dimensions(&request.data).and_then(|(captured_width, _)| {
            let sample = encoding::thumbnail_sample_size(
                captured_width,
                display_width,
                request.thumbnail_animation,
            );
            match raster.image() {
                Some(image) => Ok(encoding::thumbnail(image, sample)),
                None => encoding::decode_thumbnail(&request.data, sample),
            }
        });

        match thumbnail {
            Ok(thumbnail) => {
                let orientation = metadata::read_orientation(finished);
                let thumbnail = encoding::rotate_for_orientation(thumbnail, orientation);
                debug!(
                    width = thumbnail.width(),
                    height = thumbnail.height(),
                    ?orientation,
                    "Delivering thumbnail"
                );
                self.state.deliver_thumbnail(thumbnail);
            }
            Err(e) => warn!(error = %e, "Failed to create thumbnail"),
        }
    }
}

fn log_metadata_result(result: Result<(), crate::errors::MetadataError>, path: &Path) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to rewrite metadata");
            false
        }
    }
}
