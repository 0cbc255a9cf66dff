// SPDX-License-Identifier: GPL-3.0-only

//! Application-side collaborator of the save pipelines
//!
//! The pipelines report everything a user can observe (save indicator, last
//! saved photo, thumbnails, warnings) through [`ApplicationState`]. Background
//! saves have no other way to report back: the caller returned long ago.

pub mod state;

pub use state::{AppSnapshot, SharedAppState};

use crate::storage::{Destination, MediaUri};
use image::RgbImage;
use std::fmt;

/// User-visible warnings raised while saving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The capture could not be decoded for stabilization; saved unrotated
    StabilizeFailed,
    /// The capture could not be decoded for stamping; saved without stamps
    StampFailed,
    /// No usable font was found; saved without stamps
    FontUnavailable,
    /// The photo could not be written
    SaveFailed,
    /// The raw photo could not be written
    RawSaveFailed,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::StabilizeFailed => "Failed to auto-stabilise photo",
            Notice::StampFailed => "Failed to stamp photo",
            Notice::FontUnavailable => "No font available for photo stamp",
            Notice::SaveFailed => "Failed to save photo",
            Notice::RawSaveFailed => "Failed to save RAW photo",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result handed back to an app that asked for a capture
#[derive(Debug, Clone)]
pub enum IntentResult {
    /// No output URI was given: a small preview is returned inline
    Inline(RgbImage),
    /// The photo was written to the URI the caller supplied
    Saved(MediaUri),
}

/// External collaborator receiving save side effects
///
/// Implementations are called from the save worker thread (or the thread of a
/// synchronous save) and must be cheap; anything that touches a UI should be
/// handed off to the presentation thread.
pub trait ApplicationState: Send + Sync {
    /// A save started; drives a save-in-progress indicator
    fn on_save_start(&self);

    /// A save finished, successfully or not
    fn on_save_end(&self);

    fn set_last_saved_image(&self, destination: Destination);

    fn clear_last_saved_image(&self);

    fn set_last_saved_raw(&self, destination: Destination);

    fn clear_last_saved_raw(&self);

    /// Hand a thumbnail of the finished photo to the presentation thread
    fn deliver_thumbnail(&self, thumbnail: RgbImage);

    /// Hand the result of a capture request back to the calling app
    fn deliver_intent_result(&self, result: IntentResult);

    /// Surface a warning to the user
    fn show_notice(&self, notice: Notice);

    /// Width of the surface thumbnails are shown on, if one is active
    fn display_width(&self) -> Option<u32>;
}
