// SPDX-License-Identifier: GPL-3.0-only

//! Thread-safe in-memory application state

use super::{ApplicationState, IntentResult, Notice};
use crate::storage::Destination;
use image::RgbImage;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Point-in-time copy of everything recorded by [`SharedAppState`]
#[derive(Debug, Clone, Default)]
pub struct AppSnapshot {
    /// Saves currently between `on_save_start` and `on_save_end`
    pub saves_in_progress: usize,
    pub saves_started: usize,
    pub saves_finished: usize,
    pub last_saved_image: Option<Destination>,
    pub last_saved_raw: Option<Destination>,
    /// Every destination recorded as last saved, in order (images and raws)
    pub saved_history: Vec<Destination>,
    pub notices: Vec<Notice>,
    pub intent_results: Vec<IntentResult>,
}

/// [`ApplicationState`] that records side effects and forwards thumbnails
///
/// Thumbnails are sent over a channel; the receiving end belongs to whatever
/// thread presents them.
pub struct SharedAppState {
    inner: Mutex<AppSnapshot>,
    thumbnails: Sender<RgbImage>,
    display_width: Option<u32>,
}

impl SharedAppState {
    /// Create the state and the receiver the presentation thread reads thumbnails from
    pub fn new(display_width: Option<u32>) -> (Self, Receiver<RgbImage>) {
        let (thumbnails, receiver) = mpsc::channel();
        (
            Self {
                inner: Mutex::new(AppSnapshot::default()),
                thumbnails,
                display_width,
            },
            receiver,
        )
    }

    pub fn snapshot(&self) -> AppSnapshot {
        self.lock().clone()
    }

    pub fn is_saving(&self) -> bool {
        self.lock().saves_in_progress > 0
    }

    fn lock(&self) -> MutexGuard<'_, AppSnapshot> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ApplicationState for SharedAppState {
    fn on_save_start(&self) {
        let mut state = self.lock();
        state.saves_in_progress += 1;
        state.saves_started += 1;
    }

    fn on_save_end(&self) {
        let mut state = self.lock();
        state.saves_in_progress = state.saves_in_progress.saturating_sub(1);
        state.saves_finished += 1;
    }

    fn set_last_saved_image(&self, destination: Destination) {
        debug!(destination = %destination, "Last saved image updated");
        let mut state = self.lock();
        state.saved_history.push(destination.clone());
        state.last_saved_image = Some(destination);
    }

    fn clear_last_saved_image(&self) {
        self.lock().last_saved_image = None;
    }

    fn set_last_saved_raw(&self, destination: Destination) {
        debug!(destination = %destination, "Last saved raw updated");
        let mut state = self.lock();
        state.saved_history.push(destination.clone());
        state.last_saved_raw = Some(destination);
    }

    fn clear_last_saved_raw(&self) {
        self.lock().last_saved_raw = None;
    }

    fn deliver_thumbnail(&self, thumbnail: RgbImage) {
        if self.thumbnails.send(thumbnail).is_err() {
            debug!("Thumbnail receiver gone, dropping thumbnail");
        }
    }

    fn deliver_intent_result(&self, result: IntentResult) {
        self.lock().intent_results.push(result);
    }

    fn show_notice(&self, notice: Notice) {
        warn!(%notice, "Save notice");
        self.lock().notices.push(notice);
    }

    fn display_width(&self) -> Option<u32> {
        self.display_width
    }
}
