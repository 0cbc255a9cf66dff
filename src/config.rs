// SPDX-License-Identifier: GPL-3.0-only

//! Saver configuration
//!
//! All fields are optional in the JSON file; missing ones fall back to
//! [`SaverConfig::default`].

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Fonts tried in order when no font path is configured
const SYSTEM_FONT_PATHS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaverConfig {
    /// Number of requests that may wait in the background queue (minimum 1)
    pub queue_capacity: usize,
    /// Directory for scratch files (metadata round-trips, URI indirection)
    pub scratch_dir: PathBuf,
    /// Directory used by the default file storage
    pub output_dir: PathBuf,
    /// Font used for stamps; common system fonts are tried when unset
    pub font_path: Option<PathBuf>,
    /// Longest side of the inline preview handed back to a calling app
    pub preview_max_side: u32,
    /// Opacity (0-255) of the background drawn behind shadowed stamps
    pub stamp_shadow_alpha: u8,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1,
            scratch_dir: std::env::temp_dir().join("photo-saver"),
            output_dir: default_photo_directory(),
            font_path: None,
            preview_max_side: crate::constants::INLINE_PREVIEW_MAX_SIDE,
            stamp_shadow_alpha: 64,
        }
    }
}

impl SaverConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded saver configuration");
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid saver configuration, using defaults");
                Self::default()
            }
        }
    }

    /// Queue capacity clamped to at least one slot
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Candidate font files in the order they should be tried
    pub fn font_candidates(&self) -> Vec<PathBuf> {
        match &self.font_path {
            Some(path) => vec![path.clone()],
            None => SYSTEM_FONT_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

/// Default output directory: `~/Pictures/camera`
pub fn default_photo_directory() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("camera")
}
