// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};

/// Stamps are laid out as if the shorter image side were this many inches
pub const STAMP_REFERENCE_INCHES: f32 = 4.0;

/// Typographic points per inch
pub const POINTS_PER_INCH: f32 = 72.0;

/// Margin between the stamp block and the image edges, in points
pub const STAMP_MARGIN_PT: f32 = 8.0;

/// Extra leading added to the font size between stamp lines, in points
pub const STAMP_LINE_GAP_PT: f32 = 4.0;

/// Default stamp font size, in points
pub const DEFAULT_STAMP_FONT_PT: u32 = 12;

/// Crop candidates whose denominator falls below this are rejected
pub const DEGENERATE_DENOMINATOR: f64 = 1.0e-14;

/// Longest side of the inline preview handed back to a calling app
pub const INLINE_PREVIEW_MAX_SIDE: u32 = 128;

/// Extra thumbnail subsampling applied on top of the display ratio
pub const THUMBNAIL_DECODE_FACTOR: u32 = 4;

/// Further subsampling when no thumbnail animation is shown
pub const THUMBNAIL_NO_ANIMATION_FACTOR: u32 = 4;

/// Denominator used for the GPS image direction rational (two decimals)
pub const HEADING_DENOMINATOR: u32 = 100;

/// Reference unit written next to the image direction ("M" = magnetic north)
pub const HEADING_REFERENCE: &str = "M";

/// File extension used for compressed stills
pub const JPEG_EXTENSION: &str = "jpg";

/// File extension used for raw stills
pub const DNG_EXTENSION: &str = "dng";

/// JPEG quality for re-encoded photos
///
/// The presets map the user-facing choices onto a numeric quality;
/// `Custom` carries a value from 0 to 100 as given by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
    /// Caller-chosen quality, 0-100
    Custom(u8),
}

impl EncodingQuality {
    /// Get all preset variants for UI iteration; `Custom` is not a preset
    pub const ALL: [EncodingQuality; 4] = [
        EncodingQuality::Low,
        EncodingQuality::Medium,
        EncodingQuality::High,
        EncodingQuality::Maximum,
    ];

    /// Get JPEG quality value for the encoder (1-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            // The encoder's scale starts at 1
            EncodingQuality::Custom(quality) => (*quality).clamp(1, 100),
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            EncodingQuality::Low => "Low",
            EncodingQuality::Medium => "Medium",
            EncodingQuality::High => "High",
            EncodingQuality::Maximum => "Maximum",
            EncodingQuality::Custom(_) => "Custom",
        }
    }
}

/// Convert a size in points to pixels for an image whose shorter side is `shorter_side`
///
/// The shorter side is treated as [`STAMP_REFERENCE_INCHES`] at
/// [`POINTS_PER_INCH`], so stamps keep the same relative size regardless of
/// photo resolution.
pub fn points_to_pixels(points: f32, shorter_side: u32) -> u32 {
    let scale = shorter_side as f32 / (POINTS_PER_INCH * STAMP_REFERENCE_INCHES);
    (points * scale + 0.5) as u32
}
