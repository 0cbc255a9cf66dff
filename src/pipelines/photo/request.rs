// SPDX-License-Identifier: GPL-3.0-only

//! Save requests and finished artifacts
//!
//! A [`SaveRequest`] is built once by the capture callback and then moved into
//! the scheduler; nothing downstream mutates it.

use super::raw::{RawEncoder, SensorBuffer};
use crate::constants::{DEFAULT_STAMP_FONT_PT, EncodingQuality};
use crate::storage::{Destination, MediaUri};
use chrono::{DateTime, Local};
use image::Rgb;
use std::fmt;

/// One unit of work for the save scheduler
pub enum SaveRequest {
    /// Compressed still bytes to be finished and persisted
    Raster(RasterRequest),
    /// Raw sensor frame to be written to a raw container
    Raw(RawRequest),
}

impl SaveRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            SaveRequest::Raster(_) => "raster",
            SaveRequest::Raw(_) => "raw",
        }
    }
}

impl fmt::Debug for SaveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveRequest::Raster(request) => f.debug_tuple("Raster").field(request).finish(),
            SaveRequest::Raw(request) => f
                .debug_struct("Raw")
                .field("width", &request.buffer.width)
                .field("height", &request.buffer.height)
                .field("timestamp", &request.timestamp)
                .finish(),
        }
    }
}

/// What happens to the finished photo
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveIntent {
    /// Normal save through the storage sink
    #[default]
    Persist,
    /// Another app asked for a capture; with no URI an inline preview is returned
    ReturnToCaller { uri: Option<MediaUri> },
}

/// Which capture backend produced the bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureBackend {
    #[default]
    Legacy,
    /// Newer backend whose GPS timestamps need fixing up when geotagging
    Modern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StampStyle {
    /// Glyphs only
    Plain,
    /// Glyphs over a translucent dark box
    #[default]
    Shadowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// `yyyy/mm/dd`
    YearMonthDay,
    /// `dd/mm/yyyy`
    DayMonthYear,
    /// `mm/dd/yyyy`
    MonthDayYear,
    #[default]
    LocaleDefault,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    Hour12,
    Hour24,
    #[default]
    LocaleDefault,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpsFormat {
    /// Degrees, minutes and seconds
    #[default]
    Dms,
    /// Signed decimal degrees
    Decimal,
    None,
}

/// Text overlay settings
#[derive(Debug, Clone, PartialEq)]
pub struct StampConfig {
    /// Stamp date, time and location lines
    pub datetime: bool,
    /// Free text drawn as the top line; empty for none
    pub custom_text: String,
    /// Font size in points
    pub font_size: u32,
    pub color: Rgb<u8>,
    pub style: StampStyle,
    pub date_format: DateFormat,
    pub time_format: TimeFormat,
    pub gps_format: GpsFormat,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            datetime: false,
            custom_text: String::new(),
            font_size: DEFAULT_STAMP_FONT_PT,
            color: Rgb([255, 255, 255]),
            style: StampStyle::default(),
            date_format: DateFormat::default(),
            time_format: TimeFormat::default(),
            gps_format: GpsFormat::default(),
        }
    }
}

impl StampConfig {
    /// Whether anything would be drawn at all
    pub fn is_active(&self) -> bool {
        self.datetime || !self.custom_text.is_empty()
    }
}

/// Location fix attached to a capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

/// Compressed capture to be finished
#[derive(Debug, Clone)]
pub struct RasterRequest {
    /// Compressed bytes as delivered by the camera
    pub data: Vec<u8>,
    pub intent: SaveIntent,
    pub backend: CaptureBackend,
    pub quality: EncodingQuality,
    /// Measured tilt in degrees; `None` disables stabilization
    pub stabilize_angle: Option<f64>,
    /// Front camera captures rotate the other way
    pub front_facing: bool,
    pub timestamp: DateTime<Local>,
    pub stamp: StampConfig,
    pub location: Option<GeoLocation>,
    /// Compass heading in radians
    pub heading: Option<f64>,
    /// The UI animates the thumbnail; controls how coarse the thumbnail may be
    pub thumbnail_animation: bool,
}

impl RasterRequest {
    /// Request with every enhancement disabled
    pub fn new(data: Vec<u8>, timestamp: DateTime<Local>) -> Self {
        Self {
            data,
            intent: SaveIntent::Persist,
            backend: CaptureBackend::Legacy,
            quality: EncodingQuality::default(),
            stabilize_angle: None,
            front_facing: false,
            timestamp,
            stamp: StampConfig::default(),
            location: None,
            heading: None,
            thumbnail_animation: true,
        }
    }

    /// GPS timestamps written by the modern backend are wrong when a location is attached
    pub fn needs_gps_timestamp_fix(&self) -> bool {
        self.backend == CaptureBackend::Modern && self.location.is_some()
    }
}

/// Raw sensor frame plus the encoder that knows how to store it
pub struct RawRequest {
    pub buffer: SensorBuffer,
    pub encoder: Box<dyn RawEncoder>,
    pub timestamp: DateTime<Local>,
}

/// Result of a successful finishing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedArtifact {
    /// Where the photo ended up; `None` for an inline hand-back
    pub destination: Option<Destination>,
    pub bytes_written: u64,
    pub metadata_rewritten: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gps_fix_truth_table() {
        let location = GeoLocation {
            latitude: 51.5,
            longitude: -0.12,
            altitude: None,
        };
        let cases = [
            (CaptureBackend::Modern, Some(location), true),
            (CaptureBackend::Modern, None, false),
            (CaptureBackend::Legacy, Some(location), false),
            (CaptureBackend::Legacy, None, false),
        ];
        for (backend, location, expected) in cases {
            let mut request = RasterRequest::new(Vec::new(), Local::now());
            request.backend = backend;
            request.location = location;
            assert_eq!(request.needs_gps_timestamp_fix(), expected, "{:?}", backend);
        }
    }

    #[test]
    fn empty_stamp_is_inactive() {
        let mut stamp = StampConfig::default();
        assert!(!stamp.is_active());
        stamp.custom_text = "hello".into();
        assert!(stamp.is_active());
    }
}
