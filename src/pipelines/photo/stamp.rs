// SPDX-License-Identifier: GPL-3.0-only

//! Photo stamps: date, time, location, heading and custom text
//!
//! Lines are right-aligned and stacked bottom-up from the lower right corner.
//! Sizes are given in points and scaled so the shorter image side counts as
//! four inches, which keeps stamps visually identical across resolutions.

use super::request::{DateFormat, GeoLocation, GpsFormat, StampConfig, StampStyle, TimeFormat};
use crate::constants::{STAMP_LINE_GAP_PT, STAMP_MARGIN_PT, points_to_pixels};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use chrono::{DateTime, Local};
use image::RgbImage;
use imageproc::drawing::draw_text_mut;
use std::path::PathBuf;
use tracing::{debug, info};

/// Per-capture values the stamp text is built from
#[derive(Debug, Clone, Copy)]
pub struct StampContext {
    pub timestamp: DateTime<Local>,
    pub location: Option<GeoLocation>,
    /// Compass heading in radians
    pub heading: Option<f64>,
}

/// Pixel sizes derived from the image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampMetrics {
    pub font_px: u32,
    pub offset: u32,
    pub line_step: u32,
}

impl StampMetrics {
    pub fn new(width: u32, height: u32, font_size_pt: u32) -> Self {
        let shorter = width.min(height);
        Self {
            font_px: points_to_pixels(font_size_pt as f32, shorter),
            offset: points_to_pixels(STAMP_MARGIN_PT, shorter),
            line_step: points_to_pixels(font_size_pt as f32 + STAMP_LINE_GAP_PT, shorter),
        }
    }
}

/// Load the first font from `candidates` that parses
pub fn load_font(candidates: &[PathBuf]) -> Option<FontVec> {
    for path in candidates {
        if let Ok(font_data) = std::fs::read(path)
            && let Ok(font) = FontVec::try_from_vec(font_data)
        {
            info!(path = %path.display(), "Loaded stamp font");
            return Some(font);
        }
    }
    debug!("No stamp font found");
    None
}

/// Text of each stamp line, bottom line first
///
/// Every entry consumes one line step. The date/time entry is always present
/// when date stamping is on, even if it has no text; the location line is
/// only present when it has text.
pub fn stamp_lines(config: &StampConfig, ctx: &StampContext) -> Vec<Option<String>> {
    let mut lines = Vec::new();

    if config.datetime {
        let date = format_date(&ctx.timestamp, config.date_format);
        let time = format_time(&ctx.timestamp, config.time_format);
        let datetime = match (date.is_empty(), time.is_empty()) {
            (false, false) => format!("{} {}", date, time),
            (false, true) => date,
            (true, false) => time,
            (true, true) => String::new(),
        };
        lines.push((!datetime.is_empty()).then_some(datetime));

        let gps = location_line(config.gps_format, ctx);
        if !gps.is_empty() {
            lines.push(Some(gps));
        }
    }

    if !config.custom_text.is_empty() {
        lines.push(Some(config.custom_text.clone()));
    }

    lines
}

fn format_date(timestamp: &DateTime<Local>, format: DateFormat) -> String {
    let pattern = match format {
        DateFormat::YearMonthDay => "%Y/%m/%d",
        DateFormat::DayMonthYear => "%d/%m/%Y",
        DateFormat::MonthDayYear => "%m/%d/%Y",
        DateFormat::LocaleDefault => "%b %-d, %Y",
        DateFormat::None => return String::new(),
    };
    timestamp.format(pattern).to_string()
}

fn format_time(timestamp: &DateTime<Local>, format: TimeFormat) -> String {
    let pattern = match format {
        TimeFormat::Hour12 => "%I:%M:%S %p",
        TimeFormat::Hour24 => "%H:%M:%S",
        TimeFormat::LocaleDefault => "%-I:%M:%S %p",
        TimeFormat::None => return String::new(),
    };
    timestamp.format(pattern).to_string()
}

fn location_line(format: GpsFormat, ctx: &StampContext) -> String {
    let mut parts = Vec::new();
    let coordinate: fn(f64) -> String = match format {
        GpsFormat::Dms => format_dms,
        GpsFormat::Decimal => format_decimal,
        GpsFormat::None => return String::new(),
    };

    if let Some(location) = ctx.location {
        parts.push(coordinate(location.latitude));
        parts.push(coordinate(location.longitude));
        if let Some(altitude) = location.altitude {
            parts.push(format!("{:.1}m", altitude));
        }
    }
    if let Some(heading) = ctx.heading {
        let degrees = heading.to_degrees().rem_euclid(360.0);
        parts.push(format!("{}\u{00B0}", degrees.round() as i64));
    }

    parts.join(", ")
}

/// Degrees, minutes and whole seconds, e.g. `51°30'26"`
pub fn format_dms(coordinate: f64) -> String {
    let total_seconds = (coordinate.abs() * 3600.0).round() as u64;
    let degrees = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let sign = if coordinate < 0.0 && total_seconds > 0 { "-" } else { "" };
    format!("{}{}\u{00B0}{}'{}\"", sign, degrees, minutes, seconds)
}

/// Signed decimal degrees with at most five decimals
pub fn format_decimal(coordinate: f64) -> String {
    let text = format!("{:.5}", coordinate);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "-0" => "0".to_string(),
        _ => text.to_string(),
    }
}

/// Draw the configured stamps onto `image`
///
/// Returns the number of lines actually drawn.
pub fn apply_stamp(
    image: &mut RgbImage,
    font: &FontVec,
    config: &StampConfig,
    ctx: &StampContext,
    shadow_alpha: u8,
) -> usize {
    let (width, height) = image.dimensions();
    let metrics = StampMetrics::new(width, height, config.font_size);
    let scale = PxScale::from(metrics.font_px.max(1) as f32);
    let scaled = font.as_scaled(scale);
    let ascent = scaled.ascent();
    let line_height = scaled.height();

    let right = width as f32 - metrics.offset as f32;
    let mut baseline = height as f32 - metrics.offset as f32;
    let mut drawn = 0;

    for line in stamp_lines(config, ctx) {
        if let Some(text) = line {
            let text_width: f32 = text
                .chars()
                .map(|ch| scaled.h_advance(scaled.scaled_glyph(ch).id))
                .sum();
            let left = right - text_width;
            let top = baseline - ascent;

            if config.style == StampStyle::Shadowed {
                let padding = (metrics.font_px as f32 * 0.1).max(1.0);
                darken_box(
                    image,
                    left - padding,
                    top - padding,
                    text_width + 2.0 * padding,
                    line_height + 2.0 * padding,
                    shadow_alpha,
                );
            }

            draw_text_mut(
                image,
                config.color,
                left.round() as i32,
                top.round() as i32,
                scale,
                font,
                &text,
            );
            drawn += 1;
        }
        baseline -= metrics.line_step as f32;
    }

    debug!(lines = drawn, font_px = metrics.font_px, "Stamped photo");
    drawn
}

/// Blend black over a rectangle, clipped to the image
fn darken_box(image: &mut RgbImage, x: f32, y: f32, w: f32, h: f32, alpha: u8) {
    let (width, height) = image.dimensions();
    let x0 = x.max(0.0).round() as u32;
    let y0 = y.max(0.0).round() as u32;
    let x1 = ((x + w).round().max(0.0) as u32).min(width);
    let y1 = ((y + h).round().max(0.0) as u32).min(height);
    let keep = 255 - alpha as u16;

    for py in y0..y1 {
        for px in x0..x1 {
            let pixel = image.get_pixel_mut(px, py);
            for channel in pixel.0.iter_mut() {
                *channel = ((*channel as u16 * keep) / 255) as u8;
            }
        }
    }
}
