// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the photo saver
//!
//! This module provides command-line functionality for:
//! - Finishing a single capture synchronously
//! - Queueing a batch of captures for background saving
//! - Writing a synthetic raw frame

use chrono::Local;
use clap::{Args, ValueEnum};
use photo_saver::app::SharedAppState;
use photo_saver::pipelines::photo::{
    CaptureBackend, CfaPattern, DngRawEncoder, GeoLocation, GpsFormat, PhotoPipeline,
    RasterRequest, RawRequest, SaveIntent, SaveRequest, SensorBuffer, SensorLayout, StampConfig,
    StampStyle,
};
use photo_saver::storage::{FileStorage, StorageSink};
use photo_saver::{EncodingQuality, SaverConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Thumbnails are sized for a display of this width
const CLI_DISPLAY_WIDTH: u32 = 1080;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum QualityArg {
    Low,
    Medium,
    High,
    Maximum,
}

impl From<QualityArg> for EncodingQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => EncodingQuality::Low,
            QualityArg::Medium => EncodingQuality::Medium,
            QualityArg::High => EncodingQuality::High,
            QualityArg::Maximum => EncodingQuality::Maximum,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GpsFormatArg {
    Dms,
    Decimal,
    None,
}

/// Finishing options shared by `finish` and `batch`
#[derive(Debug, Args)]
pub struct FinishOptions {
    /// Straighten the photo by this tilt, in degrees
    #[arg(long, allow_hyphen_values = true)]
    stabilize: Option<f64>,

    /// Capture came from the front camera
    #[arg(long)]
    front: bool,

    /// Stamp date, time and location
    #[arg(long)]
    datetime: bool,

    /// Custom stamp text
    #[arg(long)]
    text: Option<String>,

    /// Stamp font size in points
    #[arg(long)]
    font_size: Option<u32>,

    /// Draw the stamp without a background box
    #[arg(long)]
    plain: bool,

    /// How coordinates are written in the stamp
    #[arg(long, value_enum, default_value = "dms")]
    gps_format: GpsFormatArg,

    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true, requires = "longitude")]
    latitude: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true, requires = "latitude")]
    longitude: Option<f64>,

    /// Altitude in meters
    #[arg(long, allow_hyphen_values = true)]
    altitude: Option<f64>,

    /// Compass heading in degrees
    #[arg(long, allow_hyphen_values = true)]
    heading: Option<f64>,

    /// JPEG quality used when the photo is re-encoded
    #[arg(long, value_enum, default_value = "high")]
    quality: QualityArg,

    /// Exact JPEG quality from 0 to 100, overriding --quality
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    jpeg_quality: Option<u8>,

    /// Capture came from the modern camera backend
    #[arg(long)]
    modern: bool,

    /// Save through document URIs instead of plain paths
    #[arg(long)]
    document: bool,
}

impl FinishOptions {
    fn request(&self, data: Vec<u8>) -> RasterRequest {
        let mut request = RasterRequest::new(data, Local::now());
        request.intent = SaveIntent::Persist;
        request.backend = if self.modern {
            CaptureBackend::Modern
        } else {
            CaptureBackend::Legacy
        };
        request.quality = self
            .jpeg_quality
            .map_or_else(|| self.quality.into(), EncodingQuality::Custom);
        request.stabilize_angle = self.stabilize;
        request.front_facing = self.front;
        request.heading = self.heading.map(f64::to_radians);
        request.location = self
            .latitude
            .zip(self.longitude)
            .map(|(latitude, longitude)| GeoLocation {
                latitude,
                longitude,
                altitude: self.altitude,
            });

        let mut stamp = StampConfig {
            datetime: self.datetime,
            custom_text: self.text.clone().unwrap_or_default(),
            style: if self.plain {
                StampStyle::Plain
            } else {
                StampStyle::Shadowed
            },
            gps_format: match self.gps_format {
                GpsFormatArg::Dms => GpsFormat::Dms,
                GpsFormatArg::Decimal => GpsFormat::Decimal,
                GpsFormatArg::None => GpsFormat::None,
            },
            ..StampConfig::default()
        };
        if let Some(size) = self.font_size {
            stamp.font_size = size;
        }
        request.stamp = stamp;
        request
    }

    fn storage(&self, config: &SaverConfig) -> Arc<dyn StorageSink> {
        if self.document {
            Arc::new(FileStorage::with_document_uris(&config.output_dir))
        } else {
            Arc::new(FileStorage::new(&config.output_dir))
        }
    }
}

/// Load configuration and apply command-line overrides
pub fn load_config(path: Option<&Path>, output: Option<PathBuf>) -> SaverConfig {
    let mut config = match path {
        Some(path) => SaverConfig::load_or_default(path),
        None => SaverConfig::default(),
    };
    if let Some(output) = output {
        config.output_dir = output;
    }
    config
}

/// Finish one capture and wait for the result
pub fn finish(
    config: SaverConfig,
    input: PathBuf,
    options: &FinishOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(&input)?;
    let (state, thumbnails) = SharedAppState::new(Some(CLI_DISPLAY_WIDTH));
    let state = Arc::new(state);
    let pipeline = PhotoPipeline::new(options.storage(&config), state.clone(), config)?;

    let rt = tokio::runtime::Runtime::new()?;
    let artifact = rt.block_on(async {
        pipeline
            .save_now(SaveRequest::Raster(options.request(data)))
            .await
    })?;

    for notice in state.snapshot().notices {
        eprintln!("Warning: {}", notice);
    }
    if let Some(destination) = artifact.destination {
        println!("Photo saved: {}", destination);
    }
    println!(
        "  {} bytes, metadata {}",
        artifact.bytes_written,
        if artifact.metadata_rewritten {
            "rewritten"
        } else {
            "untouched"
        }
    );
    if let Ok(thumbnail) = thumbnails.try_recv() {
        println!("  thumbnail {}x{}", thumbnail.width(), thumbnail.height());
    }

    Ok(())
}

/// Queue captures in order and wait for all of them
pub fn batch(
    config: SaverConfig,
    inputs: Vec<PathBuf>,
    options: &FinishOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let (state, _thumbnails) = SharedAppState::new(None);
    let state = Arc::new(state);
    let pipeline = PhotoPipeline::new(options.storage(&config), state.clone(), config)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        for input in &inputs {
            let data = std::fs::read(input)?;
            pipeline
                .save(SaveRequest::Raster(options.request(data)))
                .await?;
            println!("Queued: {}", input.display());
        }
        pipeline.wait_until_done().await?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    let snapshot = state.snapshot();
    for notice in &snapshot.notices {
        eprintln!("Warning: {}", notice);
    }
    for destination in &snapshot.saved_history {
        println!("Photo saved: {}", destination);
    }
    println!(
        "{} of {} captures saved",
        snapshot.saved_history.len(),
        inputs.len()
    );

    Ok(())
}

/// Write a synthetic Bayer frame through the raw pipeline
pub fn write_dng(
    config: SaverConfig,
    width: u32,
    height: u32,
    bits: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let bits = bits.clamp(8, 16);
    let max = ((1u32 << bits) - 1) as f64;

    // Horizontal gradient so the frame is not uniform
    let data = (0..height)
        .flat_map(|_| (0..width).map(move |x| (x as f64 / width.max(1) as f64 * max) as u16))
        .collect();
    let buffer = SensorBuffer {
        width,
        height,
        bits_per_sample: bits,
        layout: SensorLayout::Cfa(CfaPattern::Rggb),
        data,
        make: Some("photo-saver".into()),
        model: Some("Synthetic".into()),
        exposure_time: Some(1.0 / 60.0),
        iso: Some(100),
    };

    let encoder = DngRawEncoder::with_software(format!("photo-saver {}", env!("GIT_VERSION")))
        .spool_in(&config.scratch_dir);

    let (state, _thumbnails) = SharedAppState::new(None);
    let state = Arc::new(state);
    let storage = Arc::new(FileStorage::new(&config.output_dir));
    let pipeline = PhotoPipeline::new(storage, state.clone(), config)?;

    let request = RawRequest {
        buffer,
        encoder: Box::new(encoder),
        timestamp: Local::now(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let artifact = rt.block_on(async { pipeline.save_now(SaveRequest::Raw(request)).await })?;

    if let Some(destination) = artifact.destination {
        println!("RAW photo saved: {} ({} bytes)", destination, artifact.bytes_written);
    }
    Ok(())
}
