// SPDX-License-Identifier: GPL-3.0-only

//! Raw finishing pipeline
//!
//! Raw frames skip decode, stabilization, stamping and metadata rewriting.
//! The request's [`RawEncoder`] writes the sensor buffer into the destination
//! stream. The DNG writer needs to seek, so [`DngRawEncoder`] assembles the
//! container in a spool file and streams it out from there rather than
//! holding a second copy of the frame in memory.

use super::request::{FinishedArtifact, RawRequest};
use crate::app::{ApplicationState, Notice};
use crate::constants::DNG_EXTENSION;
use crate::errors::{AppError, PhotoError};
use crate::storage::{Destination, MediaKind, StorageSink};
use dng::ifd::Ifd;
use dng::{DngWriter, FileType};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Color filter array layout, top-left 2x2 block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfaPattern {
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
}

impl CfaPattern {
    /// TIFF/EP color indices (0 = red, 1 = green, 2 = blue)
    fn indices(&self) -> [u8; 4] {
        match self {
            CfaPattern::Rggb => [0, 1, 1, 2],
            CfaPattern::Bggr => [2, 1, 1, 0],
            CfaPattern::Grbg => [1, 0, 2, 1],
            CfaPattern::Gbrg => [1, 2, 0, 1],
        }
    }
}

/// How samples in a [`SensorBuffer`] are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorLayout {
    /// One sample per pixel behind a color filter array
    Cfa(CfaPattern),
    /// Three interleaved samples per pixel (already demosaiced)
    LinearRgb,
}

impl SensorLayout {
    pub fn samples_per_pixel(&self) -> usize {
        match self {
            SensorLayout::Cfa(_) => 1,
            SensorLayout::LinearRgb => 3,
        }
    }
}

/// Raw sensor frame
#[derive(Debug, Clone)]
pub struct SensorBuffer {
    pub width: u32,
    pub height: u32,
    /// Significant bits per sample (at most 16)
    pub bits_per_sample: u16,
    pub layout: SensorLayout,
    /// Row-major samples
    pub data: Vec<u16>,
    pub make: Option<String>,
    pub model: Option<String>,
    /// Exposure time in seconds
    pub exposure_time: Option<f64>,
    pub iso: Option<u32>,
}

impl SensorBuffer {
    /// Expected number of samples for the declared size and layout
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.samples_per_pixel()
    }
}

/// Writes a sensor buffer into a raw container
///
/// Encoders are supplied with each raw request; the pipeline calls
/// [`RawEncoder::write_to`] once and then always calls [`RawEncoder::close`],
/// also when writing failed.
pub trait RawEncoder: Send {
    fn write_to(&mut self, sink: &mut dyn Write, buffer: &SensorBuffer) -> Result<(), PhotoError>;

    fn close(&mut self) -> Result<(), PhotoError>;
}

/// [`RawEncoder`] producing uncompressed DNG files
#[derive(Debug, Default)]
pub struct DngRawEncoder {
    software: Option<String>,
    /// Where containers are assembled; the system temp dir when unset
    spool_dir: Option<PathBuf>,
    closed: bool,
}

impl DngRawEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the Software tag
    pub fn with_software(software: impl Into<String>) -> Self {
        Self {
            software: Some(software.into()),
            ..Self::default()
        }
    }

    /// Assemble containers in `dir` instead of the system temp dir
    pub fn spool_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    /// Encode `buffer` as an in-memory DNG
    pub fn encode(&self, buffer: &SensorBuffer) -> Result<Vec<u8>, PhotoError> {
        let ifd = self.ifd(buffer)?;
        let mut encoded = Vec::new();
        DngWriter::write_dng(Cursor::new(&mut encoded), true, FileType::Dng, vec![ifd])
            .map_err(dng_failed)?;
        Ok(encoded)
    }

    /// Encode `buffer` as a DNG into `sink` through a spool file
    fn stream(&self, sink: &mut dyn Write, buffer: &SensorBuffer) -> Result<u64, PhotoError> {
        let ifd = self.ifd(buffer)?;
        let spool_dir = self.spool_dir.clone().unwrap_or_else(std::env::temp_dir);
        let spool = SpoolFile::create(&spool_dir)?;

        let mut writer = BufWriter::new(&spool.file);
        DngWriter::write_dng(&mut writer, true, FileType::Dng, vec![ifd]).map_err(dng_failed)?;
        writer.flush()?;
        drop(writer);

        let mut file = &spool.file;
        file.seek(SeekFrom::Start(0))?;
        Ok(io::copy(&mut file, sink)?)
    }

    fn ifd(&self, buffer: &SensorBuffer) -> Result<Ifd, PhotoError> {
        use dng::ifd::{IfdValue, Offsets};
        use dng::tags::ifd as tiff_tags;
        use std::sync::Arc;

        if buffer.data.len() != buffer.expected_len() {
            return Err(PhotoError::RawEncodingFailed(format!(
                "sensor buffer holds {} samples, expected {}",
                buffer.data.len(),
                buffer.expected_len()
            )));
        }
        if buffer.bits_per_sample == 0 || buffer.bits_per_sample > 16 {
            return Err(PhotoError::RawEncodingFailed(format!(
                "unsupported bit depth {}",
                buffer.bits_per_sample
            )));
        }

        let strip: Vec<u8> = buffer.data.iter().flat_map(|s| s.to_le_bytes()).collect();
        let strip_len = strip.len() as u32;
        let samples = buffer.layout.samples_per_pixel();

        let mut ifd = Ifd::default();

        // Required TIFF tags
        ifd.insert(tiff_tags::NewSubfileType, IfdValue::Long(0));
        ifd.insert(tiff_tags::ImageWidth, IfdValue::Long(buffer.width));
        ifd.insert(tiff_tags::ImageLength, IfdValue::Long(buffer.height));
        ifd.insert(
            tiff_tags::BitsPerSample,
            IfdValue::List((0..samples).map(|_| IfdValue::Short(16)).collect()),
        );
        ifd.insert(tiff_tags::Compression, IfdValue::Short(1)); // No compression
        ifd.insert(tiff_tags::SamplesPerPixel, IfdValue::Short(samples as u16));
        ifd.insert(tiff_tags::RowsPerStrip, IfdValue::Long(buffer.height)); // One strip
        ifd.insert(tiff_tags::PlanarConfiguration, IfdValue::Short(1)); // Chunky
        ifd.insert(
            tiff_tags::DNGVersion,
            IfdValue::List(vec![
                IfdValue::Byte(1),
                IfdValue::Byte(4),
                IfdValue::Byte(0),
                IfdValue::Byte(0),
            ]),
        );
        ifd.insert(
            tiff_tags::WhiteLevel,
            IfdValue::Long((1u32 << buffer.bits_per_sample) - 1),
        );

        match buffer.layout {
            SensorLayout::Cfa(pattern) => {
                ifd.insert(tiff_tags::PhotometricInterpretation, IfdValue::Short(32803)); // CFA
                ifd.insert(
                    tiff_tags::CFARepeatPatternDim,
                    IfdValue::List(vec![IfdValue::Short(2), IfdValue::Short(2)]),
                );
                ifd.insert(
                    tiff_tags::CFAPattern,
                    IfdValue::List(pattern.indices().into_iter().map(IfdValue::Byte).collect()),
                );
            }
            SensorLayout::LinearRgb => {
                ifd.insert(tiff_tags::PhotometricInterpretation, IfdValue::Short(34892)); // LinearRaw
            }
        }

        let version = env!("CARGO_PKG_VERSION");
        let software = self
            .software
            .clone()
            .unwrap_or_else(|| format!("photo-saver v{}", version));
        ifd.insert(tiff_tags::Software, IfdValue::Ascii(software));

        if let Some(make) = &buffer.make {
            ifd.insert(tiff_tags::Make, IfdValue::Ascii(make.clone()));
        }
        if let Some(model) = &buffer.model {
            ifd.insert(tiff_tags::Model, IfdValue::Ascii(model.clone()));
            let unique = match &buffer.make {
                Some(make) => format!("{} {}", make, model),
                None => model.clone(),
            };
            ifd.insert(tiff_tags::UniqueCameraModel, IfdValue::Ascii(unique));
        }

        if let Some(exposure_time) = buffer.exposure_time {
            // Microsecond precision, reduced
            let numerator = (exposure_time * 1_000_000.0).round() as u32;
            let denominator = 1_000_000u32;
            let gcd = gcd(numerator, denominator);
            ifd.insert(
                tiff_tags::ExposureTime,
                IfdValue::Rational(numerator / gcd, denominator / gcd),
            );
        }

        if let Some(iso) = buffer.iso {
            ifd.insert(
                tiff_tags::ISOSpeedRatings,
                IfdValue::Short(iso.min(65535) as u16),
            );
        }

        struct StripOffsets {
            data: Vec<u8>,
        }

        impl Offsets for StripOffsets {
            fn size(&self) -> u32 {
                self.data.len() as u32
            }

            fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
                writer.write_all(&self.data)
            }
        }

        let offsets: Arc<dyn Offsets + Send + Sync> = Arc::new(StripOffsets { data: strip });
        ifd.insert(tiff_tags::StripOffsets, IfdValue::Offsets(offsets));
        ifd.insert(tiff_tags::StripByteCounts, IfdValue::Long(strip_len));

        Ok(ifd)
    }
}

fn dng_failed(e: impl std::fmt::Debug) -> PhotoError {
    PhotoError::RawEncodingFailed(format!("DNG encoding failed: {:?}", e))
}

/// Scratch file that is deleted when dropped
struct SpoolFile {
    path: PathBuf,
    file: File,
}

impl SpoolFile {
    fn create(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("raw-{}.{}", uuid::Uuid::new_v4(), DNG_EXTENSION));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(Self { path, file })
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to delete DNG spool file");
        }
    }
}

impl RawEncoder for DngRawEncoder {
    fn write_to(&mut self, sink: &mut dyn Write, buffer: &SensorBuffer) -> Result<(), PhotoError> {
        if self.closed {
            return Err(PhotoError::RawEncodingFailed("encoder already closed".into()));
        }
        let size = self.stream(sink, buffer)?;
        debug!(size, "DNG written");
        Ok(())
    }

    fn close(&mut self) -> Result<(), PhotoError> {
        self.closed = true;
        Ok(())
    }
}

/// Calculate greatest common divisor using Euclidean algorithm
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1) // Avoid division by zero
}

/// Counts bytes passing through to the destination stream
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Persist a raw request through the storage sink
///
/// Brackets the work with `on_save_start`/`on_save_end` and records the
/// destination as last saved raw on success, clearing it on failure.
pub fn finish_raw(
    request: RawRequest,
    storage: &dyn StorageSink,
    state: &dyn ApplicationState,
) -> Result<FinishedArtifact, AppError> {
    state.on_save_start();
    let result = write_raw(request, storage);

    match &result {
        Ok(artifact) => {
            if let Some(destination) = &artifact.destination {
                announce_raw(storage, destination);
                state.set_last_saved_raw(destination.clone());
            }
            info!(bytes = artifact.bytes_written, "RAW photo saved");
        }
        Err(e) => {
            error!(error = %e, "Failed to save RAW photo");
            state.clear_last_saved_raw();
            state.show_notice(Notice::RawSaveFailed);
        }
    }

    state.on_save_end();
    result
}

fn write_raw(request: RawRequest, storage: &dyn StorageSink) -> Result<FinishedArtifact, AppError> {
    let RawRequest {
        buffer,
        mut encoder,
        timestamp,
    } = request;

    let destination = match storage.create_destination(MediaKind::Image, DNG_EXTENSION, timestamp) {
        Ok(destination) => destination,
        Err(e) => {
            close_encoder(encoder.as_mut());
            return Err(PhotoError::from(e).into());
        }
    };
    debug!(destination = %destination, "Writing RAW photo");

    let stream = match storage.open_for_write(&destination) {
        Ok(stream) => stream,
        Err(e) => {
            close_encoder(encoder.as_mut());
            return Err(PhotoError::from(e).into());
        }
    };
    let mut stream = CountingWriter {
        inner: stream,
        written: 0,
    };

    let written = encoder.write_to(&mut stream, &buffer);
    drop(buffer);
    let closed = encoder.close();
    let flushed = stream.flush();
    let bytes_written = stream.written;
    drop(stream);

    written?;
    closed?;
    flushed.map_err(PhotoError::from)?;

    Ok(FinishedArtifact {
        destination: Some(destination),
        bytes_written,
        metadata_rewritten: false,
    })
}

fn close_encoder(encoder: &mut dyn RawEncoder) {
    if let Err(e) = encoder.close() {
        warn!(error = %e, "Failed to close RAW encoder");
    }
}

fn announce_raw(storage: &dyn StorageSink, destination: &Destination) {
    match destination {
        Destination::File(path) => storage.broadcast_new_media(path, true, false, false),
        Destination::Uri(uri) => match storage.resolve_underlying_file(uri) {
            Some(file) => storage.broadcast_new_media(&file, true, false, false),
            None => storage.announce(uri, true, false),
        },
    }
}
