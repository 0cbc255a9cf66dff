// SPDX-License-Identifier: GPL-3.0-only

//! EXIF carry-over and fix-ups
//!
//! Re-encoding a stabilized or stamped photo drops its EXIF block. Before the
//! re-encode, the original bytes go through a scratch file so the fields worth
//! keeping can be read with `kamadak-exif`; afterwards they are written onto
//! the finished file with `little_exif`, together with the heading, datetime
//! and GPS timestamp fix-ups.

use crate::constants::{HEADING_DENOMINATOR, HEADING_REFERENCE};
use crate::errors::MetadataError;
use chrono::{DateTime, Datelike, Timelike, Utc};
use exif::{In, Tag, Value};
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;
use std::fs::File;
use std::io::BufReader;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use tracing::{debug, warn};

/// Unsigned EXIF rational
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub denom: u32,
}

impl Rational {
    pub fn new(num: u32, denom: u32) -> Self {
        Self { num, denom }
    }
}

impl From<&exif::Rational> for Rational {
    fn from(value: &exif::Rational) -> Self {
        Self::new(value.num, value.denom)
    }
}

impl From<Rational> for uR64 {
    fn from(value: Rational) -> Self {
        uR64 {
            nominator: value.num,
            denominator: value.denom,
        }
    }
}

/// EXIF fields carried from the original capture to the finished file
///
/// Width and height are left out on purpose: cropping changes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarriedMetadata {
    pub aperture: Option<Rational>,
    pub datetime: Option<String>,
    pub exposure_time: Option<Rational>,
    pub flash: Option<u16>,
    pub focal_length: Option<Rational>,
    pub gps_altitude: Option<Rational>,
    pub gps_altitude_ref: Option<u8>,
    pub gps_datestamp: Option<String>,
    pub gps_latitude: Option<Vec<Rational>>,
    pub gps_latitude_ref: Option<String>,
    pub gps_longitude: Option<Vec<Rational>>,
    pub gps_longitude_ref: Option<String>,
    pub gps_processing_method: Option<Vec<u8>>,
    pub gps_timestamp: Option<Vec<Rational>>,
    pub iso: Option<u16>,
    pub make: Option<String>,
    pub model: Option<String>,
    /// Never `Some(0)`: an undefined orientation is not carried
    pub orientation: Option<u16>,
    pub white_balance: Option<u16>,
}

impl CarriedMetadata {
    fn from_exif(exif: &exif::Exif) -> Self {
        Self {
            aperture: first_rational(exif, Tag::FNumber),
            datetime: ascii(exif, Tag::DateTime),
            exposure_time: first_rational(exif, Tag::ExposureTime),
            flash: short(exif, Tag::Flash),
            focal_length: first_rational(exif, Tag::FocalLength),
            gps_altitude: first_rational(exif, Tag::GPSAltitude),
            gps_altitude_ref: uint(exif, Tag::GPSAltitudeRef).map(|v| v as u8),
            gps_datestamp: ascii(exif, Tag::GPSDateStamp),
            gps_latitude: rationals(exif, Tag::GPSLatitude),
            gps_latitude_ref: ascii(exif, Tag::GPSLatitudeRef),
            gps_longitude: rationals(exif, Tag::GPSLongitude),
            gps_longitude_ref: ascii(exif, Tag::GPSLongitudeRef),
            gps_processing_method: undefined(exif, Tag::GPSProcessingMethod),
            gps_timestamp: rationals(exif, Tag::GPSTimeStamp),
            iso: short(exif, Tag::PhotographicSensitivity),
            make: ascii(exif, Tag::Make),
            model: ascii(exif, Tag::Model),
            orientation: short(exif, Tag::Orientation).filter(|&o| o != 0),
            white_balance: short(exif, Tag::WhiteBalance),
        }
    }

    /// Number of fields that would be written
    pub fn field_count(&self) -> usize {
        [
            self.aperture.is_some(),
            self.datetime.is_some(),
            self.exposure_time.is_some(),
            self.flash.is_some(),
            self.focal_length.is_some(),
            self.gps_altitude.is_some(),
            self.gps_altitude_ref.is_some(),
            self.gps_datestamp.is_some(),
            self.gps_latitude.is_some(),
            self.gps_latitude_ref.is_some(),
            self.gps_longitude.is_some(),
            self.gps_longitude_ref.is_some(),
            self.gps_processing_method.is_some(),
            self.gps_timestamp.is_some(),
            self.iso.is_some(),
            self.make.is_some(),
            self.model.is_some(),
            self.orientation.is_some(),
            self.white_balance.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    fn write_into(&self, metadata: &mut Metadata) {
        if let Some(value) = self.aperture {
            metadata.set_tag(ExifTag::FNumber(vec![value.into()]));
        }
        if let Some(value) = &self.datetime {
            // 0x0132, which little_exif calls ModifyDate
            metadata.set_tag(ExifTag::ModifyDate(value.clone()));
        }
        if let Some(value) = self.exposure_time {
            metadata.set_tag(ExifTag::ExposureTime(vec![value.into()]));
        }
        if let Some(value) = self.flash {
            metadata.set_tag(ExifTag::Flash(vec![value]));
        }
        if let Some(value) = self.focal_length {
            metadata.set_tag(ExifTag::FocalLength(vec![value.into()]));
        }
        if let Some(value) = self.gps_altitude {
            metadata.set_tag(ExifTag::GPSAltitude(vec![value.into()]));
        }
        if let Some(value) = self.gps_altitude_ref {
            metadata.set_tag(ExifTag::GPSAltitudeRef(vec![value]));
        }
        if let Some(value) = &self.gps_datestamp {
            metadata.set_tag(ExifTag::GPSDateStamp(value.clone()));
        }
        if let Some(value) = &self.gps_latitude {
            metadata.set_tag(ExifTag::GPSLatitude(value.iter().map(|&r| r.into()).collect()));
        }
        if let Some(value) = &self.gps_latitude_ref {
            metadata.set_tag(ExifTag::GPSLatitudeRef(value.clone()));
        }
        if let Some(value) = &self.gps_longitude {
            metadata.set_tag(ExifTag::GPSLongitude(value.iter().map(|&r| r.into()).collect()));
        }
        if let Some(value) = &self.gps_longitude_ref {
            metadata.set_tag(ExifTag::GPSLongitudeRef(value.clone()));
        }
        if let Some(value) = &self.gps_processing_method {
            metadata.set_tag(ExifTag::GPSProcessingMethod(value.clone()));
        }
        if let Some(value) = &self.gps_timestamp {
            metadata.set_tag(ExifTag::GPSTimeStamp(value.iter().map(|&r| r.into()).collect()));
        }
        if let Some(value) = self.iso {
            metadata.set_tag(ExifTag::ISO(vec![value]));
        }
        if let Some(value) = &self.make {
            metadata.set_tag(ExifTag::Make(value.clone()));
        }
        if let Some(value) = &self.model {
            metadata.set_tag(ExifTag::Model(value.clone()));
        }
        if let Some(value) = self.orientation {
            metadata.set_tag(ExifTag::Orientation(vec![value]));
        }
        if let Some(value) = self.white_balance {
            metadata.set_tag(ExifTag::WhiteBalance(vec![value]));
        }
    }
}

/// Corrections applied on top of the carried fields
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fixups {
    /// Compass heading in radians
    pub heading: Option<f64>,
    /// Replacement for the GPS date and time stamps
    pub gps_time: Option<DateTime<Utc>>,
}

impl Fixups {
    /// Whether an otherwise untouched file still needs its metadata opened
    pub fn is_empty(&self) -> bool {
        self.heading.is_none() && self.gps_time.is_none()
    }
}

/// Image direction for a heading in radians: degrees in [0, 360) with two decimals
pub fn heading_rational(heading: f64) -> Rational {
    let degrees = heading.to_degrees().rem_euclid(360.0);
    let scaled = (degrees * HEADING_DENOMINATOR as f64).round() as u32;
    Rational::new(scaled, HEADING_DENOMINATOR)
}

/// Read the carried fields from a file
///
/// A file without any EXIF block yields empty metadata.
pub fn read_metadata(path: &Path) -> Result<CarriedMetadata, MetadataError> {
    Ok(read_exif(path)?
        .map(|exif| CarriedMetadata::from_exif(&exif))
        .unwrap_or_default())
}

/// Read the carried fields from in-memory capture bytes via a scratch file
///
/// The scratch file is removed again whether or not reading succeeded.
pub fn read_original(bytes: &[u8], scratch_dir: &Path) -> Result<CarriedMetadata, MetadataError> {
    std::fs::create_dir_all(scratch_dir)?;
    let scratch = scratch_dir.join(format!("exif-{}.jpg", uuid::Uuid::new_v4()));
    std::fs::write(&scratch, bytes)?;

    let result = read_metadata(&scratch);
    if let Err(e) = std::fs::remove_file(&scratch) {
        warn!(path = %scratch.display(), error = %e, "Failed to delete metadata scratch file");
    }

    if let Ok(carried) = &result {
        debug!(fields = carried.field_count(), "Read original metadata");
    }
    result
}

/// EXIF orientation of a file, if it has one
pub fn read_orientation(path: &Path) -> Option<u16> {
    read_exif(path)
        .ok()
        .flatten()
        .and_then(|exif| short(&exif, Tag::Orientation))
}

/// Give a freshly encoded file the carried fields plus fix-ups
pub fn transplant(dest: &Path, carried: &CarriedMetadata, fixups: &Fixups) -> Result<(), MetadataError> {
    let mut metadata = Metadata::new();
    carried.write_into(&mut metadata);
    apply_fixups(&mut metadata, carried.datetime.as_deref(), fixups);
    write_metadata(&metadata, dest)?;
    debug!(path = %dest.display(), fields = carried.field_count(), "Transplanted metadata");
    Ok(())
}

/// Apply fix-ups to a file written verbatim, keeping its existing metadata
pub fn fix_in_place(dest: &Path, fixups: &Fixups) -> Result<(), MetadataError> {
    let (mut metadata, datetime) = match read_exif(dest)? {
        Some(exif) => {
            // Refuse to continue if the writer cannot see what the reader saw,
            // otherwise the existing block would be replaced by the fix-ups alone
            let metadata = load_metadata(dest)?;
            (metadata, ascii(&exif, Tag::DateTime))
        }
        None => (Metadata::new(), None),
    };
    apply_fixups(&mut metadata, datetime.as_deref(), fixups);
    write_metadata(&metadata, dest)?;
    debug!(path = %dest.display(), "Applied metadata fix-ups in place");
    Ok(())
}

fn apply_fixups(metadata: &mut Metadata, datetime: Option<&str>, fixups: &Fixups) {
    if let Some(heading) = fixups.heading {
        metadata.set_tag(ExifTag::GPSImgDirection(vec![heading_rational(heading).into()]));
        metadata.set_tag(ExifTag::GPSImgDirectionRef(HEADING_REFERENCE.to_string()));
    }

    if let Some(datetime) = datetime {
        metadata.set_tag(ExifTag::DateTimeOriginal(datetime.to_string()));
        metadata.set_tag(ExifTag::CreateDate(datetime.to_string()));
    }

    if let Some(now) = fixups.gps_time {
        metadata.set_tag(ExifTag::GPSTimeStamp(vec![
            Rational::new(now.hour(), 1).into(),
            Rational::new(now.minute(), 1).into(),
            Rational::new(now.second(), 1).into(),
        ]));
        metadata.set_tag(ExifTag::GPSDateStamp(format!(
            "{:04}:{:02}:{:02}",
            now.year(),
            now.month(),
            now.day()
        )));
    }
}

fn read_exif(path: &Path) -> Result<Option<exif::Exif>, MetadataError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(&file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// little_exif can panic on malformed input, see TechnikTobi/little_exif#76
fn load_metadata(path: &Path) -> Result<Metadata, MetadataError> {
    match catch_unwind(AssertUnwindSafe(|| Metadata::new_from_path(path))) {
        Ok(Ok(metadata)) => Ok(metadata),
        Ok(Err(e)) => Err(MetadataError::Write(format!("cannot load existing metadata: {}", e))),
        Err(_) => Err(MetadataError::WriterPanicked),
    }
}

fn write_metadata(metadata: &Metadata, path: &Path) -> Result<(), MetadataError> {
    match catch_unwind(AssertUnwindSafe(|| metadata.write_to_file(path))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(MetadataError::Write(e.to_string())),
        Err(_) => Err(MetadataError::WriterPanicked),
    }
}

fn ascii(exif: &exif::Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => {
            let text = parts
                .iter()
                .map(|part| String::from_utf8_lossy(part).trim_matches(char::from(0)).to_string())
                .collect::<Vec<_>>()
                .join(" ");
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn rationals(exif: &exif::Exif, tag: Tag) -> Option<Vec<Rational>> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(values) if !values.is_empty() => Some(values.iter().map(Rational::from).collect()),
        _ => None,
    }
}

fn first_rational(exif: &exif::Exif, tag: Tag) -> Option<Rational> {
    rationals(exif, tag).and_then(|values| values.first().copied())
}

fn uint(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn short(exif: &exif::Exif, tag: Tag) -> Option<u16> {
    uint(exif, tag).map(|v| v.min(u16::MAX as u32) as u16)
}

fn undefined(exif: &exif::Exif, tag: Tag) -> Option<Vec<u8>> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Undefined(bytes, _) if !bytes.is_empty() => Some(bytes.clone()),
        Value::Ascii(parts) => parts.first().cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("photo-saver-metadata-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_plain_jpeg(path: &Path) {
        image::RgbImage::from_pixel(16, 12, image::Rgb([90, 120, 150]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn heading_is_normalized_with_two_decimals() {
        assert_eq!(heading_rational((-30.0f64).to_radians()), Rational::new(33000, 100));
        assert_eq!(heading_rational(0.0), Rational::new(0, 100));
        assert_eq!(heading_rational((45.0f64).to_radians()), Rational::new(4500, 100));
    }

    #[test]
    fn fixups_emptiness() {
        assert!(Fixups::default().is_empty());
        let fixups = Fixups {
            heading: Some(1.0),
            gps_time: None,
        };
        assert!(!fixups.is_empty());
    }

    #[test]
    fn file_without_exif_reads_as_empty() {
        let dir = temp_dir();
        let path = dir.join("plain.jpg");
        write_plain_jpeg(&path);
        assert_eq!(read_metadata(&path).unwrap(), CarriedMetadata::default());
        assert_eq!(read_orientation(&path), None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn scratch_file_is_removed() {
        let dir = temp_dir();
        let source = dir.join("source.jpg");
        write_plain_jpeg(&source);
        let bytes = std::fs::read(&source).unwrap();
        let scratch = dir.join("scratch");

        read_original(&bytes, &scratch).unwrap();
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn transplant_writes_carried_fields_and_fixups() {
        let dir = temp_dir();
        let dest = dir.join("finished.jpg");
        write_plain_jpeg(&dest);

        let carried = CarriedMetadata {
            make: Some("Acme".into()),
            model: Some("Phone 1".into()),
            datetime: Some("2024:03:07 14:05:09".into()),
            exposure_time: Some(Rational::new(1, 120)),
            iso: Some(200),
            orientation: Some(6),
            gps_processing_method: Some(b"ASCII\0\0\0NETWORK".to_vec()),
            ..CarriedMetadata::default()
        };
        let fixups = Fixups {
            heading: Some((-30.0f64).to_radians()),
            gps_time: Some(Utc.with_ymd_and_hms(2024, 3, 7, 13, 5, 9).unwrap()),
        };
        transplant(&dest, &carried, &fixups).unwrap();

        let file = File::open(&dest).unwrap();
        let exif = exif::Reader::new()
            .read_from_container(&mut BufReader::new(&file))
            .unwrap();
        assert_eq!(ascii(&exif, Tag::Make).as_deref(), Some("Acme"));
        assert_eq!(ascii(&exif, Tag::DateTime).as_deref(), Some("2024:03:07 14:05:09"));
        assert_eq!(
            undefined(&exif, Tag::GPSProcessingMethod).as_deref(),
            Some(&b"ASCII\0\0\0NETWORK"[..])
        );
        assert_eq!(ascii(&exif, Tag::DateTimeOriginal).as_deref(), Some("2024:03:07 14:05:09"));
        assert_eq!(ascii(&exif, Tag::DateTimeDigitized).as_deref(), Some("2024:03:07 14:05:09"));
        assert_eq!(first_rational(&exif, Tag::GPSImgDirection), Some(Rational::new(33000, 100)));
        assert_eq!(ascii(&exif, Tag::GPSImgDirectionRef).as_deref(), Some("M"));
        assert_eq!(ascii(&exif, Tag::GPSDateStamp).as_deref(), Some("2024:03:07"));
        assert_eq!(
            rationals(&exif, Tag::GPSTimeStamp),
            Some(vec![Rational::new(13, 1), Rational::new(5, 1), Rational::new(9, 1)])
        );
        assert_eq!(read_orientation(&dest), Some(6));
        std::fs::remove_dir_all(&dir).ok();
    }
}
