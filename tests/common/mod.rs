// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use chrono::{DateTime, Local, TimeZone};
use image::{Rgb, RgbImage};
use photo_saver::SaverConfig;
use photo_saver::pipelines::photo::encoding::encode_jpeg;
use photo_saver::pipelines::photo::metadata::{self, CarriedMetadata, Fixups, Rational};
use photo_saver::storage::{ByteSink, Destination, FileStorage, MediaKind, MediaUri, StorageSink};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Fresh directory under the system temp dir
pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("photo-saver-{}-{}", label, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Config writing into `dir`
pub fn config_in(dir: &Path) -> SaverConfig {
    SaverConfig {
        scratch_dir: dir.join("scratch"),
        output_dir: dir.join("out"),
        ..SaverConfig::default()
    }
}

/// Capture timestamp `seconds` past a fixed minute
pub fn timestamp(seconds: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 7, 14, 5, seconds).unwrap()
}

/// Gradient JPEG without EXIF
pub fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    });
    encode_jpeg(&image, 92).unwrap()
}

/// Metadata written into [`exif_jpeg`], with every carried field set
pub fn fixture_metadata() -> CarriedMetadata {
    CarriedMetadata {
        aperture: Some(Rational::new(18, 10)),
        datetime: Some("2024:03:07 14:05:09".into()),
        exposure_time: Some(Rational::new(1, 120)),
        flash: Some(0x10),
        focal_length: Some(Rational::new(433, 100)),
        gps_altitude: Some(Rational::new(3550, 100)),
        gps_altitude_ref: Some(0),
        gps_datestamp: Some("2024:03:07".into()),
        gps_latitude: Some(vec![
            Rational::new(51, 1),
            Rational::new(30, 1),
            Rational::new(2592, 100),
        ]),
        gps_latitude_ref: Some("N".into()),
        gps_longitude: Some(vec![
            Rational::new(0, 1),
            Rational::new(7, 1),
            Rational::new(3936, 100),
        ]),
        gps_longitude_ref: Some("W".into()),
        gps_processing_method: Some(b"ASCII\0\0\0GPS".to_vec()),
        gps_timestamp: Some(vec![
            Rational::new(13, 1),
            Rational::new(5, 1),
            Rational::new(9, 1),
        ]),
        iso: Some(200),
        make: Some("Acme".into()),
        model: Some("Phone 1".into()),
        orientation: Some(6),
        white_balance: Some(0),
    }
}

/// JPEG carrying [`fixture_metadata`]
pub fn exif_jpeg(dir: &Path, width: u32, height: u32) -> Vec<u8> {
    let path = dir.join(format!("fixture-{}.jpg", uuid::Uuid::new_v4()));
    std::fs::write(&path, plain_jpeg(width, height)).unwrap();
    metadata::transplant(&path, &fixture_metadata(), &Fixups::default()).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).ok();
    bytes
}

/// Poll `condition` for up to two seconds
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[derive(Default)]
struct Gate {
    open: bool,
    entered: usize,
}

/// File storage whose `create_destination` blocks until the gate opens
pub struct GatedStorage {
    inner: FileStorage,
    gate: Mutex<Gate>,
    changed: Condvar,
}

impl GatedStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: FileStorage::new(dir),
            gate: Mutex::new(Gate::default()),
            changed: Condvar::new(),
        }
    }

    pub fn open(&self) {
        self.gate.lock().unwrap().open = true;
        self.changed.notify_all();
    }

    /// Number of saves that reached destination creation
    pub fn entered(&self) -> usize {
        self.gate.lock().unwrap().entered
    }

    pub fn wait_entered(&self, count: usize) {
        let mut gate = self.gate.lock().unwrap();
        while gate.entered < count {
            gate = self.changed.wait(gate).unwrap();
        }
    }
}

impl StorageSink for GatedStorage {
    fn create_destination(
        &self,
        kind: MediaKind,
        extension: &str,
        timestamp: DateTime<Local>,
    ) -> io::Result<Destination> {
        {
            let mut gate = self.gate.lock().unwrap();
            gate.entered += 1;
            self.changed.notify_all();
            while !gate.open {
                gate = self.changed.wait(gate).unwrap();
            }
        }
        self.inner.create_destination(kind, extension, timestamp)
    }

    fn open_for_write(&self, destination: &Destination) -> io::Result<ByteSink> {
        self.inner.open_for_write(destination)
    }

    fn resolve_underlying_file(&self, uri: &MediaUri) -> Option<PathBuf> {
        self.inner.resolve_underlying_file(uri)
    }

    fn broadcast_new_media(&self, file: &Path, is_image: bool, is_video: bool, has_metadata_rewrite: bool) {
        self.inner
            .broadcast_new_media(file, is_image, is_video, has_metadata_rewrite)
    }

    fn announce(&self, uri: &MediaUri, is_image: bool, is_video: bool) {
        self.inner.announce(uri, is_image, is_video)
    }
}

/// What a [`RecordingStorage`] was told about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    Broadcast { file: PathBuf, has_metadata_rewrite: bool },
    Uri(MediaUri),
}

/// File storage that remembers its broadcasts and announcements
pub struct RecordingStorage {
    inner: FileStorage,
    seen: Mutex<Vec<Announcement>>,
}

impl RecordingStorage {
    pub fn new(inner: FileStorage) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn announcements(&self) -> Vec<Announcement> {
        self.seen.lock().unwrap().clone()
    }
}

impl StorageSink for RecordingStorage {
    fn create_destination(
        &self,
        kind: MediaKind,
        extension: &str,
        timestamp: DateTime<Local>,
    ) -> io::Result<Destination> {
        self.inner.create_destination(kind, extension, timestamp)
    }

    fn open_for_write(&self, destination: &Destination) -> io::Result<ByteSink> {
        self.inner.open_for_write(destination)
    }

    fn resolve_underlying_file(&self, uri: &MediaUri) -> Option<PathBuf> {
        self.inner.resolve_underlying_file(uri)
    }

    fn broadcast_new_media(&self, file: &Path, _: bool, _: bool, has_metadata_rewrite: bool) {
        self.seen.lock().unwrap().push(Announcement::Broadcast {
            file: file.to_path_buf(),
            has_metadata_rewrite,
        });
    }

    fn announce(&self, uri: &MediaUri, _: bool, _: bool) {
        self.seen.lock().unwrap().push(Announcement::Uri(uri.clone()));
    }
}

/// Storage that cannot create anything
pub struct BrokenStorage;

impl StorageSink for BrokenStorage {
    fn create_destination(&self, _: MediaKind, _: &str, _: DateTime<Local>) -> io::Result<Destination> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only storage"))
    }

    fn open_for_write(&self, _: &Destination) -> io::Result<ByteSink> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only storage"))
    }

    fn resolve_underlying_file(&self, _: &MediaUri) -> Option<PathBuf> {
        None
    }

    fn broadcast_new_media(&self, _: &Path, _: bool, _: bool, _: bool) {}

    fn announce(&self, _: &MediaUri, _: bool, _: bool) {}
}
