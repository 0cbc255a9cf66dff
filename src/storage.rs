// SPDX-License-Identifier: GPL-3.0-only

//! Storage sink: where finished photos are written
//!
//! The pipelines never choose paths themselves. They ask a [`StorageSink`] for
//! a [`Destination`], which is either a plain file or an opaque document URI.
//! URIs only support streaming writes, so anything that needs random access
//! (metadata rewriting) goes through a temporary file first.

use chrono::{DateTime, Local};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Kind of media a destination is created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn file_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "IMG",
            MediaKind::Video => "VID",
        }
    }
}

/// Opaque document URI handed out by a storage sink
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaUri(String);

impl MediaUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where finished bytes end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A file the saver can open with random access
    File(PathBuf),
    /// A document that only supports streaming writes
    Uri(MediaUri),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::File(path) => write!(f, "{}", path.display()),
            Destination::Uri(uri) => write!(f, "{}", uri),
        }
    }
}

/// Byte sink returned by [`StorageSink::open_for_write`]
pub type ByteSink = Box<dyn Write + Send>;

/// External collaborator that selects and opens destinations
pub trait StorageSink: Send + Sync {
    /// Create a new destination for media captured at `timestamp`
    fn create_destination(
        &self,
        kind: MediaKind,
        extension: &str,
        timestamp: DateTime<Local>,
    ) -> io::Result<Destination>;

    /// Open a destination for streaming writes
    fn open_for_write(&self, destination: &Destination) -> io::Result<ByteSink>;

    /// Map a document URI back to a real file, if it has one
    fn resolve_underlying_file(&self, uri: &MediaUri) -> Option<PathBuf>;

    /// Tell the host system about a new file
    fn broadcast_new_media(
        &self,
        file: &Path,
        is_image: bool,
        is_video: bool,
        has_metadata_rewrite: bool,
    );

    /// Tell the host system about a new document URI without a backing file
    fn announce(&self, uri: &MediaUri, is_image: bool, is_video: bool);
}

const DOCUMENT_SCHEME: &str = "document://";

/// Directory-backed storage sink
///
/// Files are named `IMG_YYYYMMDD_HHMMSS.ext`, with a numeric suffix when two
/// captures land in the same second. With [`FileStorage::with_document_uris`]
/// the sink hands out `document://` URIs instead of paths; they still resolve
/// back to files in the same directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    document_uris: bool,
}

impl FileStorage {
    /// Storage that hands out plain file destinations
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            document_uris: false,
        }
    }

    /// Storage that hands out document URIs backed by `dir`
    pub fn with_document_uris(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            document_uris: true,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn unique_name(&self, kind: MediaKind, extension: &str, timestamp: DateTime<Local>) -> String {
        let stem = format!("{}_{}", kind.file_prefix(), timestamp.format("%Y%m%d_%H%M%S"));
        let mut name = format!("{}.{}", stem, extension);
        let mut counter = 1;
        while self.dir.join(&name).exists() {
            name = format!("{}_{}.{}", stem, counter, extension);
            counter += 1;
        }
        name
    }

    fn document_path(&self, uri: &MediaUri) -> Option<PathBuf> {
        let name = uri.as_str().strip_prefix(DOCUMENT_SCHEME)?;
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return None;
        }
        Some(self.dir.join(name))
    }
}

impl StorageSink for FileStorage {
    fn create_destination(
        &self,
        kind: MediaKind,
        extension: &str,
        timestamp: DateTime<Local>,
    ) -> io::Result<Destination> {
        std::fs::create_dir_all(&self.dir)?;
        let name = self.unique_name(kind, extension, timestamp);

        if self.document_uris {
            // Reserve the name so a second capture in the same second gets a suffix
            File::create(self.dir.join(&name))?;
            let uri = MediaUri::new(format!("{}{}", DOCUMENT_SCHEME, name));
            debug!(uri = %uri, "Created document destination");
            Ok(Destination::Uri(uri))
        } else {
            let path = self.dir.join(name);
            debug!(path = %path.display(), "Created file destination");
            Ok(Destination::File(path))
        }
    }

    fn open_for_write(&self, destination: &Destination) -> io::Result<ByteSink> {
        let path = match destination {
            Destination::File(path) => path.clone(),
            Destination::Uri(uri) => self.document_path(uri).ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("Unknown document: {}", uri))
            })?,
        };
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }

    fn resolve_underlying_file(&self, uri: &MediaUri) -> Option<PathBuf> {
        self.document_path(uri).filter(|path| path.exists())
    }

    fn broadcast_new_media(
        &self,
        file: &Path,
        is_image: bool,
        is_video: bool,
        has_metadata_rewrite: bool,
    ) {
        info!(
            path = %file.display(),
            is_image,
            is_video,
            has_metadata_rewrite,
            "New media available"
        );
    }

    fn announce(&self, uri: &MediaUri, is_image: bool, is_video: bool) {
        info!(uri = %uri, is_image, is_video, "New document available");
    }
}
