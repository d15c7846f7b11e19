//! Exported artifacts and the exporters that produce them

pub mod gif;
pub mod image;
pub mod video;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::MediaKind;
use crate::library::MediaDirectory;

pub use self::gif::GifExporter;
pub use self::image::LibraryImageExporter;
pub use self::video::FfmpegVideoExporter;

/// Settings shared by every export
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Longest side allowed for exported images, in pixels
    pub max_image_dimension: Option<u32>,

    /// Remove location metadata from exported media
    pub strip_geolocation: bool,

    /// Managed directory receiving the export
    pub directory: MediaDirectory,
}

impl ExportOptions {
    pub fn image_options(&self) -> ImageExportOptions {
        ImageExportOptions {
            max_image_dimension: self.max_image_dimension,
            strip_geolocation: self.strip_geolocation,
            directory: self.directory,
        }
    }

    /// Video settings; the export keeps the source's filename.
    pub fn video_options(&self, export_filename: impl Into<String>) -> VideoExportOptions {
        VideoExportOptions {
            strip_geolocation: self.strip_geolocation,
            directory: self.directory,
            export_filename: export_filename.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExportOptions {
    pub max_image_dimension: Option<u32>,
    pub strip_geolocation: bool,
    pub directory: MediaDirectory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoExportOptions {
    pub strip_geolocation: bool,
    pub directory: MediaDirectory,
    pub export_filename: String,
}

/// Image written to the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageExport {
    pub path: PathBuf,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Video written to the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoExport {
    pub path: PathBuf,
    pub file_size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<Duration>,
}

/// GIF copied verbatim into the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GifExport {
    pub path: PathBuf,
    pub file_size: u64,
}

/// Result of exporting a single URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExportOutcome {
    Image(ImageExport),
    Video(VideoExport),
    Gif(GifExport),
}

impl ExportOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ExportOutcome::Image(export) => &export.path,
            ExportOutcome::Video(export) => &export.path,
            ExportOutcome::Gif(export) => &export.path,
        }
    }

    pub fn file_size(&self) -> u64 {
        match self {
            ExportOutcome::Image(export) => export.file_size,
            ExportOutcome::Video(export) => export.file_size,
            ExportOutcome::Gif(export) => export.file_size,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            ExportOutcome::Image(_) => MediaKind::Image,
            ExportOutcome::Video(_) => MediaKind::Video,
            ExportOutcome::Gif(_) => MediaKind::Gif,
        }
    }
}

/// Produces library images from local image files
#[async_trait]
pub trait ImageExporter: Send + Sync {
    async fn export_image(&self, source: &Path, options: &ImageExportOptions) -> anyhow::Result<ImageExport>;
}

/// Produces library videos from local video files
#[async_trait]
pub trait VideoExporter: Send + Sync {
    async fn export_video(&self, source: &Path, options: &VideoExportOptions) -> anyhow::Result<VideoExport>;
}
