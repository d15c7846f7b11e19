//! Media Exporter
//!
//! Classifies local media files by uniform type identifier and exports them
//! into a managed media library as images, videos or verbatim GIF copies.

pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod exporter;
pub mod library;
pub mod processing;
pub mod uti;

// Re-export main types for easy access
pub use crate::classifier::{classify, ClassifiedSource, MediaKind};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{ExportError, EXPORT_FAILURE_MESSAGE};
pub use crate::export::{
    ExportOptions, ExportOutcome, GifExport, ImageExport, ImageExporter, VideoExport, VideoExporter,
};
pub use crate::exporter::MediaUrlExporter;
pub use crate::library::{MediaDirectory, MediaLibrary};
pub use crate::processing::{BatchExporter, BatchReport, ExportStatus};
pub use crate::uti::{SniffingTypeResolver, TypeIdentifier, TypeResolver};
