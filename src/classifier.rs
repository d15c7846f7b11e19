//! Decides which exporter handles a source URL

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;
use url::Url;

use crate::error::{ExportError, Result};
use crate::uti::{TypeIdentifier, TypeResolver};

/// Export route for a classified file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Gif,
    Video,
    Image,
}

impl MediaKind {
    /// Route for a type identifier.
    ///
    /// GIF is checked before image since it also conforms to image.
    pub fn for_type(identifier: &TypeIdentifier) -> Option<Self> {
        if identifier.equals(TypeIdentifier::GIF) {
            Some(MediaKind::Gif)
        } else if identifier.conforms_to(TypeIdentifier::VIDEO)
            || identifier.conforms_to(TypeIdentifier::MOVIE)
        {
            Some(MediaKind::Video)
        } else if identifier.conforms_to(TypeIdentifier::IMAGE) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }
}

/// A source file that passed classification
#[derive(Debug, Clone)]
pub struct ClassifiedSource {
    pub path: PathBuf,
    pub type_identifier: TypeIdentifier,
    pub kind: MediaKind,
}

impl ClassifiedSource {
    /// Last path component of the source
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("media")
            .to_string()
    }
}

/// Local filesystem path for a `file` URL
pub fn local_path(url: &Url) -> Result<PathBuf> {
    if url.scheme() != "file" {
        return Err(ExportError::InvalidSourceReference(url.to_string()));
    }
    url.to_file_path()
        .map_err(|_| ExportError::InvalidSourceReference(url.to_string()))
}

/// Classify a source URL without touching anything but its leading bytes.
pub async fn classify(url: &Url, resolver: &dyn TypeResolver) -> Result<ClassifiedSource> {
    let path = local_path(url)?;

    let type_identifier = resolver
        .resolve(&path)
        .await
        .ok_or_else(|| ExportError::UnrecognizedFileType(path.display().to_string()))?;

    let kind = MediaKind::for_type(&type_identifier)
        .ok_or_else(|| ExportError::UnrecognizedFileType(type_identifier.to_string()))?;

    debug!("Classified {} ({}) as {:?}", path.display(), type_identifier, kind);

    Ok(ClassifiedSource {
        path,
        type_identifier,
        kind,
    })
}
