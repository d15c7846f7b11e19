use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::GifExport;
use crate::library::{MediaDirectory, MediaLibrary};

/// Copies GIF files into the library without re-encoding
#[derive(Debug, Clone)]
pub struct GifExporter {
    library: MediaLibrary,
}

impl GifExporter {
    pub fn new(library: MediaLibrary) -> Self {
        Self { library }
    }

    pub async fn export_gif(&self, source: &Path, directory: MediaDirectory) -> Result<GifExport> {
        let filename = source
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("media.gif");

        let path = self
            .library
            .copy_into(source, filename, "gif", directory)
            .await
            .with_context(|| format!("Failed to copy {} into the media library", source.display()))?;

        let file_size = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Failed to read size of {}", path.display()))?
            .len();

        info!("🎞️ Exported GIF: {} ({} bytes)", path.display(), file_size);

        Ok(GifExport { path, file_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_gif_copy_is_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("dance.gif");
        let bytes = b"GIF89a\x02\x00\x02\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00;".to_vec();
        tokio::fs::write(&source, &bytes).await.unwrap();

        let exporter = GifExporter::new(MediaLibrary::new(temp_dir.path().join("library")));
        let export = exporter.export_gif(&source, MediaDirectory::Uploads).await.unwrap();

        assert_eq!(export.file_size, bytes.len() as u64);
        assert_eq!(tokio::fs::read(&export.path).await.unwrap(), bytes);
        assert_eq!(export.path.extension().unwrap(), "gif");
    }
}
