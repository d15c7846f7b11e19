//! Public entry point: export a file URL into the media library

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::classifier::{classify, ClassifiedSource, MediaKind};
use crate::error::{ExportError, Result};
use crate::export::{
    ExportOptions, ExportOutcome, FfmpegVideoExporter, GifExporter, ImageExporter,
    LibraryImageExporter, VideoExporter,
};
use crate::library::MediaLibrary;
use crate::uti::{SniffingTypeResolver, TypeResolver};

/// Classifies file URLs and hands them to the matching exporter
#[derive(Clone)]
pub struct MediaUrlExporter {
    resolver: Arc<dyn TypeResolver>,
    gif_exporter: GifExporter,
    image_exporter: Arc<dyn ImageExporter>,
    video_exporter: Arc<dyn VideoExporter>,
}

impl MediaUrlExporter {
    /// Exporter writing into `library` with the built-in collaborators
    pub fn new(library: MediaLibrary) -> Self {
        Self {
            resolver: Arc::new(SniffingTypeResolver::new()),
            gif_exporter: GifExporter::new(library.clone()),
            image_exporter: Arc::new(LibraryImageExporter::new(library.clone())),
            video_exporter: Arc::new(FfmpegVideoExporter::new(library)),
        }
    }

    pub fn with_type_resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_image_exporter(mut self, exporter: Arc<dyn ImageExporter>) -> Self {
        self.image_exporter = exporter;
        self
    }

    pub fn with_video_exporter(mut self, exporter: Arc<dyn VideoExporter>) -> Self {
        self.video_exporter = exporter;
        self
    }

    /// Export the file at `url`, expecting a GIF, video or image.
    pub async fn export_url(&self, url: &Url, options: &ExportOptions) -> Result<ExportOutcome> {
        let source = classify(url, self.resolver.as_ref())
            .await
            .inspect_err(|e| warn!("Rejected {}: {}", url, e))?;

        info!("📥 Exporting {} as {:?}", source.path.display(), source.kind);

        self.dispatch(&source, options)
            .await
            .map_err(ExportError::from_failure)
    }

    async fn dispatch(&self, source: &ClassifiedSource, options: &ExportOptions) -> anyhow::Result<ExportOutcome> {
        let outcome = match source.kind {
            MediaKind::Gif => ExportOutcome::Gif(
                self.gif_exporter
                    .export_gif(&source.path, options.directory)
                    .await?,
            ),
            MediaKind::Video => ExportOutcome::Video(
                self.video_exporter
                    .export_video(&source.path, &options.video_options(source.filename()))
                    .await?,
            ),
            MediaKind::Image => ExportOutcome::Image(
                self.image_exporter
                    .export_image(&source.path, &options.image_options())
                    .await?,
            ),
        };
        Ok(outcome)
    }

    /// Callback form of [`export_url`](Self::export_url).
    ///
    /// Exactly one of `on_success` / `on_error` runs, once.
    pub async fn export_url_with<S, E>(&self, url: &Url, options: &ExportOptions, on_success: S, on_error: E)
    where
        S: FnOnce(ExportOutcome),
        E: FnOnce(ExportError),
    {
        match self.export_url(url, options).await {
            Ok(outcome) => on_success(outcome),
            Err(error) => {
                debug!("Export of {} failed: {}", url, error);
                on_error(error)
            }
        }
    }

    /// Run an export on the runtime and report through callbacks.
    ///
    /// Returns immediately; the callbacks run on a runtime worker.
    pub fn spawn_export<S, E>(
        self: &Arc<Self>,
        url: Url,
        options: ExportOptions,
        on_success: S,
        on_error: E,
    ) -> JoinHandle<()>
    where
        S: FnOnce(ExportOutcome) + Send + 'static,
        E: FnOnce(ExportError) + Send + 'static,
    {
        let exporter = Arc::clone(self);
        tokio::spawn(async move {
            exporter
                .export_url_with(&url, &options, on_success, on_error)
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MediaDirectory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_http_url_is_invalid_source() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = MediaUrlExporter::new(MediaLibrary::new(temp_dir.path()));
        let url = Url::parse("https://example.com/cat.gif").unwrap();

        let error = exporter
            .export_url(&url, &ExportOptions::default())
            .await
            .unwrap_err();
        assert!(error.is_invalid_source());
    }

    #[tokio::test]
    async fn test_spawned_export_reports_once() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("loop.gif");
        tokio::fs::write(&source, b"GIF87a\x01\x00\x01\x00\x00\x00\x00;").await.unwrap();

        let exporter = Arc::new(MediaUrlExporter::new(MediaLibrary::new(temp_dir.path().join("lib"))));
        let successes = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let options = ExportOptions {
            directory: MediaDirectory::Temporary,
            ..ExportOptions::default()
        };
        let s = Arc::clone(&successes);
        let e = Arc::clone(&errors);
        exporter
            .spawn_export(
                Url::from_file_path(&source).unwrap(),
                options,
                move |outcome| {
                    assert_eq!(outcome.kind(), MediaKind::Gif);
                    s.fetch_add(1, Ordering::SeqCst);
                },
                move |_| {
                    e.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await
            .unwrap();

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }
}
