use ::image::imageops::FilterType;
use ::image::{DynamicImage, ImageFormat, ImageReader};
use anyhow::{Context, Result};
use async_trait::async_trait;
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, Bytes, ImageEXIF};
use std::io::{self, Cursor};
use std::path::Path;
use tracing::{debug, info};

use super::{ImageExport, ImageExportOptions, ImageExporter};
use crate::library::MediaLibrary;

/// Image bytes ready to be written to the library
#[derive(Debug)]
struct PreparedImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    format: ImageFormat,
}

/// Downsizes images and strips their metadata before writing them to the library
#[derive(Debug, Clone)]
pub struct LibraryImageExporter {
    library: MediaLibrary,
}

impl LibraryImageExporter {
    pub fn new(library: MediaLibrary) -> Self {
        Self { library }
    }
}

#[async_trait]
impl ImageExporter for LibraryImageExporter {
    async fn export_image(&self, source: &Path, options: &ImageExportOptions) -> Result<ImageExport> {
        let data = tokio::fs::read(source)
            .await
            .with_context(|| format!("Failed to read image {}", source.display()))?;

        let max_dimension = options.max_image_dimension;
        let strip_geolocation = options.strip_geolocation;
        let prepared =
            tokio::task::spawn_blocking(move || prepare_image(data, max_dimension, strip_geolocation))
                .await
                .context("Image preparation task panicked")??;

        let filename = source
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let extension = prepared.format.extensions_str().first().copied().unwrap_or("img");

        let path = self
            .library
            .write_into(&prepared.bytes, filename, extension, options.directory)
            .await
            .with_context(|| format!("Failed to write {} into the media library", filename))?;

        let file_size = tokio::fs::metadata(&path).await?.len();

        info!(
            "🖼️ Exported image: {} ({}x{}, {} bytes)",
            path.display(),
            prepared.width,
            prepared.height,
            file_size
        );

        Ok(ImageExport {
            path,
            file_size,
            width: prepared.width,
            height: prepared.height,
            format: format!("{:?}", prepared.format).to_lowercase(),
        })
    }
}

fn invalid_data(error: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}

fn prepare_image(data: Vec<u8>, max_dimension: Option<u32>, strip_geolocation: bool) -> Result<PreparedImage> {
    let reader = ImageReader::new(Cursor::new(data.as_slice()))
        .with_guessed_format()
        .map_err(invalid_data)?;
    let format = reader
        .format()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unrecognized image data"))?;
    let (width, height) = reader.into_dimensions().map_err(invalid_data)?;

    match max_dimension.filter(|max| width.max(height) > *max) {
        Some(max) => {
            let image = ::image::load_from_memory_with_format(&data, format).map_err(invalid_data)?;
            let resized = image.resize(max, max, FilterType::Lanczos3);
            debug!("Resized image from {}x{} to {}x{}", width, height, resized.width(), resized.height());

            // Re-encoding drops every metadata block, including EXIF
            let (resized_width, resized_height) = (resized.width(), resized.height());
            let output_format = encodable_format(format);
            Ok(PreparedImage {
                bytes: encode(resized, output_format)?,
                width: resized_width,
                height: resized_height,
                format: output_format,
            })
        }
        None if strip_geolocation => {
            let (bytes, format) = strip_metadata(data, format)?;
            Ok(PreparedImage {
                bytes,
                width,
                height,
                format,
            })
        }
        None => Ok(PreparedImage {
            bytes: data,
            width,
            height,
            format,
        }),
    }
}

/// Format used when writing a resized image back out
fn encodable_format(format: ImageFormat) -> ImageFormat {
    match format {
        ImageFormat::Jpeg
        | ImageFormat::Png
        | ImageFormat::Gif
        | ImageFormat::WebP
        | ImageFormat::Bmp
        | ImageFormat::Tiff => format,
        _ => ImageFormat::Png,
    }
}

fn encode(image: DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };

    let mut output = Cursor::new(Vec::new());
    image.write_to(&mut output, format).map_err(invalid_data)?;
    Ok(output.into_inner())
}

/// Remove EXIF, and with it any GPS tags, from encoded image data.
///
/// JPEG, PNG and WebP are edited in place. GIF and BMP have no EXIF block.
/// Everything else is decoded and re-encoded, which drops all metadata.
pub fn strip_metadata(data: Vec<u8>, format: ImageFormat) -> Result<(Vec<u8>, ImageFormat)> {
    let bytes = Bytes::from(data);

    let stripped = match format {
        ImageFormat::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(bytes).map_err(invalid_data)?;
            jpeg.set_exif(None);
            jpeg.encoder().bytes()
        }
        ImageFormat::Png => {
            let mut png = Png::from_bytes(bytes).map_err(invalid_data)?;
            png.set_exif(None);
            png.encoder().bytes()
        }
        ImageFormat::WebP => {
            let mut webp = WebP::from_bytes(bytes).map_err(invalid_data)?;
            webp.set_exif(None);
            webp.encoder().bytes()
        }
        ImageFormat::Gif | ImageFormat::Bmp => bytes,
        _ => {
            let image = ::image::load_from_memory_with_format(&bytes, format).map_err(invalid_data)?;
            let output_format = encodable_format(format);
            debug!("Re-encoding {:?} as {:?} to drop metadata", format, output_format);
            return Ok((encode(image, output_format)?, output_format));
        }
    };

    Ok((stripped.to_vec(), format))
}
