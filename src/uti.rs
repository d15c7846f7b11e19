//! Uniform type identifiers and the service that resolves them for local files

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Number of leading bytes read when sniffing a file's format
const SNIFF_LEN: usize = 32;

/// Header sizes of the known BMP DIB header versions
const DIB_HEADER_SIZES: [u32; 7] = [12, 40, 52, 56, 64, 108, 124];

/// A uniform type identifier such as `public.jpeg` or `com.compuserve.gif`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeIdentifier(String);

impl TypeIdentifier {
    pub const DATA: &'static str = "public.data";
    pub const CONTENT: &'static str = "public.content";
    pub const TEXT: &'static str = "public.text";
    pub const PLAIN_TEXT: &'static str = "public.plain-text";
    pub const PDF: &'static str = "com.adobe.pdf";
    pub const IMAGE: &'static str = "public.image";
    pub const JPEG: &'static str = "public.jpeg";
    pub const PNG: &'static str = "public.png";
    pub const GIF: &'static str = "com.compuserve.gif";
    pub const WEBP: &'static str = "org.webmproject.webp";
    pub const HEIC: &'static str = "public.heic";
    pub const TIFF: &'static str = "public.tiff";
    pub const BMP: &'static str = "com.microsoft.bmp";
    pub const AVIF: &'static str = "public.avif";
    pub const AUDIOVISUAL_CONTENT: &'static str = "public.audiovisual-content";
    pub const MOVIE: &'static str = "public.movie";
    pub const VIDEO: &'static str = "public.video";
    pub const MPEG4: &'static str = "public.mpeg-4";
    pub const QUICKTIME: &'static str = "com.apple.quicktime-movie";
    pub const THREE_GPP: &'static str = "public.3gpp";
    pub const AVI: &'static str = "public.avi";
    pub const MATROSKA: &'static str = "org.matroska.mkv";
    pub const WEBM: &'static str = "org.webmproject.webm";
    pub const AUDIO: &'static str = "public.audio";
    pub const MP3: &'static str = "public.mp3";
    pub const MPEG4_AUDIO: &'static str = "public.mpeg-4-audio";

    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact identifier match
    pub fn equals(&self, identifier: &str) -> bool {
        self.0 == identifier
    }

    /// True when this type is `identifier` or one of its descendants.
    pub fn conforms_to(&self, identifier: &str) -> bool {
        let mut current = Some(self.0.as_str());
        while let Some(id) = current {
            if id == identifier {
                return true;
            }
            current = parent_of(id);
        }
        false
    }

    /// Identifier for a lowercase filename extension
    pub fn from_extension(extension: &str) -> Option<Self> {
        let id = match extension.to_lowercase().as_str() {
            "gif" => Self::GIF,
            "jpg" | "jpeg" | "jpe" => Self::JPEG,
            "png" => Self::PNG,
            "webp" => Self::WEBP,
            "heic" | "heif" => Self::HEIC,
            "tif" | "tiff" => Self::TIFF,
            "bmp" => Self::BMP,
            "avif" => Self::AVIF,
            "mp4" | "m4v" => Self::MPEG4,
            "mov" | "qt" => Self::QUICKTIME,
            "3gp" | "3g2" => Self::THREE_GPP,
            "avi" => Self::AVI,
            "mkv" => Self::MATROSKA,
            "webm" => Self::WEBM,
            "mp3" => Self::MP3,
            "m4a" | "m4b" => Self::MPEG4_AUDIO,
            "txt" | "text" => Self::PLAIN_TEXT,
            "pdf" => Self::PDF,
            _ => return None,
        };
        Some(Self::new(id))
    }

    /// Identifier for a file's leading bytes
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        let id = if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Self::GIF
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::JPEG
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Self::PNG
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Self::WEBP
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"AVI " {
            Self::AVI
        } else if is_bmp(bytes) {
            Self::BMP
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Self::TIFF
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            // EBML header, shared by Matroska and WebM
            Self::MATROSKA
        } else if bytes.starts_with(b"%PDF") {
            Self::PDF
        } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
            // Unknown brands are left to the extension
            ftyp_brand(&bytes[8..12])?
        } else {
            return None;
        };
        Some(Self::new(id))
    }
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ISO base media major brand to identifier
fn ftyp_brand(brand: &[u8]) -> Option<&'static str> {
    let id = match brand {
        b"qt  " => TypeIdentifier::QUICKTIME,
        b"isom" | b"iso2" | b"mp41" | b"mp42" | b"avc1" | b"M4V " | b"M4VH" | b"M4VP" => {
            TypeIdentifier::MPEG4
        }
        b"M4A " | b"M4B " => TypeIdentifier::MPEG4_AUDIO,
        b"heic" | b"heix" | b"mif1" | b"msf1" => TypeIdentifier::HEIC,
        b"avif" | b"avis" => TypeIdentifier::AVIF,
        _ if brand.starts_with(b"3gp") || brand.starts_with(b"3g2") => TypeIdentifier::THREE_GPP,
        _ => return None,
    };
    Some(id)
}

/// `BM` followed by a file header and a DIB header of a known size
fn is_bmp(bytes: &[u8]) -> bool {
    if bytes.len() < 18 || !bytes.starts_with(b"BM") {
        return false;
    }
    let dib_size = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]);
    DIB_HEADER_SIZES.contains(&dib_size)
}

/// Direct parent of a known identifier in the conformance hierarchy
fn parent_of(identifier: &str) -> Option<&'static str> {
    let parent = match identifier {
        TypeIdentifier::JPEG
        | TypeIdentifier::PNG
        | TypeIdentifier::GIF
        | TypeIdentifier::WEBP
        | TypeIdentifier::HEIC
        | TypeIdentifier::TIFF
        | TypeIdentifier::BMP
        | TypeIdentifier::AVIF => TypeIdentifier::IMAGE,
        TypeIdentifier::MPEG4
        | TypeIdentifier::QUICKTIME
        | TypeIdentifier::THREE_GPP
        | TypeIdentifier::AVI
        | TypeIdentifier::MATROSKA
        | TypeIdentifier::WEBM => TypeIdentifier::MOVIE,
        TypeIdentifier::MOVIE | TypeIdentifier::VIDEO | TypeIdentifier::AUDIO => {
            TypeIdentifier::AUDIOVISUAL_CONTENT
        }
        TypeIdentifier::MP3 | TypeIdentifier::MPEG4_AUDIO => TypeIdentifier::AUDIO,
        TypeIdentifier::PLAIN_TEXT => TypeIdentifier::TEXT,
        TypeIdentifier::IMAGE
        | TypeIdentifier::AUDIOVISUAL_CONTENT
        | TypeIdentifier::TEXT
        | TypeIdentifier::PDF => TypeIdentifier::CONTENT,
        TypeIdentifier::CONTENT => TypeIdentifier::DATA,
        _ => return None,
    };
    Some(parent)
}

/// Maps a local file to its uniform type identifier
#[async_trait]
pub trait TypeResolver: Send + Sync {
    /// `None` when the type cannot be determined
    async fn resolve(&self, path: &Path) -> Option<TypeIdentifier>;
}

/// Resolves types from magic bytes, falling back to the filename extension
#[derive(Debug, Clone, Default)]
pub struct SniffingTypeResolver;

impl SniffingTypeResolver {
    pub fn new() -> Self {
        Self
    }

    async fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut header = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            let read = file.read(&mut header[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        header.truncate(filled);
        Ok(header)
    }
}

#[async_trait]
impl TypeResolver for SniffingTypeResolver {
    async fn resolve(&self, path: &Path) -> Option<TypeIdentifier> {
        match Self::read_header(path).await {
            Ok(header) => {
                if let Some(identifier) = TypeIdentifier::from_magic(&header) {
                    debug!("Sniffed {} as {}", path.display(), identifier);
                    return Some(identifier);
                }
            }
            Err(e) => {
                debug!("Could not read header of {}: {}", path.display(), e);
            }
        }

        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(TypeIdentifier::from_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gif_conforms_to_image_but_not_movie() {
        let gif = TypeIdentifier::new(TypeIdentifier::GIF);
        assert!(gif.equals(TypeIdentifier::GIF));
        assert!(gif.conforms_to(TypeIdentifier::IMAGE));
        assert!(gif.conforms_to(TypeIdentifier::DATA));
        assert!(!gif.conforms_to(TypeIdentifier::MOVIE));
    }

    #[test]
    fn test_movie_hierarchy() {
        let mp4 = TypeIdentifier::new(TypeIdentifier::MPEG4);
        assert!(mp4.conforms_to(TypeIdentifier::MOVIE));
        assert!(mp4.conforms_to(TypeIdentifier::AUDIOVISUAL_CONTENT));
        assert!(!mp4.conforms_to(TypeIdentifier::VIDEO));
        assert!(!mp4.conforms_to(TypeIdentifier::IMAGE));
    }

    #[test]
    fn test_unknown_identifier_conforms_only_to_itself() {
        let custom = TypeIdentifier::new("com.example.custom");
        assert!(custom.conforms_to("com.example.custom"));
        assert!(!custom.conforms_to(TypeIdentifier::DATA));
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        assert_eq!(
            TypeIdentifier::from_extension("JPG"),
            Some(TypeIdentifier::new(TypeIdentifier::JPEG))
        );
        assert_eq!(TypeIdentifier::from_extension("xyz"), None);
    }

    fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
        let mut header = vec![0, 0, 0, 0x20];
        header.extend_from_slice(b"ftyp");
        header.extend_from_slice(brand);
        header.extend_from_slice(&[0, 0, 0, 0]);
        header
    }

    #[test]
    fn test_ftyp_brands() {
        let magic = |brand: &[u8; 4]| TypeIdentifier::from_magic(&ftyp(brand));

        assert_eq!(magic(b"isom"), Some(TypeIdentifier::new(TypeIdentifier::MPEG4)));
        assert_eq!(magic(b"mp42"), Some(TypeIdentifier::new(TypeIdentifier::MPEG4)));
        assert_eq!(magic(b"qt  "), Some(TypeIdentifier::new(TypeIdentifier::QUICKTIME)));
        assert_eq!(magic(b"3gp5"), Some(TypeIdentifier::new(TypeIdentifier::THREE_GPP)));
        assert_eq!(magic(b"M4A "), Some(TypeIdentifier::new(TypeIdentifier::MPEG4_AUDIO)));
        assert_eq!(magic(b"M4B "), Some(TypeIdentifier::new(TypeIdentifier::MPEG4_AUDIO)));
        assert_eq!(magic(b"avif"), Some(TypeIdentifier::new(TypeIdentifier::AVIF)));
        assert_eq!(magic(b"heic"), Some(TypeIdentifier::new(TypeIdentifier::HEIC)));
        assert_eq!(magic(b"crx "), None);
    }

    #[test]
    fn test_mpeg4_audio_is_audio_not_movie() {
        let m4a = TypeIdentifier::new(TypeIdentifier::MPEG4_AUDIO);
        assert!(m4a.conforms_to(TypeIdentifier::AUDIO));
        assert!(!m4a.conforms_to(TypeIdentifier::MOVIE));
        assert!(TypeIdentifier::new(TypeIdentifier::AVIF).conforms_to(TypeIdentifier::IMAGE));
    }

    #[test]
    fn test_bmp_needs_dib_header() {
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0x3A, 0, 0, 0, 0, 0, 0, 0, 0x36, 0, 0, 0]);
        bmp.extend_from_slice(&40u32.to_le_bytes());
        assert_eq!(
            TypeIdentifier::from_magic(&bmp),
            Some(TypeIdentifier::new(TypeIdentifier::BMP))
        );

        assert_eq!(TypeIdentifier::from_magic(b"BMW service notes for March"), None);
        assert_eq!(TypeIdentifier::from_magic(b"BM short"), None);
    }

    #[tokio::test]
    async fn test_magic_bytes_beat_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("animation.jpg");
        tokio::fs::write(&path, b"GIF89a\x01\x00\x01\x00\x00\x00\x00;").await.unwrap();

        let resolved = SniffingTypeResolver::new().resolve(&path).await;
        assert_eq!(resolved, Some(TypeIdentifier::new(TypeIdentifier::GIF)));
    }

    #[tokio::test]
    async fn test_extension_fallback_for_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = SniffingTypeResolver::new();

        let missing_mov = temp_dir.path().join("clip.mov");
        assert_eq!(
            resolver.resolve(&missing_mov).await,
            Some(TypeIdentifier::new(TypeIdentifier::QUICKTIME))
        );

        let missing_unknown = temp_dir.path().join("blob");
        assert_eq!(resolver.resolve(&missing_unknown).await, None);
    }
}
