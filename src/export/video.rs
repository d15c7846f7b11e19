use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{VideoExport, VideoExportOptions, VideoExporter};
use crate::library::MediaLibrary;

/// Container used when the export filename has no extension
const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Stream details read back from an exported video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoProbe {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<Duration>,
}

impl VideoProbe {
    /// Parse `ffprobe -print_format json -show_format -show_streams` output
    pub fn from_ffprobe_json(json: &str) -> Result<Self> {
        let data: serde_json::Value = serde_json::from_str(json)?;

        let video_stream = data["streams"]
            .as_array()
            .and_then(|streams| streams.iter().find(|s| s["codec_type"] == "video"));

        let width = video_stream
            .and_then(|s| s["width"].as_u64())
            .map(|w| w as u32);
        let height = video_stream
            .and_then(|s| s["height"].as_u64())
            .map(|h| h as u32);

        let duration = data["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);

        Ok(Self { width, height, duration })
    }
}

/// Remuxes videos into the library with FFmpeg
#[derive(Debug, Clone)]
pub struct FfmpegVideoExporter {
    library: MediaLibrary,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegVideoExporter {
    pub fn new(library: MediaLibrary) -> Self {
        Self {
            library,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    /// Use specific `ffmpeg` / `ffprobe` executables
    pub fn with_tools(mut self, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    fn remux_args(source: &Path, destination: &Path, strip_geolocation: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-v", "error", "-y", "-i"].iter().map(OsString::from).collect();
        args.push(source.as_os_str().to_owned());
        args.extend(["-c", "copy"].iter().map(OsString::from));
        if strip_geolocation {
            // Location lives in container metadata
            args.extend(["-map_metadata", "-1"].iter().map(OsString::from));
        }
        args.push(destination.as_os_str().to_owned());
        args
    }

    /// Read dimensions and duration of a video file
    pub async fn probe(&self, video_path: &Path) -> Result<VideoProbe> {
        let output = tokio::process::Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(video_path)
            .output()
            .await
            .context("Failed to launch ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", video_path.display()));
        }

        let json_str = String::from_utf8(output.stdout)?;
        VideoProbe::from_ffprobe_json(&json_str)
    }
}

#[async_trait]
impl VideoExporter for FfmpegVideoExporter {
    async fn export_video(&self, source: &Path, options: &VideoExportOptions) -> Result<VideoExport> {
        let extension = Path::new(&options.export_filename)
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_VIDEO_EXTENSION.to_string());

        let staged = self.library.stage(options.directory, &extension).await?;

        info!("🎬 Exporting video {}", source.display());

        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(Self::remux_args(source, staged.path(), options.strip_geolocation))
            .output()
            .await
            .context("Failed to launch ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("ffmpeg failed for {}: {}", source.display(), stderr.trim()));
        }

        let path = self
            .library
            .commit(staged, &options.export_filename, &extension, options.directory)
            .await?;
        let file_size = tokio::fs::metadata(&path).await?.len();

        let probe = match self.probe(&path).await {
            Ok(probe) => probe,
            Err(e) => {
                warn!("Could not probe {}: {}", path.display(), e);
                VideoProbe::default()
            }
        };

        debug!("Probed {}: {:?}", path.display(), probe);
        info!("✅ Exported video: {} ({} bytes)", path.display(), file_size);

        Ok(VideoExport {
            path,
            file_size,
            width: probe.width,
            height: probe.height,
            duration: probe.duration,
        })
    }
}
