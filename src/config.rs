use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::export::ExportOptions;
use crate::library::{MediaDirectory, MediaLibrary};

/// Configuration for the media exporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Media library location
    pub library: LibraryConfig,

    /// Default export settings
    #[serde(default)]
    pub export: ExportOptions,

    /// Performance and resource settings
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root directory of the media library
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of concurrent exports
    pub max_workers: usize,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "media-exporter.toml",
            "config/media-exporter.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config file {}: {}", path, e))?;
        Ok(toml::from_str(&config_str)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(root) = std::env::var("MEDIA_EXPORTER_LIBRARY") {
            config.library.root = PathBuf::from(root);
        }

        if let Ok(max_size) = std::env::var("MEDIA_EXPORTER_MAX_IMAGE_SIZE") {
            config.export.max_image_dimension = Some(
                max_size
                    .parse()
                    .map_err(|e| anyhow!("Invalid MEDIA_EXPORTER_MAX_IMAGE_SIZE {}: {}", max_size, e))?,
            );
        }

        if let Ok(strip) = std::env::var("MEDIA_EXPORTER_STRIP_GEOLOCATION") {
            config.export.strip_geolocation = matches!(strip.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Ok(directory) = std::env::var("MEDIA_EXPORTER_DIRECTORY") {
            config.export.directory = directory.parse::<MediaDirectory>().map_err(|e| anyhow!(e))?;
        }

        if let Ok(workers) = std::env::var("MEDIA_EXPORTER_WORKERS") {
            config.performance.max_workers = workers
                .parse()
                .map_err(|e| anyhow!("Invalid MEDIA_EXPORTER_WORKERS {}: {}", workers, e))?;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.export.max_image_dimension == Some(0) {
            return Err(anyhow!("max_image_dimension must be greater than 0"));
        }

        if !self.library.root.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.library.root) {
                return Err(anyhow!("Cannot create media library directory: {}", e));
            }
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    pub fn media_library(&self) -> MediaLibrary {
        MediaLibrary::new(&self.library.root)
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Media Exporter Configuration:\n\
            - Library: {}\n\
            - Directory: {}\n\
            - Max Image Size: {}\n\
            - Strip Geolocation: {}\n\
            - Workers: {}",
            self.library.root.display(),
            self.export.directory,
            self.export
                .max_image_dimension
                .map(|px| format!("{}px", px))
                .unwrap_or_else(|| "unlimited".to_string()),
            self.export.strip_geolocation,
            self.performance.max_workers,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: LibraryConfig {
                root: PathBuf::from("./media"),
            },
            export: ExportOptions::default(),
            performance: PerformanceConfig {
                max_workers: num_cpus::get().min(8), // Use available cores, max 8
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_library_root(mut self, root: PathBuf) -> Self {
        self.config.library.root = root;
        self
    }

    pub fn with_directory(mut self, directory: MediaDirectory) -> Self {
        self.config.export.directory = directory;
        self
    }

    pub fn with_max_image_dimension(mut self, max: u32) -> Self {
        self.config.export.max_image_dimension = Some(max);
        self
    }

    pub fn strip_geolocation(mut self, strip: bool) -> Self {
        self.config.export.strip_geolocation = strip;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.directory, MediaDirectory::Uploads);
        assert!(config.export.max_image_dimension.is_none());
        assert!(!config.export.strip_geolocation);
        assert!(config.performance.max_workers >= 1);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_workers(3)
            .with_max_image_dimension(2048)
            .with_directory(MediaDirectory::Cache)
            .strip_geolocation(true)
            .build();

        assert_eq!(config.performance.max_workers, 3);
        assert_eq!(config.export.max_image_dimension, Some(2048));
        assert_eq!(config.export.directory, MediaDirectory::Cache);
        assert!(config.export.strip_geolocation);
    }

    #[test]
    fn test_config_validation() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigBuilder::new()
            .with_library_root(temp_dir.path().join("media"))
            .build();
        assert!(config.validate().is_ok());
        assert!(temp_dir.path().join("media").exists());

        let zero_workers = ConfigBuilder::new()
            .with_library_root(temp_dir.path().to_path_buf())
            .with_workers(0)
            .build();
        assert!(zero_workers.validate().is_err());

        let zero_size = ConfigBuilder::new()
            .with_library_root(temp_dir.path().to_path_buf())
            .with_max_image_dimension(0)
            .build();
        assert!(zero_size.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("media-exporter.toml");
        let path = path.to_str().unwrap();

        let config = ConfigBuilder::new()
            .with_max_image_dimension(1024)
            .with_directory(MediaDirectory::Temporary)
            .build();
        config.save(path).unwrap();

        assert_eq!(Config::from_file(path).unwrap(), config);
    }

    #[test]
    fn test_export_section_is_optional() {
        let config: Config = toml::from_str(
            "[library]\nroot = \"/tmp/media\"\n\n[performance]\nmax_workers = 2\n",
        )
        .unwrap();
        assert_eq!(config.export, ExportOptions::default());
        assert_eq!(config.performance.max_workers, 2);
    }

    #[test]
    fn test_invalid_workers_env_is_an_error() {
        // Only test touching this variable
        std::env::set_var("MEDIA_EXPORTER_WORKERS", "lots");
        let invalid = Config::from_env();
        std::env::set_var("MEDIA_EXPORTER_WORKERS", "3");
        let valid = Config::from_env();
        std::env::remove_var("MEDIA_EXPORTER_WORKERS");

        let error = invalid.unwrap_err();
        assert!(error.to_string().contains("MEDIA_EXPORTER_WORKERS"));
        assert_eq!(valid.unwrap().performance.max_workers, 3);
    }
}
