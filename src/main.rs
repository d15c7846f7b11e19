use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;
use walkdir::WalkDir;

use media_exporter::{BatchExporter, Config, MediaDirectory, MediaUrlExporter};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Media Exporter")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Export local images, videos and GIFs into a media library")
        .arg(
            Arg::new("inputs")
                .value_name("INPUT")
                .help("Files, directories or file:// URLs to export")
                .required(true)
                .num_args(1..)
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
        )
        .arg(
            Arg::new("library")
                .short('l')
                .long("library")
                .value_name("DIR")
                .help("Media library root directory")
        )
        .arg(
            Arg::new("directory")
                .short('d')
                .long("directory")
                .value_name("NAME")
                .help("Managed directory: uploads, cache or temporary")
                .value_parser(|s: &str| s.parse::<MediaDirectory>())
        )
        .arg(
            Arg::new("max-image-size")
                .short('m')
                .long("max-image-size")
                .value_name("PX")
                .help("Longest side allowed for exported images")
                .value_parser(clap::value_parser!(u32).range(1..))
        )
        .arg(
            Arg::new("strip-geolocation")
                .short('g')
                .long("strip-geolocation")
                .help("Remove location metadata from exports")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .help("Number of parallel exports")
                .value_parser(clap::value_parser!(usize))
        )
        .arg(
            Arg::new("report")
                .short('r')
                .long("report")
                .value_name("FILE")
                .help("Write a JSON report of the batch")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
        )
        .get_matches();

    let default_filter = if matches.get_flag("verbose") {
        "media_exporter=debug,warn"
    } else {
        "media_exporter=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(root) = matches.get_one::<String>("library") {
        config.library.root = PathBuf::from(root);
    }
    if let Some(directory) = matches.get_one::<MediaDirectory>("directory") {
        config.export.directory = *directory;
    }
    if let Some(max) = matches.get_one::<u32>("max-image-size") {
        config.export.max_image_dimension = Some(*max);
    }
    if matches.get_flag("strip-geolocation") {
        config.export.strip_geolocation = true;
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.performance.max_workers = *workers;
    }

    config.validate()?;
    info!("🚀 Media Exporter starting...");
    info!("{}", config.summary());

    let mut urls = Vec::new();
    for input in matches.get_many::<String>("inputs").into_iter().flatten() {
        urls.extend(input_urls(input)?);
    }
    info!("📁 {} inputs to export", urls.len());

    let exporter = Arc::new(MediaUrlExporter::new(config.media_library()));
    let batch = BatchExporter::new(exporter, config.performance.max_workers);
    let report = batch.export_all(urls, &config.export).await;

    for entry in &report.entries {
        match (&entry.outcome, &entry.error_message) {
            (Some(outcome), _) => println!("{}\t{}\t{} bytes", entry.source, outcome.path().display(), outcome.file_size()),
            (None, Some(message)) => println!("{}\t{}", entry.source, message),
            (None, None) => println!("{}", entry.source),
        }
    }

    if let Some(path) = matches.get_one::<String>("report") {
        report.save(Path::new(path)).await?;
    }

    info!("🎉 Export completed in {:.2}s", report.total_time.as_secs_f64());
    info!("✅ Successful: {}", report.succeeded);
    info!("❌ Failed: {}", report.failed);
    info!("📊 Success rate: {:.1}%", report.success_rate());

    if report.failed > 0 {
        error!("{} of {} exports failed", report.failed, report.total);
        return Err(anyhow!("{} exports failed", report.failed));
    }

    Ok(())
}

/// Turn a command line input into source URLs.
///
/// Strings that parse as URLs are passed through untouched so that
/// non-file schemes get rejected by the exporter itself.
fn input_urls(input: &str) -> Result<Vec<Url>> {
    if let Ok(url) = Url::parse(input) {
        // Single-letter schemes are Windows drive letters
        if url.scheme().len() > 1 {
            return Ok(vec![url]);
        }
    }

    let path = absolute_path(Path::new(input))?;
    if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(&path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        return files.iter().map(|file| file_url(file)).collect();
    }

    Ok(vec![file_url(&path)?])
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Cannot determine current directory")?;
    Ok(cwd.join(path))
}

fn file_url(path: &Path) -> Result<Url> {
    Url::from_file_path(path).map_err(|_| anyhow!("Cannot build a file URL for {}", path.display()))
}
