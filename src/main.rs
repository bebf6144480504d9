use anyhow::{anyhow, Result};
use clap::Parser;
use sdownloader::config::DownloadConfig;
use sdownloader::inventory::{Credentials, UsgsInventory};
use sdownloader::remote::{HttpRemote, Transport};
use sdownloader::s3::S3Remote;
use sdownloader::{BatchReport, Family, Landsat8, Sentinel2};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Download Landsat-8 and Sentinel-2 scenes from Amazon S3, Google Storage or
/// the USGS inventory service.
#[derive(Parser, Debug)]
#[command(name = "sdownloader", version)]
struct Cli {
    /// TOML configuration file; command line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    satellite: Option<Family>,

    /// Scene ids, or tile paths for Sentinel-2
    scenes: Vec<String>,

    /// Comma separated bands, e.g. 4,3,2
    #[arg(short, long, value_delimiter = ',')]
    bands: Option<Vec<String>>,

    #[arg(short, long)]
    download_dir: Option<PathBuf>,

    #[arg(long, requires = "usgs_pass")]
    usgs_user: Option<String>,

    #[arg(long, requires = "usgs_user")]
    usgs_pass: Option<String>,

    /// Extract downloaded archives
    #[arg(long)]
    unzip: bool,

    /// Use the S3 API for Amazon urls
    #[arg(long)]
    s3_api: bool,

    /// Where to write the JSON report, defaults to <download_dir>/scenes.json
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<(DownloadConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => DownloadConfig::read(path)?,
            None => {
                let satellite = self
                    .satellite
                    .ok_or(anyhow!("A satellite is required without a config file"))?;
                DownloadConfig::new(satellite, PathBuf::from("./downloads"))
            }
        };

        if let Some(satellite) = self.satellite {
            config.satellite = satellite;
        }
        if !self.scenes.is_empty() {
            config.scenes = self.scenes;
        }
        if self.bands.is_some() {
            config.bands = self.bands;
        }
        if let Some(download_dir) = self.download_dir {
            config.download_dir = download_dir;
        }
        if let (Some(username), Some(password)) = (self.usgs_user, self.usgs_pass) {
            config.usgs = Some(Credentials { username, password });
        }
        config.unzip |= self.unzip;
        config.transport.s3_api |= self.s3_api;

        Ok((config, self.report))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (config, report_path) = Cli::parse().into_config()?;
    let scenes = config.scenes_to_download()?;

    let http = HttpRemote::with_timeout(Duration::from_secs(config.transport.timeout_secs))?;
    let s3 = config
        .transport
        .s3_api
        .then(|| S3Remote::new(&config.transport.region));
    let remote = Transport::new(http, s3);

    info!(
        satellite = config.satellite.name(),
        scenes = scenes.len(),
        dir = %config.download_dir.display(),
        "Starting download"
    );

    let bands = config.bands.as_deref();
    let mut report: BatchReport = match config.satellite {
        Family::Landsat8 => {
            let inventory = UsgsInventory::new(&config.endpoints.inventory)?;
            Landsat8::new(&config.download_dir, remote, inventory, config.usgs.clone())?
                .with_endpoints(config.endpoints.clone())
                .download(&scenes, bands)
                .await
        }
        Family::Sentinel2 => {
            Sentinel2::new(&config.download_dir, remote)?
                .with_endpoints(config.endpoints.clone())
                .download(&scenes, bands)
                .await
        }
    };

    if config.unzip {
        report.unzip_all();
    }

    let report_path = report_path.unwrap_or_else(|| config.download_dir.join("scenes.json"));
    report.scenes.write(&report_path)?;
    info!(report = %report_path.display(), "{}", report.scenes);

    for failure in &report.failures {
        error!(scene = %failure.scene, "{}", failure.error);
    }
    if !report.is_complete() {
        return Err(anyhow!(
            "{} of {} scenes failed",
            report.failures.len(),
            scenes.len()
        ));
    }

    Ok(())
}
