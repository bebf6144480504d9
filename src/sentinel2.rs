//! Sentinel-2 downloader. Scenes are only served from Amazon S3, either by
//! scene name or by tile path (e.g. `tiles/34/R/CS/2016/3/25/0`).
use crate::error::{Error, Result};
use crate::fetch::check_create_folder;
use crate::provider::{fetch_from_s3, Attempt, BatchReport, ProviderKind};
use crate::remote::Remote;
use crate::scene::Scene;
use crate::scene_id::{resolve_sentinel, Family};
use crate::url_builder::Endpoints;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const BAND_MAP: [(&str, &str); 7] = [
    ("coastal", "1"),
    ("blue", "2"),
    ("green", "3"),
    ("red", "4"),
    ("nir", "8"),
    ("swir1", "11"),
    ("swir2", "12"),
];

/// Converts common band names into band numbers; anything else is kept as is.
pub fn band_converter(bands: &[String]) -> Vec<String> {
    bands
        .iter()
        .map(|band| {
            BAND_MAP
                .iter()
                .find(|(name, _)| *name == band.as_str())
                .map(|(_, number)| number.to_string())
                .unwrap_or_else(|| band.clone())
        })
        .collect()
}

pub struct Sentinel2<R> {
    download_dir: PathBuf,
    remote: R,
    endpoints: Endpoints,
}

impl<R: Remote> Sentinel2<R> {
    pub fn new<P: AsRef<Path>>(download_dir: P, remote: R) -> Result<Self> {
        let download_dir = check_create_folder(download_dir)?;
        Ok(Self {
            download_dir,
            remote,
            endpoints: Endpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub async fn download(&self, scenes: &[String], bands: Option<&[String]>) -> BatchReport {
        let mut report = BatchReport::default();
        for scene in scenes {
            let result = self.download_scene(scene, bands).await;
            if let Err(e) = &result {
                warn!(scene = %scene, error = %e, "Scene download failed");
            }
            report.record(scene, result);
        }
        report
    }

    /// There is no fallback for Sentinel-2: a missing band ends the scene.
    pub async fn download_scene(&self, scene: &str, bands: Option<&[String]>) -> Result<Scene> {
        resolve_sentinel(scene)?;
        let Some(bands) = bands else {
            return Err(Error::RemoteFileDoesntExist {
                scene: scene.to_string(),
                providers: vec![],
            });
        };
        let bands = band_converter(bands);

        let attempt = fetch_from_s3(
            Family::Sentinel2.s3_capability(),
            &self.remote,
            &self.endpoints,
            scene,
            &bands,
            &self.download_dir,
        )
        .await?;

        match attempt {
            Attempt::Fetched(fetched) => Ok(fetched),
            Attempt::NotFound(reason) => {
                info!(scene, "{}", reason);
                Err(Error::RemoteFileDoesntExist {
                    scene: scene.to_string(),
                    providers: vec![ProviderKind::Amazon],
                })
            }
        }
    }
}
