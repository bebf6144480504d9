//! Provider attempts shared by the Landsat-8 and Sentinel-2 downloaders.
use crate::error::{Error, Result};
use crate::fetch::{check_create_folder, fetch};
use crate::remote::{remote_file_exists, Remote};
use crate::scene::{Scene, SceneCollection};
use crate::scene_id::{Family, SceneDescriptor};
use crate::url_builder::{build_url, Endpoints};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProviderKind {
    Amazon,
    Google,
    Inventory,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Amazon => "AWS S3",
            Self::Google => "Google Storage",
            Self::Inventory => "USGS Earth Explorer",
        };
        write!(f, "{name}")
    }
}

/// Outcome of trying one provider for one scene. Fatal problems are returned
/// as `Err` instead.
#[derive(Debug)]
pub enum Attempt {
    Fetched(Scene),
    NotFound(String),
}

impl Attempt {
    /// Turns a failed existence probe into `NotFound`, leaving every other
    /// error fatal.
    pub fn from_probe(result: Result<()>) -> Result<Option<Attempt>> {
        match result {
            Ok(()) => Ok(None),
            Err(e @ Error::RemoteNotFound { .. }) => Ok(Some(Attempt::NotFound(e.to_string()))),
            Err(e) => Err(e),
        }
    }
}

/// How a satellite family maps a scene onto the Amazon buckets.
#[derive(Clone, Copy)]
pub struct S3Capability {
    pub resolve: fn(&str) -> Result<SceneDescriptor>,
    pub build_url: fn(&Endpoints, &SceneDescriptor, &str) -> Result<String>,
}

impl Family {
    pub fn s3_capability(&self) -> S3Capability {
        let resolve: fn(&str) -> Result<SceneDescriptor> = match self {
            Family::Landsat8 => crate::scene_id::resolve_landsat,
            Family::Sentinel2 => crate::scene_id::resolve_sentinel,
        };
        S3Capability {
            resolve,
            build_url: amazon_url,
        }
    }
}

fn amazon_url(endpoints: &Endpoints, descriptor: &SceneDescriptor, band: &str) -> Result<String> {
    build_url(endpoints, descriptor, band, ProviderKind::Amazon)
}

/// Scene ids given as tile paths become flat folder names.
pub fn scene_folder(scene: &str) -> String {
    scene.replace('/', "_")
}

/// Fetches every band of `scene` from S3 into its own folder, after making
/// sure all of them exist.
pub async fn fetch_from_s3(
    capability: S3Capability,
    remote: &impl Remote,
    endpoints: &Endpoints,
    scene: &str,
    bands: &[String],
    download_dir: &Path,
) -> Result<Attempt> {
    let descriptor = (capability.resolve)(scene)?;

    let urls = bands
        .iter()
        .map(|band| (capability.build_url)(endpoints, &descriptor, band))
        .collect::<Result<Vec<_>>>()?;

    for url in &urls {
        if let Some(not_found) = Attempt::from_probe(remote_file_exists(remote, url).await)? {
            debug!(scene, url = %url, "Band missing on S3");
            return Ok(not_found);
        }
    }

    info!(scene, "Source: {}", ProviderKind::Amazon);
    let folder = check_create_folder(download_dir.join(scene_folder(scene)))?;

    let mut files = vec![];
    for url in &urls {
        files.push(fetch(remote, url, &folder).await?);
    }

    Ok(Attempt::Fetched(Scene::with_files(scene, files)))
}

#[derive(Debug)]
pub struct SceneFailure {
    pub scene: String,
    pub error: Error,
}

/// Scenes fetched by a batch together with the scenes that failed.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub scenes: SceneCollection,
    pub failures: Vec<SceneFailure>,
}

impl BatchReport {
    pub fn record(&mut self, scene: &str, result: Result<Scene>) {
        match result {
            Ok(fetched) => self.scenes.add(fetched),
            Err(error) => self.failures.push(SceneFailure {
                scene: scene.to_string(),
                error,
            }),
        }
    }

    /// Extracts the archived scenes. Scenes that fail to extract stay in the
    /// collection and are also recorded as failures.
    pub fn unzip_all(&mut self) {
        for (scene, error) in self.scenes.unzip_all() {
            self.failures.push(SceneFailure { scene, error });
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// All scenes, or the first failure of the batch.
    pub fn into_result(self) -> Result<SceneCollection> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.scenes),
        }
    }
}
