//! Landsat-8 downloader: Amazon S3 first when bands are requested, then the
//! Google Storage archive, then the USGS inventory service.
use crate::error::{Error, Result};
use crate::fetch::{check_create_folder, fetch};
use crate::inventory::{Credentials, InventoryApi, EARTH_EXPLORER_NODE, LANDSAT8_DATASET};
use crate::provider::{fetch_from_s3, Attempt, BatchReport, ProviderKind};
use crate::remote::{remote_file_exists, Remote};
use crate::scene::Scene;
use crate::scene_id::{resolve_landsat, Family, SceneDescriptor};
use crate::url_builder::{google_storage_url_landsat8, Endpoints};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Returns `bands` with the QA band and the MTL metadata appended when they
/// are missing.
pub fn with_required_bands(bands: &[String]) -> Vec<String> {
    let mut bands = bands.to_vec();
    if !bands.iter().any(|b| b == "QA" || b == "BQA") {
        bands.push("QA".to_string());
    }
    if !bands.iter().any(|b| b == "MTL") {
        bands.push("MTL".to_string());
    }
    bands
}

pub struct Landsat8<R, I> {
    download_dir: PathBuf,
    remote: R,
    inventory: I,
    credentials: Option<Credentials>,
    endpoints: Endpoints,
}

impl<R: Remote, I: InventoryApi> Landsat8<R, I> {
    /// Creates the downloader, making sure the download directory exists.
    pub fn new<P: AsRef<Path>>(
        download_dir: P,
        remote: R,
        inventory: I,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let download_dir = check_create_folder(download_dir)?;
        Ok(Self {
            download_dir,
            remote,
            inventory,
            credentials,
            endpoints: Endpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Downloads every scene in order. A scene that fails is recorded in the
    /// report and the batch moves on to the next one.
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

    /// Tries each provider in turn until one has the scene.
    pub async fn download_scene(&self, scene: &str, bands: Option<&[String]>) -> Result<Scene> {
        // Reject malformed ids before any request is made
        let descriptor = resolve_landsat(scene)?;

        let mut chain = vec![];
        if bands.is_some() {
            chain.push(ProviderKind::Amazon);
        }
        chain.push(ProviderKind::Google);
        chain.push(ProviderKind::Inventory);

        let mut tried = vec![];
        for provider in chain {
            tried.push(provider);
            let attempt = match provider {
                ProviderKind::Amazon => self.s3(scene, bands.unwrap_or_default()).await?,
                ProviderKind::Google => self.google(scene, &descriptor).await?,
                ProviderKind::Inventory => self.usgs(scene).await?,
            };
            match attempt {
                Attempt::Fetched(fetched) => return Ok(fetched),
                Attempt::NotFound(reason) => info!(scene, %provider, "{}", reason),
            }
        }

        Err(Error::RemoteFileDoesntExist {
            scene: scene.to_string(),
            providers: tried,
        })
    }

    /// Amazon S3 downloader. QA and MTL are always fetched with the bands.
    pub async fn s3(&self, scene: &str, bands: &[String]) -> Result<Attempt> {
        let bands = with_required_bands(bands);
        fetch_from_s3(
            Family::Landsat8.s3_capability(),
            &self.remote,
            &self.endpoints,
            scene,
            &bands,
            &self.download_dir,
        )
        .await
    }

    /// Google Storage downloader; the scene comes as a single archive.
    pub async fn google(&self, scene: &str, descriptor: &SceneDescriptor) -> Result<Attempt> {
        let SceneDescriptor::Landsat8(sat) = descriptor else {
            return Err(Error::InvalidSceneId(scene.to_string()));
        };
        let url = google_storage_url_landsat8(&self.endpoints, sat);

        if let Some(not_found) = Attempt::from_probe(remote_file_exists(&self.remote, &url).await)? {
            return Ok(not_found);
        }

        info!(scene, "Source: {}", ProviderKind::Google);
        let file = fetch(&self.remote, &url, &self.download_dir).await?;
        Ok(Attempt::Fetched(Scene::with_files(scene, [file])))
    }

    /// USGS inventory downloader, only used when credentials are configured.
    pub async fn usgs(&self, scene: &str) -> Result<Attempt> {
        let Some(credentials) = &self.credentials else {
            return Ok(Attempt::NotFound(
                "no USGS credentials configured".to_string(),
            ));
        };

        let api_key = self.inventory.login(credentials).await?;
        let urls = self
            .inventory
            .download_urls(
                LANDSAT8_DATASET,
                EARTH_EXPLORER_NODE,
                &[scene.to_string()],
                &api_key,
            )
            .await?;

        if urls.is_empty() {
            return Ok(Attempt::NotFound(format!(
                "{} has no download for {}",
                ProviderKind::Inventory,
                scene
            )));
        }

        info!(scene, "Source: {}", ProviderKind::Inventory);
        let mut files = vec![];
        for url in &urls {
            files.push(fetch(&self.remote, url, &self.download_dir).await?);
        }
        Ok(Attempt::Fetched(Scene::with_files(scene, files)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeInventory, FakeRemote};
    use tempfile::TempDir;

    const SCENE: &str = "LC80030172015001LGN00";
    const S3: &str = "http://landsat-pds.s3.amazonaws.com/L8/003/017/LC80030172015001LGN00";
    const GOOGLE: &str =
        "http://storage.googleapis.com/earthengine-public/landsat/L8/003/017/LC80030172015001LGN00.tar.bz";

    fn bands(list: &[&str]) -> Vec<String> {
        list.iter().map(|b| b.to_string()).collect()
    }

    fn s3_url(suffix: &str) -> String {
        format!("{S3}/{SCENE}_{suffix}")
    }

    fn amazon_remote() -> FakeRemote {
        ["B4.TIF", "B3.TIF", "B2.TIF", "BQA.TIF", "MTL.txt"]
            .iter()
            .fold(FakeRemote::new(), |remote, suffix| {
                remote.with_file(&s3_url(suffix), suffix.as_bytes())
            })
    }

    fn credentials() -> Option<Credentials> {
        Some(Credentials {
            username: "test".to_string(),
            password: "test".to_string(),
        })
    }

    #[test]
    fn test_with_required_bands() {
        let requested = bands(&["4", "3", "2"]);
        assert_eq!(with_required_bands(&requested), bands(&["4", "3", "2", "QA", "MTL"]));
        assert_eq!(requested, bands(&["4", "3", "2"]));
        assert_eq!(with_required_bands(&bands(&["BQA", "MTL"])), bands(&["BQA", "MTL"]));
    }

    #[tokio::test]
    async fn test_s3() {
        let temp = TempDir::new().unwrap();
        let landsat = Landsat8::new(temp.path(), amazon_remote(), FakeInventory::new(), None).unwrap();

        let report = landsat
            .download(&[SCENE.to_string()], Some(bands(&["4", "3", "2"]).as_slice()))
            .await;

        assert!(report.is_complete());
        let scene = report.scenes.get(SCENE).unwrap();
        assert_eq!(scene.files.len(), 5);
        assert!(scene.files.iter().all(|f| f.starts_with(temp.path().join(SCENE))));
        assert!(!landsat.remote.heads().iter().any(|u| u.contains("googleapis")));
        assert!(landsat.inventory.logins().is_empty());
    }

    #[tokio::test]
    async fn test_google_when_amazon_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let remote = FakeRemote::new().with_file(GOOGLE, b"archive");
        let landsat = Landsat8::new(temp.path(), remote, FakeInventory::new(), None).unwrap();

        let report = landsat
            .download(&[SCENE.to_string()], Some(bands(&["4", "3", "2"]).as_slice()))
            .await;

        let scene = report.scenes.get(SCENE).unwrap();
        assert!(scene.archived);
        assert_eq!(
            scene.archive_file,
            Some(temp.path().join(format!("{SCENE}.tar.bz")))
        );
        assert_eq!(landsat.remote.downloads(), vec![GOOGLE.to_string()]);
    }

    #[tokio::test]
    async fn test_google_without_bands_skips_amazon() {
        let temp = TempDir::new().unwrap();
        let remote = FakeRemote::new().with_file(GOOGLE, b"archive");
        let landsat = Landsat8::new(temp.path(), remote, FakeInventory::new(), None).unwrap();

        let scene = landsat.download_scene(SCENE, None).await.unwrap();

        assert!(scene.archived);
        assert_eq!(landsat.remote.heads(), vec![GOOGLE.to_string()]);
    }

    #[tokio::test]
    async fn test_usgs_as_last_resort() {
        let temp = TempDir::new().unwrap();
        let url = "https://dds.cr.usgs.gov/x/LC80030172015001LGN00.tar.gz?id=1";
        let remote = FakeRemote::new().with_file(url, b"archive");
        let inventory = FakeInventory::new().with_urls(&[url]);
        let landsat = Landsat8::new(temp.path(), remote, inventory, credentials()).unwrap();

        let scene = landsat.download_scene(SCENE, None).await.unwrap();

        assert_eq!(
            scene.archive_file,
            Some(temp.path().join("LC80030172015001LGN00.tar.gz"))
        );
        assert_eq!(landsat.inventory.requests(), vec![vec![SCENE.to_string()]]);
    }

    #[tokio::test]
    async fn test_usgs_access_denied_is_fatal() {
        let temp = TempDir::new().unwrap();
        let inventory = FakeInventory::new().denying("User does not have access");
        let landsat = Landsat8::new(temp.path(), FakeRemote::new(), inventory, credentials()).unwrap();

        let result = landsat.download_scene(SCENE, None).await;

        assert!(matches!(result, Err(Error::InventoryAccessMissing(_))));
        assert!(landsat.inventory.requests().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_providers() {
        let temp = TempDir::new().unwrap();
        let landsat =
            Landsat8::new(temp.path(), FakeRemote::new(), FakeInventory::new(), credentials()).unwrap();

        let report = landsat
            .download(&[SCENE.to_string()], Some(bands(&["4"]).as_slice()))
            .await;

        assert!(report.scenes.get(SCENE).is_none());
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0].error {
            Error::RemoteFileDoesntExist { scene, providers } => {
                assert_eq!(scene, SCENE);
                assert_eq!(
                    providers,
                    &vec![ProviderKind::Amazon, ProviderKind::Google, ProviderKind::Inventory]
                );
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_without_credentials() {
        let temp = TempDir::new().unwrap();
        let landsat = Landsat8::new(temp.path(), FakeRemote::new(), FakeInventory::new(), None).unwrap();

        let err = landsat.download_scene(SCENE, None).await.unwrap_err();

        assert!(err.to_string().contains(SCENE));
        assert!(landsat.inventory.logins().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_scene_makes_no_request() {
        let temp = TempDir::new().unwrap();
        let landsat = Landsat8::new(temp.path(), FakeRemote::new(), FakeInventory::new(), None).unwrap();

        let result = landsat
            .download_scene("LC80030172015001LGN", Some(bands(&["4"]).as_slice()))
            .await;

        assert!(matches!(result, Err(Error::InvalidSceneId(_))));
        assert!(landsat.remote.heads().is_empty());
    }

    #[tokio::test]
    async fn test_mid_download_failure_does_not_fall_back() {
        let temp = TempDir::new().unwrap();
        let remote = amazon_remote()
            .with_file(GOOGLE, b"archive")
            .failing_download(&s3_url("B3.TIF"));
        let landsat = Landsat8::new(temp.path(), remote, FakeInventory::new(), None).unwrap();

        let result = landsat
            .download_scene(SCENE, Some(bands(&["4", "3", "2"]).as_slice()))
            .await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!landsat.remote.heads().contains(&GOOGLE.to_string()));
    }

    #[tokio::test]
    async fn test_batch_keeps_fetched_scenes() {
        let temp = TempDir::new().unwrap();
        let remote = FakeRemote::new().with_file(GOOGLE, b"archive");
        let landsat = Landsat8::new(temp.path(), remote, FakeInventory::new(), None).unwrap();

        let report = landsat
            .download(&[SCENE.to_string(), "LC82050312014229LGN00".to_string()], None)
            .await;

        assert_eq!(report.scenes.names(), vec![SCENE]);
        assert_eq!(report.failures[0].scene, "LC82050312014229LGN00");
    }
}
