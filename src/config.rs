use crate::inventory::Credentials;
use crate::remote::DEFAULT_TIMEOUT_SECS;
use crate::s3::DEFAULT_REGION;
use crate::scene_id::Family;
use crate::url_builder::Endpoints;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DownloadConfig {
    pub satellite: Family,
    pub download_dir: PathBuf,
    #[serde(default)]
    pub scenes: Vec<String>,
    pub bands: Option<Vec<String>>,
    #[serde(default)]
    pub unzip: bool,
    pub usgs: Option<Credentials>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Send S3 bucket urls through the S3 API instead of plain HTTP
    pub s3_api: bool,
    pub region: String,
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            s3_api: false,
            region: DEFAULT_REGION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl DownloadConfig {
    pub fn new(satellite: Family, download_dir: PathBuf) -> Self {
        Self {
            satellite,
            download_dir,
            scenes: vec![],
            bands: None,
            unzip: false,
            usgs: None,
            endpoints: Endpoints::default(),
            transport: TransportConfig::default(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let config: Self = toml::from_str(&table.to_string())?;
        Ok(config)
    }

    /// Scene ids with duplicates removed, in the order first given.
    pub fn scenes_to_download(&self) -> Result<Vec<String>> {
        if self.scenes.is_empty() {
            return Err(anyhow!("No scenes to download"));
        }
        let mut seen = HashSet::new();
        let scenes = self
            .scenes
            .iter()
            .filter(|s| seen.insert(s.to_string()))
            .cloned()
            .collect();
        Ok(scenes)
    }
}
