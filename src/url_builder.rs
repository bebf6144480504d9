use crate::error::{Error, Result};
use crate::provider::ProviderKind;
use crate::scene_id::{LandsatScene, SceneDescriptor, SentinelTile};
use serde::{Deserialize, Serialize};

pub const S3_LANDSAT: &str = "http://landsat-pds.s3.amazonaws.com/";
pub const S3_SENTINEL: &str = "http://sentinel-s2-l1c.s3.amazonaws.com/";
pub const GOOGLE: &str = "http://storage.googleapis.com/earthengine-public/landsat/";
pub const USGS_INVENTORY: &str = "https://earthexplorer.usgs.gov/inventory/json/v/1.4.1/";

pub const SENTINEL_FORMAT: &str = "jp2";

/// Base urls of every provider.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub landsat_s3: String,
    pub sentinel_s3: String,
    pub google: String,
    pub inventory: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            landsat_s3: S3_LANDSAT.to_string(),
            sentinel_s3: S3_SENTINEL.to_string(),
            google: GOOGLE.to_string(),
            inventory: USGS_INVENTORY.to_string(),
        }
    }
}

/// Removes one slash from the beginning and one from the end of a segment.
pub fn remove_slash(value: &str) -> &str {
    let value = value.strip_prefix('/').unwrap_or(value);
    value.strip_suffix('/').unwrap_or(value)
}

/// Joins segments with '/' to create a path or url. Empty segments are kept.
pub fn url_builder<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| remove_slash(s.as_ref()))
        .collect::<Vec<_>>()
        .join("/")
}

pub fn amazon_s3_url_landsat8(endpoints: &Endpoints, sat: &LandsatScene, band: &str) -> Result<String> {
    let filename = match band {
        "MTL" => format!("{}_MTL.txt", sat.scene),
        "QA" | "BQA" => format!("{}_BQA.TIF", sat.scene),
        b if !b.is_empty() && b.chars().all(|c| c.is_ascii_digit()) => {
            format!("{}_B{}.TIF", sat.scene, b)
        }
        _ => return Err(Error::InvalidBand(band.to_string())),
    };

    Ok(url_builder(&[
        endpoints.landsat_s3.as_str(),
        sat.sat.as_str(),
        sat.path.as_str(),
        sat.row.as_str(),
        sat.scene.as_str(),
        filename.as_str(),
    ]))
}

pub fn amazon_s3_url_sentinel2(
    endpoints: &Endpoints,
    tile: &SentinelTile,
    band: &str,
    format: &str,
) -> Result<String> {
    let band = match band {
        "8A" | "8a" => "8A".to_string(),
        b if !b.is_empty() && b.chars().all(|c| c.is_ascii_digit()) => {
            let number: u32 = b.parse().map_err(|_| Error::InvalidBand(band.to_string()))?;
            format!("{number:02}")
        }
        _ => return Err(Error::InvalidBand(band.to_string())),
    };

    let filename = format!("B{band}.{format}");
    Ok(url_builder(&[
        endpoints.sentinel_s3.as_str(),
        tile.path.as_str(),
        filename.as_str(),
    ]))
}

pub fn google_storage_url_landsat8(endpoints: &Endpoints, sat: &LandsatScene) -> String {
    let filename = format!("{}.tar.bz", sat.scene);
    url_builder(&[
        endpoints.google.as_str(),
        sat.sat.as_str(),
        sat.path.as_str(),
        sat.row.as_str(),
        filename.as_str(),
    ])
}

/// Builds the retrieval url of `descriptor` on `provider`. Google serves whole
/// scene archives, so `band` is ignored there.
pub fn build_url(
    endpoints: &Endpoints,
    descriptor: &SceneDescriptor,
    band: &str,
    provider: ProviderKind,
) -> Result<String> {
    match (provider, descriptor) {
        (ProviderKind::Amazon, SceneDescriptor::Landsat8(sat)) => {
            amazon_s3_url_landsat8(endpoints, sat, band)
        }
        (ProviderKind::Amazon, SceneDescriptor::Sentinel2(tile)) => {
            amazon_s3_url_sentinel2(endpoints, tile, band, SENTINEL_FORMAT)
        }
        (ProviderKind::Google, SceneDescriptor::Landsat8(sat)) => {
            Ok(google_storage_url_landsat8(endpoints, sat))
        }
        (provider, descriptor) => Err(Error::UnsupportedProvider {
            provider,
            family: descriptor.family().name(),
        }),
    }
}
