//! Scene identifier resolution for Landsat-8 and Sentinel-2.
//!
//! A Landsat-8 scene id such as `LC80030172015001LGN00` is fixed width and is
//! sliced positionally. A Sentinel-2 scene name such as
//! `S2A_OPER_MSI_L1C_TL_SGS__20160325T150955_A003951_T34RCS_N02.01` is split on
//! underscores and read from the end to build the `tiles/...` path used on S3.
use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

const LANDSAT_ID_LEN: usize = 21;
const SENTINEL_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Landsat8,
    Sentinel2,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Landsat8 => "Landsat-8",
            Self::Sentinel2 => "Sentinel-2",
        }
    }

    pub fn resolve(&self, scene: &str) -> Result<SceneDescriptor> {
        match self {
            Self::Landsat8 => resolve_landsat(scene),
            Self::Sentinel2 => resolve_sentinel(scene),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneDescriptor {
    Landsat8(LandsatScene),
    Sentinel2(SentinelTile),
}

impl SceneDescriptor {
    pub fn family(&self) -> Family {
        match self {
            Self::Landsat8(_) => Family::Landsat8,
            Self::Sentinel2(_) => Family::Sentinel2,
        }
    }
}

/// Path/row anatomy of a Landsat-8 scene id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandsatScene {
    /// `L` followed by the satellite digit, e.g. `L8`
    pub sat: String,
    pub path: String,
    pub row: String,
    pub scene: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelTile {
    pub path: String,
}

pub fn resolve_landsat(scene: &str) -> Result<SceneDescriptor> {
    if scene.len() != LANDSAT_ID_LEN || !scene.is_ascii() {
        return Err(Error::InvalidSceneId(scene.to_string()));
    }

    Ok(SceneDescriptor::Landsat8(LandsatScene {
        sat: format!("L{}", &scene[2..3]),
        path: scene[3..6].to_string(),
        row: scene[6..9].to_string(),
        scene: scene.to_string(),
    }))
}

pub fn resolve_sentinel(scene: &str) -> Result<SceneDescriptor> {
    // Already an S3 tile path
    if scene.contains("tiles") {
        return Ok(SceneDescriptor::Sentinel2(SentinelTile {
            path: scene.to_string(),
        }));
    }

    let invalid = || Error::InvalidSceneId(scene.to_string());

    let parts: Vec<&str> = scene.split('_').collect();
    if parts.len() < 4 {
        return Err(invalid());
    }
    let n = parts.len();

    let version = parse_version(parts[n - 1]).ok_or_else(invalid)?;
    let (utm, lat_band, square) = parse_grid(parts[n - 2]).ok_or_else(invalid)?;
    let timestamp =
        NaiveDateTime::parse_from_str(parts[n - 4], SENTINEL_TIMESTAMP_FORMAT).map_err(|_| invalid())?;

    let path = format!(
        "tiles/{}/{}/{}/{}/{}/{}/{}",
        utm,
        lat_band,
        square,
        timestamp.year(),
        timestamp.month(),
        timestamp.day(),
        version
    );

    Ok(SceneDescriptor::Sentinel2(SentinelTile { path }))
}

/// `N02.01` encodes version 0; the S3 layout counts versions from zero.
fn parse_version(token: &str) -> Option<u32> {
    let minor = token.strip_prefix('N')?.split('.').nth(1)?;
    minor.parse::<u32>().ok()?.checked_sub(1)
}

/// Splits an MGRS token like `T34RCS` into zone `34`, latitude band `R` and
/// grid square `CS`.
fn parse_grid(token: &str) -> Option<(u8, char, &str)> {
    let grid = token.strip_prefix('T')?;
    let digits = grid.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 2 {
        return None;
    }
    let utm: u8 = grid[..digits].parse().ok()?;

    let rest = &grid[digits..];
    let mut chars = rest.chars();
    let lat_band = chars.next().filter(|c| c.is_ascii_uppercase())?;
    let square = chars.as_str();
    if square.len() != 2 || !square.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }

    Some((utm, lat_band, square))
}
