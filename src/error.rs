use crate::provider::ProviderKind;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Received incorrect scene id: {0}")]
    InvalidSceneId(String),

    #[error("Band provided is not correct: {0}")]
    InvalidBand(String),

    #[error("{provider} has no url convention for {family}")]
    UnsupportedProvider {
        provider: ProviderKind,
        family: &'static str,
    },

    #[error("Remote file does not exist: {url}{}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    RemoteNotFound { url: String, status: Option<u16> },

    #[error("{scene} not available on {}", join_providers(.providers))]
    RemoteFileDoesntExist {
        scene: String,
        providers: Vec<ProviderKind>,
    },

    #[error("User does not have access to the inventory service: {0}")]
    InventoryAccessMissing(String),

    #[error("Inventory service error: {0}")]
    Inventory(String),

    #[error("Scene {0} does not have an archive file associated with it")]
    NotArchived(String),

    #[error("Unable to extract {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Unable to derive a file name from url: {0}")]
    InvalidUrl(String),

    #[error("Error reading size of remote object: {0}")]
    MissingContentLength(String),

    #[error("Download of {url} failed with status {status}")]
    Download { url: String, status: u16 },

    #[error("S3 request failed: {0}")]
    S3(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn join_providers(providers: &[ProviderKind]) -> String {
    if providers.is_empty() {
        return "any provider".to_string();
    }
    providers
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" - ")
}
