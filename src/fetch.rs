use crate::error::{Error, Result};
use crate::remote::Remote;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Creates `folder_path` (and its parents) unless it already exists.
pub fn check_create_folder<P: AsRef<Path>>(folder_path: P) -> Result<PathBuf> {
    let folder_path = folder_path.as_ref();
    if !folder_path.exists() {
        fs::create_dir_all(folder_path)?;
    }
    Ok(folder_path.to_path_buf())
}

/// Last path segment of `url` without its query string.
pub fn filename_from_url(url: &str) -> Result<String> {
    let without_query = url.split('?').next().unwrap_or(url);
    match without_query.rsplit('/').next() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(Error::InvalidUrl(url.to_string())),
    }
}

pub async fn get_remote_file_size(remote: &impl Remote, url: &str) -> Result<u64> {
    remote
        .head(url)
        .await?
        .content_length
        .ok_or_else(|| Error::MissingContentLength(url.to_string()))
}

/// Downloads `url` into the directory `path` and returns the local file.
///
/// A local file with the same name whose size matches the remote
/// Content-Length is taken as already downloaded and is not fetched again.
pub async fn fetch(remote: &impl Remote, url: &str, path: &Path) -> Result<PathBuf> {
    let filename = filename_from_url(url)?;
    let dst = path.join(&filename);

    if dst.exists() {
        let local_size = fs::metadata(&dst)?.len();
        if remote.head(url).await?.content_length == Some(local_size) {
            info!("{} already exists on your system", filename);
            return Ok(dst);
        }
    }

    check_create_folder(path)?;
    let bytes = remote.download(url, &dst).await?;
    info!(bytes, "stored at {}", path.display());

    Ok(dst)
}
