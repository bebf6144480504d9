//! Anonymous access to public S3 buckets through the AWS SDK.
use crate::error::{Error, Result};
use crate::remote::{Remote, RemoteHead};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use regex::Regex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_REGION: &str = "us-west-2";

#[derive(Debug, PartialEq)]
pub struct S3Object {
    pub region: Option<String>,
    pub bucket: String,
    pub key: String,
}

impl S3Object {
    /// Parses a virtual-hosted S3 url, with or without a region, e.g.
    /// `http://landsat-pds.s3.amazonaws.com/L8/003/017/...` or
    /// `https://bucket.s3.us-west-2.amazonaws.com/key`.
    pub fn from_url(url: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(
                r"^https?://(?<bucket>[\w-]+)\.s3(?:[.-](?<region>[\w-]+))?\.amazonaws\.com/(?<key>[^?]+)",
            )
            .expect("Regex pattern should always compile")
        });

        let captures = re.captures(url)?;
        Some(Self {
            region: captures.name("region").map(|m| m.as_str().to_string()),
            bucket: captures["bucket"].to_string(),
            key: captures["key"].to_string(),
        })
    }
}

pub async fn anon_client(region: &str) -> Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .no_credentials()
        .region(Region::new(region.to_string()))
        .load()
        .await;
    Client::new(&config)
}

/// `Remote` over the S3 API, used for urls that point at an S3 bucket.
/// Clients are created once per region and shared between clones.
#[derive(Debug, Clone)]
pub struct S3Remote {
    default_region: String,
    clients: Arc<Mutex<HashMap<String, Client>>>,
}

impl Default for S3Remote {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

impl S3Remote {
    pub fn new(default_region: &str) -> Self {
        Self {
            default_region: default_region.to_string(),
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn client(&self, region: &str) -> Client {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(region) {
            return client.clone();
        }
        let client = anon_client(region).await;
        clients.insert(region.to_string(), client.clone());
        client
    }

    async fn client_for(&self, url: &str) -> Result<(Client, S3Object)> {
        let object =
            S3Object::from_url(url).ok_or_else(|| Error::S3(format!("Not an S3 url: {url}")))?;
        let region = object.region.as_deref().unwrap_or(&self.default_region);
        let client = self.client(region).await;
        Ok((client, object))
    }
}

impl Remote for S3Remote {
    async fn head(&self, url: &str) -> Result<RemoteHead> {
        let (client, object) = self.client_for(url).await?;

        match client
            .head_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
        {
            Ok(head) => Ok(RemoteHead {
                status: 200,
                content_length: head.content_length().and_then(|l| u64::try_from(l).ok()),
            }),
            Err(SdkError::ServiceError(e)) => Ok(RemoteHead {
                status: e.raw().status().as_u16(),
                content_length: None,
            }),
            Err(e) => Err(Error::S3(e.to_string())),
        }
    }

    async fn download(&self, url: &str, dst: &Path) -> Result<u64> {
        let (client, object) = self.client_for(url).await?;

        let response = client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| Error::S3(e.to_string()))?;

        let partial = dst.with_extension(partial_extension(dst));
        let written = write_body(response.body, &partial).await;
        let byte_count = finish_partial(&partial, dst, written)?;
        debug!(bucket = %object.bucket, key = %object.key, bytes = byte_count, "S3 object stored");

        Ok(byte_count)
    }
}

async fn write_body(mut body: ByteStream, path: &Path) -> Result<u64> {
    let mut file = File::create(path)?;
    let mut byte_count = 0_u64;
    while let Some(bytes) = body.try_next().await.map_err(|e| Error::S3(e.to_string()))? {
        file.write_all(&bytes)?;
        byte_count += bytes.len() as u64;
    }
    file.flush()?;
    Ok(byte_count)
}

/// Extension of the temporary file a download is streamed into.
pub(crate) fn partial_extension(dst: &Path) -> String {
    match dst.extension() {
        Some(ext) => format!("{}.partial", ext.to_string_lossy()),
        None => "partial".to_string(),
    }
}

/// Moves a completed download into place, or removes what was written of a
/// failed one. Downloads always restart from scratch.
pub(crate) fn finish_partial(partial: &Path, dst: &Path, written: Result<u64>) -> Result<u64> {
    match written {
        Ok(byte_count) => {
            fs::rename(partial, dst)?;
            Ok(byte_count)
        }
        Err(e) => {
            if partial.exists() {
                if let Err(rm) = fs::remove_file(partial) {
                    warn!(path = %partial.display(), error = %rm, "Unable to remove partial download");
                }
            }
            Err(e)
        }
    }
}
