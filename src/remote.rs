use crate::error::{Error, Result};
use crate::s3::{finish_partial, partial_extension, S3Object, S3Remote};
use futures_util::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Response};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Answer to a header-only request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteHead {
    pub status: u16,
    pub content_length: Option<u64>,
}

impl RemoteHead {
    pub fn exists(&self) -> bool {
        self.status == 200
    }
}

/// A place files can be probed and downloaded from.
pub trait Remote {
    async fn head(&self, url: &str) -> Result<RemoteHead>;

    /// Streams `url` into `dst`, returning the number of bytes written.
    async fn download(&self, url: &str, dst: &Path) -> Result<u64>;
}

/// Checks whether the remote file exists. Anything but a 200, including a
/// failed request, is reported as `RemoteNotFound`.
pub async fn remote_file_exists(remote: &impl Remote, url: &str) -> Result<()> {
    match remote.head(url).await {
        Ok(head) if head.exists() => Ok(()),
        Ok(head) => Err(Error::RemoteNotFound {
            url: url.to_string(),
            status: Some(head.status),
        }),
        Err(e) => {
            debug!(url, error = %e, "HEAD request failed");
            Err(Error::RemoteNotFound {
                url: url.to_string(),
                status: None,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
}

impl HttpRemote {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Remote for HttpRemote {
    async fn head(&self, url: &str) -> Result<RemoteHead> {
        let response = self.client.head(url).send().await?;

        // The header is read directly since HEAD responses carry no body
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        Ok(RemoteHead {
            status: response.status().as_u16(),
            content_length,
        })
    }

    async fn download(&self, url: &str, dst: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Download {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let partial = dst.with_extension(partial_extension(dst));
        let written = write_response(response, &partial).await;
        finish_partial(&partial, dst, written)
    }
}

async fn write_response(response: Response, path: &Path) -> Result<u64> {
    let mut file = File::create(path)?;
    let mut byte_count = 0_u64;
    let mut stream = response.bytes_stream();
    while let Some(bytes) = stream.next().await {
        let bytes = bytes?;
        file.write_all(&bytes)?;
        byte_count += bytes.len() as u64;
    }
    file.flush()?;
    Ok(byte_count)
}

/// Sends S3 bucket urls through the S3 API when enabled and everything else
/// over plain HTTP.
#[derive(Debug, Clone)]
pub struct Transport {
    http: HttpRemote,
    s3: Option<S3Remote>,
}

impl Transport {
    pub fn new(http: HttpRemote, s3: Option<S3Remote>) -> Self {
        Self { http, s3 }
    }

    fn uses_s3(&self, url: &str) -> Option<&S3Remote> {
        self.s3
            .as_ref()
            .filter(|_| S3Object::from_url(url).is_some())
    }
}

impl Remote for Transport {
    async fn head(&self, url: &str) -> Result<RemoteHead> {
        match self.uses_s3(url) {
            Some(s3) => s3.head(url).await,
            None => self.http.head(url).await,
        }
    }

    async fn download(&self, url: &str, dst: &Path) -> Result<u64> {
        match self.uses_s3(url) {
            Some(s3) => s3.download(url, dst).await,
            None => self.http.download(url, dst).await,
        }
    }
}
