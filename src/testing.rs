//! In-memory `Remote` and `InventoryApi` fakes shared by the unit tests.
use crate::error::{Error, Result};
use crate::inventory::{Credentials, InventoryApi};
use crate::remote::{Remote, RemoteHead};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeRemote {
    files: HashMap<String, Vec<u8>>,
    failing_heads: HashSet<String>,
    failing_downloads: HashSet<String>,
    heads: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, content: &[u8]) -> Self {
        self.files.insert(url.to_string(), content.to_vec());
        self
    }

    pub fn failing_head(mut self, url: &str) -> Self {
        self.failing_heads.insert(url.to_string());
        self
    }

    pub fn failing_download(mut self, url: &str) -> Self {
        self.failing_downloads.insert(url.to_string());
        self
    }

    pub fn heads(&self) -> Vec<String> {
        self.heads.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

impl Remote for FakeRemote {
    async fn head(&self, url: &str) -> Result<RemoteHead> {
        self.heads.lock().unwrap().push(url.to_string());
        if self.failing_heads.contains(url) {
            return Err(Error::S3(format!("connection refused: {url}")));
        }
        Ok(match self.files.get(url) {
            Some(content) => RemoteHead {
                status: 200,
                content_length: Some(content.len() as u64),
            },
            None => RemoteHead {
                status: 404,
                content_length: None,
            },
        })
    }

    async fn download(&self, url: &str, dst: &Path) -> Result<u64> {
        self.downloads.lock().unwrap().push(url.to_string());
        if self.failing_downloads.contains(url) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        let content = self.files.get(url).ok_or_else(|| Error::Download {
            url: url.to_string(),
            status: 404,
        })?;
        fs::write(dst, content)?;
        Ok(content.len() as u64)
    }
}

#[derive(Default)]
pub struct FakeInventory {
    denied: Option<String>,
    urls: Vec<String>,
    logins: Mutex<Vec<String>>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls(mut self, urls: &[&str]) -> Self {
        self.urls = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn denying(mut self, message: &str) -> Self {
        self.denied = Some(message.to_string());
        self
    }

    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

impl InventoryApi for FakeInventory {
    async fn login(&self, credentials: &Credentials) -> Result<String> {
        self.logins.lock().unwrap().push(credentials.username.clone());
        match &self.denied {
            Some(message) => Err(Error::InventoryAccessMissing(message.clone())),
            None => Ok("api-key".to_string()),
        }
    }

    async fn download_urls(
        &self,
        _dataset: &str,
        _node: &str,
        scenes: &[String],
        _api_key: &str,
    ) -> Result<Vec<String>> {
        self.requests.lock().unwrap().push(scenes.to_vec());
        Ok(self.urls.clone())
    }
}
