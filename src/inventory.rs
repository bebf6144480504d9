//! Client for the USGS inventory service, the last resort for Landsat-8.
use crate::error::{Error, Result};
use crate::remote::DEFAULT_TIMEOUT_SECS;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const LANDSAT8_DATASET: &str = "LANDSAT_8";
pub const EARTH_EXPLORER_NODE: &str = "EE";

#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

pub trait InventoryApi {
    /// Returns an api key for the session.
    async fn login(&self, credentials: &Credentials) -> Result<String>;

    /// Returns signed download urls for `scenes`; empty when the service has
    /// none of them.
    async fn download_urls(
        &self,
        dataset: &str,
        node: &str,
        scenes: &[String],
        api_key: &str,
    ) -> Result<Vec<String>>;
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
    error: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize, Debug)]
struct DownloadEntry {
    url: String,
}

#[derive(Debug, Clone)]
pub struct UsgsInventory {
    client: reqwest::Client,
    endpoint: Url,
}

impl UsgsInventory {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        // Url::join drops the last segment unless the base ends with a slash
        let endpoint = if endpoint.ends_with('/') {
            Url::parse(endpoint)?
        } else {
            Url::parse(&format!("{endpoint}/"))?
        };
        Ok(Self { client, endpoint })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse<T>> {
        let url = self.endpoint.join(method)?;
        debug!(url = %url, "Inventory request");
        let response = self
            .client
            .post(url)
            .form(&[("jsonRequest", body.to_string())])
            .send()
            .await?
            .json::<ApiResponse<T>>()
            .await?;
        Ok(response)
    }
}

impl InventoryApi for UsgsInventory {
    async fn login(&self, credentials: &Credentials) -> Result<String> {
        let response: ApiResponse<String> = self
            .request(
                "login",
                serde_json::json!({
                    "username": credentials.username,
                    "password": credentials.password,
                    "catalogId": EARTH_EXPLORER_NODE,
                }),
            )
            .await?;

        if let Some(code) = response.error_code {
            let message = fault_text(response.error.as_deref().unwrap_or(&code));
            if code.starts_with("AUTH_") {
                return Err(Error::InventoryAccessMissing(message));
            }
            return Err(Error::Inventory(message));
        }

        response
            .data
            .ok_or_else(|| Error::Inventory("login returned no api key".to_string()))
    }

    async fn download_urls(
        &self,
        dataset: &str,
        node: &str,
        scenes: &[String],
        api_key: &str,
    ) -> Result<Vec<String>> {
        let response: ApiResponse<Vec<DownloadEntry>> = self
            .request(
                "download",
                serde_json::json!({
                    "datasetName": dataset,
                    "node": node,
                    "entityIds": scenes,
                    "products": ["STANDARD"],
                    "apiKey": api_key,
                }),
            )
            .await?;

        if let Some(code) = response.error_code {
            return Err(Error::Inventory(fault_text(
                response.error.as_deref().unwrap_or(&code),
            )));
        }

        Ok(response
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.url)
            .collect())
    }
}

/// The service may wrap its messages in a SOAP fault; only the fault string
/// is kept in that case.
pub fn fault_text(message: &str) -> String {
    roxmltree::Document::parse(message)
        .ok()
        .and_then(|doc| {
            doc.descendants()
                .find(|n| n.has_tag_name("faultstring"))
                .and_then(|n| n.text())
                .map(|t| t.trim().to_string())
        })
        .unwrap_or_else(|| message.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOAP_FAULT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
    <SOAP-ENV:Body>
        <SOAP-ENV:Fault>
            <faultcode>SOAP-ENV:Server</faultcode>
            <faultstring>User credential denied</faultstring>
        </SOAP-ENV:Fault>
    </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    #[test]
    fn test_fault_text_from_soap() {
        assert_eq!(fault_text(SOAP_FAULT), "User credential denied");
    }

    #[test]
    fn test_fault_text_plain_message() {
        assert_eq!(fault_text(" Invalid username/password "), "Invalid username/password");
    }

    #[test]
    fn test_decode_login_error() {
        let body = r#"{"errorCode":"AUTH_UNAUTHORIZED","error":"User does not have access","data":null}"#;
        let response: ApiResponse<String> = serde_json::from_str(body).unwrap();
        assert_eq!(response.error_code.as_deref(), Some("AUTH_UNAUTHORIZED"));
        assert!(response.data.is_none());
    }

    #[test]
    fn test_decode_download_urls() {
        let body = r#"{"errorCode":null,"error":"","data":[{"entityId":"LC80030172015001LGN00","product":"STANDARD","url":"https://dds.cr.usgs.gov/x/LC80030172015001LGN00.tar.gz?id=1"}]}"#;
        let response: ApiResponse<Vec<DownloadEntry>> = serde_json::from_str(body).unwrap();
        let data = response.data.unwrap();
        assert_eq!(data.len(), 1);
        assert!(data[0].url.ends_with(".tar.gz?id=1"));
    }

    #[test]
    fn test_endpoint_gets_trailing_slash() {
        let inventory = UsgsInventory::new("https://earthexplorer.usgs.gov/inventory/json/v/1.4.1").unwrap();
        assert_eq!(
            inventory.endpoint.join("login").unwrap().as_str(),
            "https://earthexplorer.usgs.gov/inventory/json/v/1.4.1/login"
        );
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "user".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{credentials:?}").contains("secret"));
    }
}
