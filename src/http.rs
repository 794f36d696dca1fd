//! HTTP client wrapper for storage service requests.

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use tracing::debug;

use crate::api::GatewayError;
use crate::config::BrowserConfig;
use crate::error::{BrowserError, Result};
use crate::fs::RemotePath;

/// Error body returned by the service.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// HTTP client bound to one service origin and access token.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    authorization: Option<String>,
}

impl HttpClient {
    /// Create a client from configuration (timeout, proxy, token).
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| BrowserError::Config(format!("Invalid base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BrowserError::Config(format!(
                "Invalid base_url: {}",
                config.base_url
            )));
        }

        let mut builder = Client::builder().timeout(config.request_timeout());
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| BrowserError::Config(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| BrowserError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            authorization: config.authorization(),
        })
    }

    /// URL for `route` followed by the path segments and an optional name.
    ///
    /// Segments are percent-encoded individually.
    pub fn url(&self, route: &[&str], path: &RemotePath, name: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(route);
            segments.extend(path.segments());
            match name {
                Some(name) => {
                    segments.push(name);
                }
                None if path.is_root() => {
                    segments.push("");
                }
                None => {}
            }
        }
        url
    }

    /// Start a request with the authorization header attached.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.authorization {
            Some(auth) => builder.header("authorization", auth),
            None => builder,
        }
    }

    /// Send a request, turning non-success statuses into gateway errors.
    pub async fn send(&self, builder: RequestBuilder) -> std::result::Result<Response, GatewayError> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "storage response");

        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);
        Err(GatewayError::from_status(status.as_u16(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpClient {
        HttpClient::new(&BrowserConfig::default()).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let _client = client();
    }

    #[test]
    fn test_proxy_creation() {
        let config = BrowserConfig {
            proxy: Some("http://127.0.0.1:8080".to_string()),
            ..Default::default()
        };
        assert!(HttpClient::new(&config).is_ok());
    }

    #[test]
    fn test_proxy_invalid() {
        let config = BrowserConfig {
            proxy: Some(":::::::".to_string()),
            ..Default::default()
        };
        assert!(HttpClient::new(&config).is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let config = BrowserConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(HttpClient::new(&config), Err(BrowserError::Config(_))));
    }

    #[test]
    fn test_url_building() {
        let client = client();
        let root = client.url(&["api", "storage", "files"], &RemotePath::root(), None);
        assert_eq!(root.as_str(), "http://localhost:8080/api/storage/files/");

        let nested = client.url(
            &["api", "storage", "file"],
            &RemotePath::new(["my docs", "2024"]),
            Some("a#1.txt"),
        );
        assert_eq!(
            nested.as_str(),
            "http://localhost:8080/api/storage/file/my%20docs/2024/a%231.txt"
        );

        let dir = client.url(&["api", "storage", "dir"], &RemotePath::new(["x"]), None);
        assert_eq!(dir.as_str(), "http://localhost:8080/api/storage/dir/x");
    }
}
