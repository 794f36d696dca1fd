//! REST implementation of the storage gateway.

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use tracing::debug;

use super::error::GatewayError;
use super::gateway::{GatewayResult, MoveTarget, StorageGateway};
use crate::config::BrowserConfig;
use crate::error::Result;
use crate::fs::{Download, Entry, RemotePath, UploadFile};
use crate::http::HttpClient;

const FILES: &[&str] = &["api", "storage", "files"];
const FILE: &[&str] = &["api", "storage", "file"];
const DIR: &[&str] = &["api", "storage", "dir"];
const LOAD: &[&str] = &["api", "storage", "load"];

/// Storage gateway speaking the service's `/api/storage` REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: HttpClient,
}

impl HttpGateway {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self { http }
    }

    async fn move_one(
        &self,
        path: &RemotePath,
        name: &str,
        target: &MoveTarget,
    ) -> GatewayResult<Entry> {
        let url = self.http.url(FILE, path, Some(name));
        let request = self
            .http
            .request(Method::PUT, url)
            .query(&[("target", target.as_wire())]);
        Ok(self.http.send(request).await?.json().await?)
    }
}

#[async_trait]
impl StorageGateway for HttpGateway {
    async fn list(&self, path: &RemotePath) -> GatewayResult<Vec<Entry>> {
        let url = self.http.url(FILES, path, None);
        let response = self.http.send(self.http.request(Method::GET, url)).await?;
        Ok(response.json().await?)
    }

    async fn create_directory(&self, path: &RemotePath, name: &str) -> GatewayResult<Entry> {
        let url = self.http.url(DIR, path, None);
        let request = self.http.request(Method::POST, url).query(&[("name", name)]);
        match self.http.send(request).await {
            Ok(response) => Ok(response.json().await?),
            Err(err) => Err(as_conflict(err, name)),
        }
    }

    async fn upload_batch(
        &self,
        path: &RemotePath,
        files: &[UploadFile],
    ) -> GatewayResult<Vec<Entry>> {
        let form = files.iter().fold(Form::new(), |form, file| {
            form.part(
                "files",
                Part::bytes(file.data.clone()).file_name(file.name.clone()),
            )
        });
        let url = self.http.url(FILES, path, None);
        debug!(path = %path, count = files.len(), "uploading batch");
        let response = self
            .http
            .send(self.http.request(Method::POST, url).multipart(form))
            .await?;
        Ok(response.json().await?)
    }

    async fn move_entries(
        &self,
        path: &RemotePath,
        names: &[String],
        target: &MoveTarget,
    ) -> GatewayResult<Vec<Entry>> {
        let mut moved = Vec::with_capacity(names.len());
        for name in names {
            let entry = self
                .move_one(path, name, target)
                .await
                .map_err(|err| attribute(err, name))?;
            moved.push(entry);
        }
        Ok(moved)
    }

    async fn rename(&self, path: &RemotePath, name: &str, new_name: &str) -> GatewayResult<Entry> {
        let url = self.http.url(FILE, path, Some(name));
        let request = self
            .http
            .request(Method::PATCH, url)
            .query(&[("name", new_name)]);
        match self.http.send(request).await {
            Ok(response) => Ok(response.json().await?),
            Err(err) => Err(as_conflict(err, new_name)),
        }
    }

    async fn delete_one(&self, path: &RemotePath, name: &str) -> GatewayResult<()> {
        let url = self.http.url(FILE, path, Some(name));
        self.http.send(self.http.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn delete_many(&self, path: &RemotePath, names: &[String]) -> GatewayResult<()> {
        for name in names {
            self.delete_one(path, name)
                .await
                .map_err(|err| attribute(err, name))?;
        }
        Ok(())
    }

    async fn download(&self, path: &RemotePath, name: &str) -> GatewayResult<Download> {
        let url = self.http.url(LOAD, path, Some(name));
        let response = self.http.send(self.http.request(Method::GET, url)).await?;
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(declared_filename)
            .unwrap_or_else(|| name.to_string());
        let data = response.bytes().await?.to_vec();
        Ok(Download { filename, data })
    }
}

/// Pin a validation failure inside a batch to the item that caused it.
fn attribute(err: GatewayError, name: &str) -> GatewayError {
    match err {
        GatewayError::Validation { message, name: None } => GatewayError::Validation {
            message,
            name: Some(name.to_string()),
        },
        other => other,
    }
}

/// The service reports name collisions as plain validation failures.
fn as_conflict(err: GatewayError, name: &str) -> GatewayError {
    match err {
        GatewayError::Validation { ref message, .. } if message.contains("already exists") => {
            GatewayError::Conflict {
                name: name.to_string(),
            }
        }
        other => other,
    }
}

/// Filename from a `Content-Disposition` header.
///
/// Prefers the RFC 5987 `filename*=UTF-8''...` form.
fn declared_filename(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').map(str::trim) {
        if let Some(value) = param.strip_prefix("filename*=") {
            let encoded = value.split_once("''").map_or(value, |(_, v)| v);
            if let Ok(decoded) = percent_decode_str(encoded).decode_utf8() {
                return Some(decoded.into_owned());
            }
        } else if let Some(value) = param.strip_prefix("filename=") {
            plain = Some(value.trim_matches('"').to_string());
        }
    }
    plain.filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_filename() {
        assert_eq!(
            declared_filename("attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"),
            Some("résumé.pdf".to_string())
        );
        assert_eq!(
            declared_filename("attachment; filename=\"docs.zip\""),
            Some("docs.zip".to_string())
        );
        assert_eq!(
            declared_filename("attachment; filename=\"a.txt\"; filename*=UTF-8''b.txt"),
            Some("b.txt".to_string())
        );
        assert_eq!(declared_filename("inline"), None);
    }

    #[test]
    fn test_attribute_pins_name() {
        let err = attribute(GatewayError::validation("Invalid target folder"), "b.txt");
        assert_eq!(err.rejected_name(), Some("b.txt"));

        let named = attribute(GatewayError::invalid_name("c.txt", "bad"), "b.txt");
        assert_eq!(named.rejected_name(), Some("c.txt"));

        assert_eq!(attribute(GatewayError::NotFound, "b.txt"), GatewayError::NotFound);
    }

    #[test]
    fn test_as_conflict() {
        let err = as_conflict(
            GatewayError::validation("File with name 'x' already exists"),
            "x",
        );
        assert_eq!(err, GatewayError::Conflict { name: "x".into() });

        let other = as_conflict(GatewayError::validation("Invalid name for a file"), "x");
        assert!(matches!(other, GatewayError::Validation { .. }));
    }

    #[test]
    fn test_gateway_creation() {
        assert!(HttpGateway::new(&BrowserConfig::default()).is_ok());
    }
}
