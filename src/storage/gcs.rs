//! Google Cloud Storage backend over the JSON API

use super::traits::ObjectStore;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::pipeline::ArtifactLocation;
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use url::Url;

const API_BASE: &str = "https://storage.googleapis.com/storage/v1/";
const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1/";

pub struct GcsObjectStore {
    client: Client,
    access_token: Option<String>,
    api_base: Url,
    upload_base: Url,
}

impl GcsObjectStore {
    pub fn new(client: Client, access_token: Option<String>) -> CloudMakerResult<Self> {
        Self::with_endpoints(client, access_token, API_BASE, UPLOAD_BASE)
    }

    /// Point the client at another JSON API host (emulators)
    pub fn with_endpoints(
        client: Client,
        access_token: Option<String>,
        api_base: &str,
        upload_base: &str,
    ) -> CloudMakerResult<Self> {
        let parse = |raw: &str| {
            Url::parse(raw).map_err(|e| {
                CloudMakerError::ConfigError(format!("Invalid storage URL {}: {}", raw, e))
            })
        };
        Ok(Self {
            client,
            access_token,
            api_base: parse(api_base)?,
            upload_base: parse(upload_base)?,
        })
    }

    /// `{base}b/{bucket}/o/{name}` with the name encoded as a single segment
    fn object_url(&self, location: &ArtifactLocation) -> CloudMakerResult<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| CloudMakerError::Internal("Storage URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["b", location.bucket.as_str(), "o", location.name.as_str()]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn download(
        &self,
        location: &ArtifactLocation,
        destination: &Path,
    ) -> CloudMakerResult<()> {
        let fetch_failed = |e: String| CloudMakerError::FetchFailed(format!("{}: {}", location, e));

        let mut url = self.object_url(location)?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_failed(format!("storage responded {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fetch_failed(e.to_string()))?;
        }
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        Ok(())
    }

    async fn upload(&self, source: &Path, location: &ArtifactLocation) -> CloudMakerResult<()> {
        let upload_failed =
            |e: String| CloudMakerError::UploadFailed(format!("{}: {}", location, e));

        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| upload_failed(format!("{}: {}", source.display(), e)))?;

        let mut url = self.upload_base.clone();
        url.path_segments_mut()
            .map_err(|_| CloudMakerError::Internal("Storage URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["b", location.bucket.as_str(), "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &location.name);

        let response = self
            .authorize(self.client.post(url))
            .body(bytes)
            .send()
            .await
            .map_err(|e| upload_failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(upload_failed(format!("storage responded {}", response.status())));
        }
        Ok(())
    }

    async fn copy(&self, from: &ArtifactLocation, to: &ArtifactLocation) -> CloudMakerResult<()> {
        let mut url = self.object_url(from)?;
        url.path_segments_mut()
            .map_err(|_| CloudMakerError::Internal("Storage URL cannot be a base".into()))?
            .extend(["copyTo", "b", to.bucket.as_str(), "o", to.name.as_str()]);

        let response = self.authorize(self.client.post(url)).send().await?;
        if !response.status().is_success() {
            return Err(CloudMakerError::UploadFailed(format!(
                "{} -> {}: storage responded {}",
                from,
                to,
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_encodes_name_as_one_segment() {
        let store = GcsObjectStore::new(Client::new(), None).unwrap();
        let url = store
            .object_url(&ArtifactLocation::new("inputs", "cats/cat one.png"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/inputs/o/cats%2Fcat%20one.png"
        );
    }
}
