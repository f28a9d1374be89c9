use super::types::{
    AnnotateImageResponse, CropHintsAnnotation, EntityAnnotation, FaceAnnotation,
    SafeSearchAnnotation,
};
use super::AnnotationService;
use crate::app_log;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::pipeline::ArtifactLocation;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct BatchAnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

/// Client for the Cloud Vision `images:annotate` REST endpoint
pub struct CloudVisionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl CloudVisionClient {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            access_token,
        }
    }

    /// Run a single feature detection on an image in storage
    async fn annotate(
        &self,
        image: &ArtifactLocation,
        feature: &str,
    ) -> CloudMakerResult<AnnotateImageResponse> {
        let failed = |e: String| {
            CloudMakerError::AnnotationFailed(format!("{} on {}: {}", feature, image, e))
        };

        let body = json!({
            "requests": [{
                "image": { "source": { "imageUri": image.uri() } },
                "features": [{ "type": feature }]
            }]
        });

        app_log!(LogLevel::Debug, "vision", "Requesting {} for {}", feature, image);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("service responded {}", response.status())));
        }

        let batch: BatchAnnotateResponse =
            response.json().await.map_err(|e| failed(e.to_string()))?;
        let result = batch
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| failed("empty response".to_string()))?;

        match &result.error {
            Some(status) if !status.message.is_empty() => Err(failed(status.message.clone())),
            _ => Ok(result),
        }
    }
}

#[async_trait]
impl AnnotationService for CloudVisionClient {
    async fn safe_search(
        &self,
        image: &ArtifactLocation,
    ) -> CloudMakerResult<SafeSearchAnnotation> {
        let response = self.annotate(image, "SAFE_SEARCH_DETECTION").await?;
        Ok(response.safe_search_annotation.unwrap_or_default())
    }

    async fn labels(&self, image: &ArtifactLocation) -> CloudMakerResult<Vec<EntityAnnotation>> {
        Ok(self.annotate(image, "LABEL_DETECTION").await?.label_annotations)
    }

    async fn landmarks(&self, image: &ArtifactLocation) -> CloudMakerResult<Vec<EntityAnnotation>> {
        Ok(self.annotate(image, "LANDMARK_DETECTION").await?.landmark_annotations)
    }

    async fn logos(&self, image: &ArtifactLocation) -> CloudMakerResult<Vec<EntityAnnotation>> {
        Ok(self.annotate(image, "LOGO_DETECTION").await?.logo_annotations)
    }

    async fn faces(&self, image: &ArtifactLocation) -> CloudMakerResult<Vec<FaceAnnotation>> {
        Ok(self.annotate(image, "FACE_DETECTION").await?.face_annotations)
    }

    async fn crop_hints(&self, image: &ArtifactLocation) -> CloudMakerResult<CropHintsAnnotation> {
        let response = self.annotate(image, "CROP_HINTS").await?;
        Ok(response.crop_hints_annotation.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_response_parsing() {
        let batch: BatchAnnotateResponse = serde_json::from_value(json!({
            "responses": [{
                "safeSearchAnnotation": {"adult": "VERY_LIKELY"},
            }]
        }))
        .unwrap();
        let annotation = batch.responses[0].safe_search_annotation.clone().unwrap();
        assert!(annotation.is_unsafe());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_annotation_failure() {
        let client =
            CloudVisionClient::new(Client::new(), "http://127.0.0.1:9/annotate", None, None);
        let result = client
            .labels(&ArtifactLocation::new("foo", "bar.png"))
            .await;
        assert!(matches!(result, Err(CloudMakerError::AnnotationFailed(_))));
    }
}
