use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::ApiClientError;

/// Uploads raw image bytes to a URL granted by the server.
#[async_trait]
pub trait PhotoUploader: Send + Sync {
    async fn upload_bytes(&self, image: Vec<u8>, url: &str) -> Result<(), ApiClientError>;
}

/// Uploads with a single `PUT` to a pre-signed storage URL.
#[derive(Clone, Default)]
pub struct CloudStorageUploader {
    client: reqwest::Client,
}

impl CloudStorageUploader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhotoUploader for CloudStorageUploader {
    async fn upload_bytes(&self, image: Vec<u8>, url: &str) -> Result<(), ApiClientError> {
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "image/jpeg")
            .body(image)
            .send()
            .await
            .map_err(|e| ApiClientError::UploadError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiClientError::UploadError(format!(
                "Unexpected status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
