use async_trait::async_trait;

use crate::errors::AppError;

/// Seam to the external design-file store. Files are addressed by the opaque
/// `file_ref` recorded in `product_design_files`.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Download the raw bytes of one stored design file.
    async fn download(&self, file_ref: &str) -> Result<Vec<u8>, AppError>;
}

/// Download-by-id HTTP client (Drive-style `GET {base}/{id}?alt=media`).
pub struct HttpFileStorage {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpFileStorage {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl FileStorage for HttpFileStorage {
    async fn download(&self, file_ref: &str) -> Result<Vec<u8>, AppError> {
        let resp = self
            .http
            .get(format!("{}/{file_ref}", self.base_url))
            .query(&[("alt", "media")])
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "design file download failed ({}) for ref {file_ref}",
                resp.status()
            )));
        }

        Ok(resp.bytes().await?.to_vec())
    }
}
