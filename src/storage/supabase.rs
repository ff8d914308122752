//! Supabase Storage REST client.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::json;
use tracing::debug;

use super::{ObjectStore, StoredObject};
use crate::config::StorageConfig;
use crate::error::StorageError;

/// Listing page size; the bucket only ever holds a handful of artifacts
const LIST_LIMIT: usize = 1000;

pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            key: config.key.trim().to_string(),
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_url(&self) -> String {
        format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket)
    }

    fn bucket_url(&self) -> String {
        format!("{}/storage/v1/object/{}", self.base_url, self.bucket)
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/{}", self.bucket_url(), name)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.key)
            .header("apikey", &self.key)
    }

    /// Pass through 2xx responses; otherwise the status plus body text
    async fn check(response: Response) -> Result<Response, String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(format!("HTTP {}: {}", status, body.trim()))
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let url = self.list_url();
        debug!(url = %url, "Listing bucket");

        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({ "prefix": "", "limit": LIST_LIMIT, "offset": 0 }))
            .send()
            .await?;

        let response = Self::check(response)
            .await
            .map_err(|reason| StorageError::List {
                bucket: self.bucket.clone(),
                reason,
            })?;

        let objects: Vec<StoredObject> = response.json().await?;
        debug!(count = objects.len(), "Listed bucket");

        Ok(objects)
    }

    async fn remove(&self, names: &[String]) -> Result<(), StorageError> {
        let response = self
            .authorized(self.client.delete(self.bucket_url()))
            .json(&json!({ "prefixes": names }))
            .send()
            .await?;

        Self::check(response)
            .await
            .map_err(|reason| StorageError::Delete {
                names: names.to_vec(),
                reason,
            })?;
        Ok(())
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), StorageError> {
        let response = self
            .authorized(self.client.post(self.object_url(name)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;

        Self::check(response)
            .await
            .map_err(|reason| StorageError::Upload {
                name: name.to_string(),
                reason,
            })?;
        Ok(())
    }
}
