use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde::Deserialize;
use serde_json::json;

use super::{BlobStore, PutOptions};

/// Client for a Vercel-Blob-style HTTP API.
pub struct HttpBlobStore {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Deserialize)]
struct PutBlobResponse {
    url: String,
}

impl HttpBlobStore {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn error_for(response: reqwest::Response, action: &str) -> anyhow::Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::anyhow!("blob store {action} error ({status}): {body}")
    }
}

#[async_trait::async_trait]
impl BlobStore for HttpBlobStore {
    #[tracing::instrument(name = "blob.http.put", skip(self, content), fields(blob.bytes = content.len()))]
    async fn put(&self, key: &str, content: &str, options: PutOptions) -> anyhow::Result<String> {
        let response = self
            .client
            .put(format!("{}/{}", self.api_url, key))
            .bearer_auth(&self.token)
            .header("x-api-version", "7")
            .header("x-content-type", "text/plain; charset=utf-8")
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", if options.overwrite { "1" } else { "0" })
            .body(content.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "put").await);
        }

        let body: PutBlobResponse = response.json().await?;
        Ok(body.url)
    }

    #[tracing::instrument(name = "blob.http.get", skip(self))]
    async fn get(&self, url: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "get").await);
        }

        Ok(response.text().await?)
    }

    #[tracing::instrument(name = "blob.http.delete", skip(self))]
    async fn delete(&self, url: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(format!("{}/delete", self.api_url))
            .bearer_auth(&self.token)
            .header("x-api-version", "7")
            .json(&json!({ "urls": [url] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "delete").await);
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
