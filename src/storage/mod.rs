use serde::Deserialize;

use crate::config::Config;

/// 对象存储客户端：上传 (key, bytes)，返回公开访问URL。
/// 上传接口与 blob 存储服务约定为 PUT {base_url}/{key}，响应体携带 url 字段。
#[derive(Clone)]
pub struct BlobStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct PutBlobResponse {
    url: String,
}

impl BlobStore {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.blob_store_url.trim_end_matches('/').to_string(),
            token: config.blob_store_token.clone(),
        }
    }

    pub async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, reqwest::Error> {
        let resp = self
            .client
            .put(format!("{}/{}", self.base_url, key))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;

        let blob: PutBlobResponse = resp.json().await?;
        tracing::debug!("Uploaded blob: {} -> {}", key, blob.url);
        Ok(blob.url)
    }
}
