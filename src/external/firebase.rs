use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url, header};
use serde_json::Value;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::{AppError, AppResult};
use crate::external::DocumentStore;
use crate::external::store::path_segments;

/// Firebase Realtime Database REST 客户端
#[derive(Clone)]
pub struct FirebaseStore {
    client: Client,
    base_url: Url,
}

impl FirebaseStore {
    pub fn new(cfg: &StoreConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent("prize-wheel-backend/firebase")
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        let base_url = Url::parse(&cfg.url)
            .map_err(|e| AppError::ConfigError(format!("Invalid store url {}: {e}", cfg.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(format!("Invalid store url {}", cfg.url)));
        }
        Ok(Self { client, base_url })
    }

    /// `{base}/{path}.json`，每段单独做百分号编码
    fn url(&self, path: &str) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AppError::ConfigError("Store url cannot be a base".into()))?;
            segments.pop_if_empty();
            match path_segments(path).split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
                None => {
                    segments.push(".json");
                }
            }
        }
        Ok(url)
    }

    /// 读取并可选地请求 ETag (条件写入需要)
    async fn read(&self, path: &str, with_etag: bool) -> AppResult<(Option<Value>, Option<String>)> {
        let mut request = self.client.get(self.url(path)?);
        if with_etag {
            request = request.header("X-Firebase-ETag", "true");
        }
        let response = request.send().await.map_err(store_unreachable)?;

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = ensure_success(response).await?;

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            AppError::StoreError(format!("Firebase returned a non-JSON body for {path}: {e}"))
        })?;
        Ok((Some(value).filter(|v| !v.is_null()), etag))
    }
}

#[async_trait]
impl DocumentStore for FirebaseStore {
    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        let (value, _) = self.read(path, false).await?;
        Ok(value)
    }

    async fn put(&self, path: &str, value: &Value) -> AppResult<()> {
        let response = self
            .client
            .put(self.url(path)?)
            .json(value)
            .send()
            .await
            .map_err(store_unreachable)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        path: &str,
        expected: Option<&Value>,
        new: &Value,
    ) -> AppResult<bool> {
        let (current, etag) = self.read(path, true).await?;
        if current.as_ref() != expected {
            return Ok(false);
        }
        let etag = etag.ok_or_else(|| {
            AppError::StoreError(format!("Firebase did not return an ETag for {path}"))
        })?;

        let response = self
            .client
            .put(self.url(path)?)
            .header(header::IF_MATCH, etag)
            .json(new)
            .send()
            .await
            .map_err(store_unreachable)?;

        if response.status() == StatusCode::PRECONDITION_FAILED {
            log::debug!("Conditional write on {path} rejected, value changed");
            return Ok(false);
        }
        ensure_success(response).await?;
        Ok(true)
    }
}

fn store_unreachable(e: reqwest::Error) -> AppError {
    AppError::StoreError(format!("Firebase unreachable: {e}"))
}

async fn ensure_success(response: Response) -> AppResult<String> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(AppError::StoreError(format!(
            "Firebase {}: {}",
            status.as_u16(),
            text
        )));
    }
    Ok(text)
}
