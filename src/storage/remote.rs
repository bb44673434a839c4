//! HTTP document store backend.
//!
//! Layout below the base URL: `{collection}` lists documents,
//! `{collection}/{id}` addresses one (`GET`, `PUT` replace, `PATCH` merge,
//! `DELETE`). An API key, when configured, is sent as a bearer token.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Collection, StorageBackend};
use crate::config::RemoteConfig;
use crate::errors::{Error, Result};

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Remote mode backend talking to a JSON document store.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    base_url: Url,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl RemoteBackend {
    /// Builds a backend from configuration.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let mut raw = config.base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|e| Error::Config {
            message: format!("invalid REMOTE_STORE_URL {raw}: {e}"),
        })?;
        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, collection: Collection, id: Option<&str>) -> Result<Url> {
        let path = match id {
            Some(id) => format!("{}/{id}", collection.remote_name()),
            None => collection.remote_name().to_string(),
        };
        self.base_url.join(&path).map_err(|e| Error::Remote {
            message: format!("invalid document path {path}: {e}"),
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .json::<ErrorResponse>()
            .await
            .map(|err| err.error)
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(Error::Remote {
            message: format!("{status}: {body}"),
        })
    }
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    fn is_remote(&self) -> bool {
        true
    }

    async fn put(&self, collection: Collection, id: &str, document: Value) -> Result<()> {
        let url = self.endpoint(collection, Some(id))?;
        debug!("PUT {}", url);
        let response = self.request(Method::PUT, url).json(&document).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn merge(&self, collection: Collection, id: &str, fields: Value) -> Result<()> {
        let url = self.endpoint(collection, Some(id))?;
        debug!("PATCH {}", url);
        let response = self.request(Method::PATCH, url).json(&fields).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let url = self.endpoint(collection, Some(id))?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(response.json::<Value>().await?))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let url = self.endpoint(collection, Some(id))?;
        debug!("DELETE {}", url);
        let response = self.request(Method::DELETE, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Value>> {
        let url = self.endpoint(collection, None)?;
        let response = self.request(Method::GET, url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }
}
