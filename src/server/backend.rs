//! Storage and identity collaborators of the request handler.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("storage responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid storage URL: {0}")]
    InvalidUrl(String),

    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;
}

#[async_trait]
pub trait Identity: Send + Sync {
    /// The user a bearer token belongs to, or `None` when it is not valid.
    async fn verify(&self, token: &str) -> Option<User>;
}

/// Storage and identity over the backend's REST endpoints.
#[derive(Clone, Debug)]
pub struct RestBackend {
    http: Client,
    base_url: Url,
    service_key: String,
}

impl RestBackend {
    pub fn new(base_url: &str, service_key: impl Into<String>) -> Result<Self, StorageError> {
        let base_url = Url::parse(base_url).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(RestBackend {
            http,
            base_url,
            service_key: service_key.into(),
        })
    }

    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl Storage for RestBackend {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.endpoint(
            ["storage", "v1", "object", bucket]
                .into_iter()
                .chain(path.split('/').filter(|s| !s.is_empty())),
        );
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            status => Err(StorageError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl Identity for RestBackend {
    async fn verify(&self, token: &str) -> Option<User> {
        let response = self
            .http
            .get(self.endpoint(["auth", "v1", "user"]))
            .bearer_auth(token)
            .header("apikey", &self.service_key)
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => response.json::<User>().await.ok(),
            Ok(response) => {
                log::debug!("token rejected with {}", response.status());
                None
            }
            Err(e) => {
                log::warn!("identity request failed: {e}");
                None
            }
        }
    }
}
