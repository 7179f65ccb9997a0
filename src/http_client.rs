use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{ApiErrorBody, AppError, AppResult};

/// JSON client bound to the API base URL.
///
/// Holds the bearer token in memory and a cookie jar, so the refresh cookie
/// set by `/login/` is sent back on `/login/refresh/`, `/logout/` and
/// `/auth-status/`.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    bearer: Arc<RwLock<Option<String>>>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_bearer(&self, token: Option<String>) {
        *self.bearer.write().await = token;
    }

    pub async fn bearer(&self) -> Option<String> {
        self.bearer.read().await.clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = self.bearer.read().await.as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.request(Method::GET, path).await.send().await?;
        decode(response).await
    }

    pub async fn get_json_with_query<T, Q>(&self, path: &str, query: &Q) -> AppResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .request(Method::GET, path)
            .await
            .query(query)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, path)
            .await
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    /// POST without a request body (state transitions such as recall).
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.request(Method::POST, path).await.send().await?;
        decode(response).await
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::PATCH, path)
            .await
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn delete(&self, path: &str) -> AppResult<()> {
        let response = self.request(Method::DELETE, path).await.send().await?;
        decode::<serde_json::Value>(response).await.map(|_| ())
    }

    pub async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> AppResult<T> {
        let response = self
            .request(Method::POST, path)
            .await
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn patch_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> AppResult<T> {
        let response = self
            .request(Method::PATCH, path)
            .await
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }
}

/// Turns a response into `T`, or into `AppError::Api` for non-2xx statuses.
/// Empty bodies (204, bare 200) decode as JSON `null`.
async fn decode<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        tracing::debug!("API responded {}: {}", status, text);
        return Err(AppError::Api {
            status: status.as_u16(),
            body: ApiErrorBody::parse(&text),
        });
    }

    let text = if text.trim().is_empty() { "null" } else { text.as_str() };
    Ok(serde_json::from_str(text)?)
}
