//! Rate-limited request executor

use std::sync::Arc;

use chord_common::{ClientConfig, UserType};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::GatewayEndpoint;
use crate::rate_limit::{sleep_until, RateLimitTracker};
use crate::transport::{
    FileAttachment, HttpRequest, HttpTransport, RequestBody, ReqwestTransport,
};

/// REST client
///
/// Every call waits on the client's [`RateLimitTracker`] before it is issued and updates it from
/// the response headers afterwards. Throttled responses are retried until they succeed, or until
/// `max_rate_limit_retries` is reached when one is configured.
///
/// Clones share the same tracker and transport.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    tracker: RateLimitTracker,
    base_url: String,
    headers: HeaderMap,
    user_type: UserType,
    max_retries: Option<u32>,
}

impl RestClient {
    /// Create a client backed by `reqwest`
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let transport = ReqwestTransport::new().map_err(|e| ApiError::Transport(Box::new(e)))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a custom transport
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&config.authorization())?);
        headers.insert(USER_AGENT, header_value(&config.user_agent())?);

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                tracker: RateLimitTracker::new(),
                base_url: config.api_base_url.trim_end_matches('/').to_string(),
                headers,
                user_type: config.user_type,
                max_retries: config.max_rate_limit_retries,
            }),
        })
    }

    /// The rate-limit tracker shared by this client and its clones
    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.inner.tracker
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> ApiResult<R> {
        self.request::<(), R>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<R> {
        self.request(Method::POST, path, body).await
    }

    pub async fn put<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<R> {
        self.request(Method::PUT, path, body).await
    }

    pub async fn patch<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<R> {
        self.request(Method::PATCH, path, body).await
    }

    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> ApiResult<R> {
        self.request::<(), R>(Method::DELETE, path, None).await
    }

    /// POST a JSON payload with file attachments
    pub async fn post_multipart<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
        files: Vec<FileAttachment>,
    ) -> ApiResult<R> {
        let payload_json = serde_json::to_string(payload).map_err(ApiError::Encode)?;
        let body = self
            .execute(
                Method::POST,
                path,
                RequestBody::Multipart {
                    payload_json,
                    files,
                },
            )
            .await?;
        decode(&body)
    }

    /// Issue a request with an optional JSON body
    ///
    /// An empty response body decodes as `null`, so `R = ()` or `R = Option<T>` can be used
    /// when no content is expected.
    pub async fn request<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<R> {
        let body = match body {
            Some(body) => RequestBody::Json(serde_json::to_vec(body).map_err(ApiError::Encode)?),
            None => RequestBody::Empty,
        };

        let response = self.execute(method, path, body).await?;
        decode(&response)
    }

    /// Fetch the gateway URL to connect to
    ///
    /// Bot accounts use `/gateway/bot`, which also reports shard and session start limits.
    pub async fn gateway_endpoint(&self) -> ApiResult<GatewayEndpoint> {
        let path = match self.inner.user_type {
            UserType::Bot => "/gateway/bot",
            UserType::Bearer => "/gateway",
        };
        self.get(path).await
    }

    async fn execute(&self, method: Method, path: &str, body: RequestBody) -> ApiResult<Vec<u8>> {
        let url = format!("{}{}", self.inner.base_url, path);
        let mut retries = 0u32;

        loop {
            self.inner.tracker.acquire().await;

            let request = HttpRequest {
                method: method.clone(),
                url: url.clone(),
                headers: self.inner.headers.clone(),
                body: body.clone(),
            };

            let response = self
                .inner
                .transport
                .execute(request)
                .await
                .map_err(ApiError::Transport)?;

            self.inner.tracker.update(&response.headers);

            debug!(%method, path, status = response.status, "REST response");

            if response.is_success() {
                return Ok(response.body);
            }

            match ApiError::from_response(response.status, &response.body, Utc::now()) {
                ApiError::RateLimited(throttle) => {
                    retries += 1;
                    if let Some(max) = self.inner.max_retries {
                        if retries > max {
                            warn!(%method, path, retries = max, "Rate limit retries exhausted");
                            return Err(ApiError::RetriesExhausted {
                                retries: max,
                                last: throttle,
                            });
                        }
                    }

                    info!(
                        %method,
                        path,
                        global = throttle.global,
                        retry_at = %throttle.retry_at,
                        retries,
                        "Rate limited, retrying"
                    );
                    sleep_until(throttle.retry_at).await;
                }
                error => return Err(error),
            }
        }
    }
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ApiError::Transport(Box::new(e)))
}

fn decode<R: DeserializeOwned>(body: &[u8]) -> ApiResult<R> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(ApiError::Decode)
}
