//! HTTP transport
//!
//! [`HttpTransport`] is the seam under the request executor. Production code uses
//! [`ReqwestTransport`]; tests plug in scripted doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::Method;

/// Error raised by a transport when no response could be obtained
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// A file uploaded alongside a JSON payload
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Arc<[u8]>,
}

impl FileAttachment {
    pub fn new(filename: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Request body encodings
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Vec<u8>),
    /// `payload_json` part followed by `files[n]` parts
    Multipart {
        payload_json: String,
        files: Vec<FileAttachment>,
    },
}

/// A fully-built request, ready to send
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Raw response as seen by the executor
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Low-level HTTP transport
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and return whatever the server answered
    ///
    /// Non-2xx statuses are not errors at this level.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a 30 second request timeout
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes),
            RequestBody::Multipart {
                payload_json,
                files,
            } => builder.multipart(multipart_form(payload_json, files)?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn multipart_form(payload_json: String, files: Vec<FileAttachment>) -> Result<Form, reqwest::Error> {
    let mut form = Form::new().text("payload_json", payload_json);

    for (index, file) in files.into_iter().enumerate() {
        let mut part = Part::bytes(file.data.to_vec()).file_name(file.filename);
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type)?;
        }
        form = form.part(format!("files[{index}]"), part);
    }

    Ok(form)
}
