//! Single-request HTTP execution
//!
//! Every call of the SDK ends up here. A [`Transport`] owns the connection pool
//! and the request signer; it sets the fixed headers, sends one request and
//! classifies the response. It never retries.

use crate::{urls::path_and_query, ClientError, Config, Result};
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use ucare_auth::{rfc2822, CanonicalRequest, Credentials, Signer, JSON_CONTENT_TYPE};
use url::Url;

/// Request body
#[derive(Debug, Default)]
pub enum Payload {
    /// No body
    #[default]
    Empty,
    /// Serialized JSON
    Json(Vec<u8>),
    /// `multipart/form-data`
    Form(Form),
    /// Raw bytes with an explicit content type
    Raw { data: Bytes, content_type: String },
}

/// A request ready to be executed by a [`Transport`]
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    payload: Payload,
    signed: bool,
}

impl ApiRequest {
    /// A REST API request; carries the signed API headers
    pub fn api(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            payload: Payload::Empty,
            signed: true,
        }
    }

    /// An upload API or pre-signed request; no API headers
    pub fn upload(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            payload: Payload::Empty,
            signed: false,
        }
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.payload = Payload::Json(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Attach a multipart form
    pub fn form(mut self, form: Form) -> Self {
        self.payload = Payload::Form(form);
        self
    }

    /// Attach raw bytes
    pub fn raw(mut self, data: Bytes, content_type: impl Into<String>) -> Self {
        self.payload = Payload::Raw {
            data,
            content_type: content_type.into(),
        };
        self
    }

    /// Target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// HTTP executor shared by every component of a client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct Transport {
    http: Client,
    signer: Signer,
    accept: HeaderValue,
    user_agent: HeaderValue,
}

impl Transport {
    /// Build a transport from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Network)?;
        Self::with_http_client(config, http)
    }

    /// Build a transport around an existing `reqwest` client
    pub fn with_http_client(config: &Config, http: Client) -> Result<Self> {
        Ok(Self {
            http,
            signer: Signer::with_scheme(config.credentials(), config.auth_scheme),
            accept: header_value(&config.accept_header())?,
            user_agent: header_value(&config.user_agent_header())?,
        })
    }

    /// Credentials used for signing
    pub fn credentials(&self) -> &Credentials {
        self.signer.credentials()
    }

    /// Execute a request and return the response body
    pub async fn execute(&self, request: ApiRequest) -> Result<Bytes> {
        let ApiRequest {
            method,
            url,
            payload,
            signed,
        } = request;

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, self.user_agent.clone());
        if signed {
            let body: &[u8] = match &payload {
                Payload::Empty => &[],
                Payload::Json(body) => body.as_slice(),
                Payload::Form(_) | Payload::Raw { .. } => {
                    return Err(ClientError::Config(
                        "signed requests carry JSON or no body".to_string(),
                    ))
                }
            };
            headers.extend(self.api_headers(&method, &url, body)?);
        }

        debug!(method = %method, url = %url, signed, "sending request");

        let mut req = self.http.request(method, url).headers(headers);
        req = match payload {
            Payload::Empty => req,
            Payload::Json(body) => req.body(body),
            Payload::Form(form) => req.multipart(form),
            Payload::Raw { data, content_type } => req
                .header(header::CONTENT_TYPE, header_value(&content_type)?)
                .body(data),
        };

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(status = %status, error = %e, "failed to read error body");
                    String::new()
                }
            };
            debug!(status = %status, "request rejected");
            return Err(ClientError::from_status(status, body));
        }

        Ok(response.bytes().await?)
    }

    /// Execute a request and decode its JSON response
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let body = self.execute(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Content-Type, Accept, Date and Authorization for a REST API request
    fn api_headers(&self, method: &Method, url: &Url, body: &[u8]) -> Result<HeaderMap> {
        let date = rfc2822(Utc::now());
        let canonical = CanonicalRequest::new(
            method.as_str(),
            body,
            JSON_CONTENT_TYPE,
            date.as_str(),
            path_and_query(url),
        );
        let authorization = self.signer.authorization(&canonical)?;

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(header::ACCEPT, self.accept.clone());
        headers.insert(header::DATE, header_value(&date)?);
        headers.insert(header::AUTHORIZATION, header_value(&authorization)?);
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ClientError::Config(format!("invalid header value {:?}: {}", value, e)))
}
