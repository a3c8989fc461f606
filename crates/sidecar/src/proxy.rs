//! Reverse proxy to the protected origin.
//!
//! Forwards the (already mediated) request with its original body bytes
//! and streams the origin response straight back. Hop-by-hop headers are
//! dropped in both directions; everything else passes through untouched.

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Response, StatusCode, header};
use bytes::Bytes;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid target URL {url:?}: {message}")]
    InvalidTarget { url: String, message: String },

    #[error("failed to build proxy client: {0}")]
    Client(String),
}

const STRIPPED_REQUEST_HEADERS: &[header::HeaderName] = &[
    header::HOST,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
];

pub struct OriginProxy {
    client: reqwest::Client,
    target: reqwest::Url,
}

impl OriginProxy {
    pub fn new(target_url: &str) -> Result<Self, ProxyError> {
        let target = reqwest::Url::parse(target_url).map_err(|e| ProxyError::InvalidTarget {
            url: target_url.to_string(),
            message: e.to_string(),
        })?;

        // No overall timeout: origin responses may stream for a long time.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ProxyError::Client(e.to_string()))?;

        Ok(Self { client, target })
    }

    /// Forward one request. Transport failures surface as `502`.
    pub async fn forward(&self, parts: &Parts, body: Bytes) -> Response<Body> {
        let mut url = self.target.clone();
        url.set_path(parts.uri.path());
        url.set_query(parts.uri.query());

        let mut headers = parts.headers.clone();
        for name in STRIPPED_REQUEST_HEADERS {
            headers.remove(name);
        }

        let upstream = self
            .client
            .request(parts.method.clone(), url)
            .headers(headers)
            .body(body)
            .send()
            .await;

        let upstream = match upstream {
            Ok(upstream) => upstream,
            Err(err) => {
                error!(error = %err, "proxy error");
                return plain_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
            }
        };

        let mut builder = Response::builder().status(upstream.status());
        for (name, value) in upstream.headers() {
            if name == header::CONNECTION || name == header::TRANSFER_ENCODING {
                continue;
            }
            builder = builder.header(name, value);
        }

        builder
            .body(Body::from_stream(upstream.bytes_stream()))
            .unwrap_or_else(|err| {
                error!(error = %err, "failed to assemble proxied response");
                plain_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
            })
    }
}

pub(crate) fn plain_response(status: StatusCode, text: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(text))
        .expect("static response must build")
}
