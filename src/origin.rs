//! Reverse proxy to the real origin application (`REAL_BACKEND_HOST`).
//!
//! Grounded on the teacher gateway's backend-adapter pattern
//! (`backends/mod.rs`) generalized to a single target: a `pass` decision
//! forwards the request verbatim, injecting `X-Forwarded-For`/`X-Real-IP`,
//! and streams the body in both directions rather than buffering it.

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request, Response, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("origin request timed out")]
    Timeout,
    #[error("origin transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid origin response: {0}")]
    InvalidResponse(#[from] axum::http::Error),
}

/// A single upstream the Edge Gate proxies `pass` decisions to.
pub struct Origin {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Origin {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Proxies `req` to the origin verbatim, streaming the request and
    /// response bodies rather than buffering them in memory.
    pub async fn proxy(&self, req: Request<Body>, client_ip: IpAddr) -> Result<Response<Body>, OriginError> {
        let (parts, body) = req.into_parts();
        let path_and_query = parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut builder = self.client.request(method, &url);
        for (name, value) in parts.headers.iter() {
            if name == header::HOST {
                continue;
            }
            builder = builder.header(name, value);
        }
        builder = builder
            .header("x-forwarded-for", client_ip.to_string())
            .header("x-real-ip", client_ip.to_string());

        let outbound_body = reqwest::Body::wrap_stream(body.into_data_stream());
        builder = builder.body(outbound_body);

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| OriginError::Timeout)??;

        let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut builder = Response::builder().status(status);

        for (name, value) in response.headers().iter() {
            if name == reqwest::header::TRANSFER_ENCODING || name == reqwest::header::CONNECTION {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                builder = builder.header(name, value);
            }
        }

        let body = Body::from_stream(response.bytes_stream());
        Ok(builder.body(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_trailing_slash() {
        let origin = Origin::new("http://localhost:3000/", 1000).unwrap();
        assert_eq!(origin.base_url, "http://localhost:3000");
    }
}
