use crate::session::SessionReader;

use std::{fmt, sync::Arc};

use bytes::Bytes;
use hyper::{
    client::HttpConnector,
    header::AUTHORIZATION,
    Body, Client, HeaderMap, Request, StatusCode,
};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("hyper error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("invalid request: {0}")]
    Http(#[from] hyper::http::Error),
    #[error("server responded with {status}")]
    Status { status: StatusCode, body: Bytes },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ApiVersion {
    #[default]
    V1,
    V2,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("v1"),
            Self::V2 => f.write_str("v2"),
        }
    }
}

/// Settled outcome of a POST: either the raw response body or the error.
#[derive(Debug)]
pub(crate) struct PostResponse<T = Bytes> {
    result: Result<T, ApiError>,
}

impl<T> PostResponse<T> {
    #[cfg(test)]
    pub fn data(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&ApiError> {
        self.result.as_ref().err()
    }

    /// Always `false`: a `PostResponse` only exists once the request settled.
    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        false
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        self.result
    }
}

impl<T> From<Result<T, ApiError>> for PostResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        Self { result }
    }
}

/// HTTP client for the exam backend, authenticated from the session context.
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: Client<HttpConnector>,
    base_url: Arc<str>,
    session: SessionReader,
}

impl ApiClient {
    pub fn new(base_url: impl AsRef<str>, session: SessionReader) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.as_ref().trim_end_matches('/').into(),
            session,
        }
    }

    pub fn url(&self, path: &str, version: ApiVersion) -> String {
        format!("{}/api/{version}{path}", self.base_url)
    }

    /// `POST` against the `v1` API with no extra headers.
    #[cfg(test)]
    pub async fn post(&self, path: &str, body: impl Into<Body>) -> PostResponse {
        self.post_with(path, body, ApiVersion::default(), HeaderMap::new())
            .await
    }

    /// `POST` `body` to `path` under `version`. Caller `headers` replace any
    /// defaults of the same name, including `Authorization`.
    pub async fn post_with(
        &self,
        path: &str,
        body: impl Into<Body>,
        version: ApiVersion,
        headers: HeaderMap,
    ) -> PostResponse {
        let result = self.send(path, body.into(), version, headers).await;
        if let Err(e) = &result {
            error!("error during request: {e}");
        }
        result.into()
    }

    async fn send(
        &self,
        path: &str,
        body: Body,
        version: ApiVersion,
        headers: HeaderMap,
    ) -> Result<Bytes, ApiError> {
        let uri = self.url(path, version);
        let mut builder = Request::post(&uri);
        if let Some(token) = self.session.access_token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let mut request = builder.body(body)?;
        request.headers_mut().extend(headers);

        debug!("POST {uri}");
        let response = self.client.request(request).await?;
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await?;

        if !status.is_success() {
            return Err(ApiError::Status { status, body });
        }
        Ok(body)
    }
}
