use super::traits::FrameSink;
use crate::api::{ApiClient, ApiError, ApiVersion};

use async_trait::async_trait;
use bytes::Bytes;
use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    HeaderMap,
};

pub(crate) const MONITOR_FRAME_PATH: &str = "/monitor-frame/";

/// Posts captured frames to the backend's monitoring endpoint.
#[derive(Clone)]
pub(crate) struct MonitorEndpoint {
    api: ApiClient,
    version: ApiVersion,
}

impl MonitorEndpoint {
    pub fn new(api: ApiClient, version: ApiVersion) -> Self {
        Self { api, version }
    }
}

#[async_trait]
impl FrameSink for MonitorEndpoint {
    type Error = ApiError;

    async fn deliver(&self, payload: Bytes) -> Result<(), Self::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));

        self.api
            .post_with(MONITOR_FRAME_PATH, payload, self.version, headers)
            .await
            .into_result()
            .map(|_| ())
    }
}
