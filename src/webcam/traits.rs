use super::{Frame, Stream};

use async_trait::async_trait;
use bytes::Bytes;

/// A live video producer that hands out read-only [`Stream`] handles.
#[async_trait]
pub(crate) trait VideoSource {
    type Error: std::error::Error + Send + Sync;

    fn subscribe(&self) -> Stream;
    async fn stop(&mut self) -> Result<(), Self::Error>;
}

/// A fixed-size bitmap that frames are drawn onto before encoding.
pub(crate) trait Surface: Send + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Draws `frame` scaled to the surface. `None` leaves the surface untouched.
    fn draw(&mut self, frame: Option<&Frame>) -> Result<(), Self::Error>;

    /// Encodes the current contents, or `None` if the encoder produced nothing.
    fn encode(&self) -> Option<Bytes>;
}

/// Destination for encoded frames.
#[async_trait]
pub(crate) trait FrameSink: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn deliver(&self, payload: Bytes) -> Result<(), Self::Error>;
}
