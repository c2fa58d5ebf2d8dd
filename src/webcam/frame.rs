use std::io;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

pub(crate) const MIME_BOUNDARY: &str = "--ffmpeg";

/// Parts declaring a larger payload are treated as corrupt.
pub(crate) const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug, Error)]
#[error("dead stream")]
pub struct DeadStream;

impl From<io::Error> for DeadStream {
    fn from(_: io::Error) -> Self {
        Self
    }
}

pub trait TryBool {
    fn ok(&self) -> Result<(), ()>;
}

impl TryBool for bool {
    fn ok(&self) -> Result<(), ()> {
        self.then_some(()).ok_or(())
    }
}

/// A single JPEG-encoded video frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    #[cfg(test)]
    pub fn new(jpeg: impl Into<Bytes>) -> Self {
        Self(jpeg.into())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// Reads frames out of ffmpeg's `mpjpeg` muxer output.
pub(crate) struct FrameReader<R: AsyncRead + Unpin>(BufReader<R>);

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self(BufReader::new(reader))
    }

    async fn discard_line_with_prefix(
        &mut self,
        pfx: impl AsRef<str>,
    ) -> io::Result<Result<(), String>> {
        let line = self.read_line().await?;
        Ok(line.starts_with(pfx.as_ref()).then_some(()).ok_or(line))
    }

    pub async fn discard_mime_boundary(&mut self) -> io::Result<Result<(), String>> {
        self.discard_line_with_prefix(MIME_BOUNDARY).await
    }

    /// Reads the next part. A corrupt part yields `Ok(None)` with the reader
    /// positioned just past the following boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, DeadStream> {
        match self.read_part().await? {
            Ok(frame) => Ok(Some(frame)),
            Err(last_line) => {
                if !last_line.starts_with(MIME_BOUNDARY) {
                    self.skip_past_boundary().await?;
                }
                Ok(None)
            }
        }
    }

    /// On a malformed part, returns the line at which parsing gave up.
    async fn read_part(&mut self) -> Result<Result<Frame, String>, DeadStream> {
        // ffmpeg emits Content-type first, then Content-length
        let _ = self.discard_line_with_prefix("Content-type:").await?;

        let len_hdr = self.read_line().await?;
        if len_hdr.starts_with("Content-length:").ok().is_err() {
            return Ok(Err(len_hdr));
        }

        let content_length = match len_hdr
            .split_ascii_whitespace()
            .last()
            .and_then(|len_str| len_str.parse::<usize>().ok())
        {
            Some(len) if len <= MAX_FRAME_LEN => len,
            _ => return Ok(Err(len_hdr)),
        };

        let blank = self.read_line().await?;
        if (blank.trim() == "").ok().is_err() {
            return Ok(Err(blank));
        }

        // Only fails at end of stream
        let data = self.read_bytes(content_length).await?;

        // Trailing empty line, then the boundary that closes this part
        let blank = self.read_line().await?;
        if (blank.trim() == "").ok().is_err() {
            return Ok(Err(blank));
        }
        if let Err(line) = self.discard_mime_boundary().await? {
            return Ok(Err(line));
        }

        Ok(Ok(Frame(data)))
    }

    async fn skip_past_boundary(&mut self) -> io::Result<()> {
        while !self.read_line().await?.starts_with(MIME_BOUNDARY) {}
        Ok(())
    }

    async fn read_bytes(&mut self, count: usize) -> io::Result<Bytes> {
        let mut buf = BytesMut::zeroed(count);
        self.0.read_exact(&mut buf).await.map(|_| buf.freeze())
    }

    /// Reads up to and including the next `\n`. Payload bytes that are not
    /// UTF-8 are replaced rather than rejected.
    async fn read_line(&mut self) -> io::Result<String> {
        let mut line = Vec::new();
        match self.0.read_until(b'\n', &mut line).await? {
            0 => Err(io::ErrorKind::UnexpectedEof.into()),
            _ => Ok(String::from_utf8_lossy(&line).into_owned()),
        }
    }
}
