use super::{
    frame::{DeadStream, FrameReader},
    traits::VideoSource,
    Frame, Stream,
};

use std::{io, process::Stdio};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    io::AsyncRead,
    process::{Child, Command},
    sync::watch,
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub(crate) enum ProcessError {
    #[error("frame stream died: {0}")]
    Dead(#[from] DeadStream),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("pipe error")]
    Pipe,
    #[error("reader task failed: {0}")]
    Task(#[from] JoinError),
}

/// An `ffmpeg` child re-encoding a live source as multipart JPEG.
pub(crate) struct Process {
    stream: Stream,
    handle: JoinHandle<ProcessError>,
    process: Child,
}

fn ffmpeg_args(source: &str, format: Option<&str>, fps: u32) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(format) = format {
        args.extend(["-f".to_string(), format.to_string()]);
    }
    args.extend(
        [
            "-i",
            source,
            "-c:v",
            "mjpeg",
            "-q:v",
            "2",
            "-f",
            "mpjpeg",
            "-filter_complex",
            &format!("[0:v] fps={fps}"),
            "-fps_mode",
            "drop",
            "-an",
            "-",
        ]
        .map(String::from),
    );
    args
}

/// Publishes every well-formed frame until the stream dies. The slot is
/// cleared before returning so no reader keeps a frame from a dead source.
async fn pump<R>(
    mut reader: FrameReader<R>,
    tx: watch::Sender<Option<Frame>>,
) -> ProcessError
where
    R: AsyncRead + Unpin,
{
    let err = match reader.discard_mime_boundary().await {
        Err(e) => ProcessError::from(e),
        Ok(_) => loop {
            match reader.read_frame().await {
                Ok(None) => debug!("skipping corrupt frame"),
                Ok(Some(frame)) => {
                    tx.send_replace(Some(frame));
                }
                Err(e) => break ProcessError::from(e),
            }
        },
    };

    error!("video source ended: {err}");
    tx.send_replace(None);
    err
}

impl Process {
    pub fn new(
        source: impl AsRef<str>,
        format: Option<&str>,
        fps: u32,
    ) -> Result<Self, ProcessError> {
        let args = ffmpeg_args(source.as_ref(), format, fps);
        debug!(?args, "spawning ffmpeg");

        let mut command = Command::new("ffmpeg");
        command.args(&args);
        let process = Self::spawn(command)?;

        info!("video source {} opened", source.as_ref());
        Ok(process)
    }

    fn spawn(mut command: Command) -> Result<Self, ProcessError> {
        let (tx, rx) = watch::channel(None);

        let mut process = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let reader = process
            .stdout
            .take()
            .ok_or(ProcessError::Pipe)
            .map(FrameReader::new)?;

        Ok(Self {
            stream: Stream::new(rx),
            handle: tokio::spawn(pump(reader, tx)),
            process,
        })
    }

    /// Resolves with the reason once the source stops producing frames.
    ///
    /// Must not be polled again after it has resolved.
    pub async fn closed(&mut self) -> ProcessError {
        match (&mut self.handle).await {
            Ok(err) => err,
            Err(join) => ProcessError::from(join),
        }
    }
}

#[async_trait]
impl VideoSource for Process {
    type Error = ProcessError;

    fn subscribe(&self) -> Stream {
        self.stream.clone()
    }

    async fn stop(&mut self) -> Result<(), Self::Error> {
        self.handle.abort();
        self.process.kill().await?;
        info!("video source stopped");
        Ok(())
    }
}
