mod delivery;
mod frame;
mod poller;
mod surface;
mod traits;
mod transcode;

pub(crate) use delivery::{MonitorEndpoint, MONITOR_FRAME_PATH};
pub(crate) use frame::Frame;
pub(crate) use poller::Poller;
pub(crate) use traits::VideoSource;
pub(crate) use transcode::Process;

use surface::CaptureSurface;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::watch;
use tracing::debug;

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(10_000);
pub(crate) const CAPTURE_WIDTH: u32 = 640;
pub(crate) const CAPTURE_HEIGHT: u32 = 480;
/// 0.8 on the encoder's 1-100 scale.
pub(crate) const JPEG_QUALITY: u8 = 80;

/// Read-only handle to a live video source.
///
/// Holding a `Stream` never keeps the producer alive nor shuts it down;
/// the producer owns the sending half.
#[derive(Clone, Debug)]
pub(crate) struct Stream {
    frames: watch::Receiver<Option<Frame>>,
    viewers: Arc<AtomicUsize>,
}

impl Stream {
    pub fn new(frames: watch::Receiver<Option<Frame>>) -> Self {
        Self {
            frames,
            viewers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Attaches a tap that follows the stream's latest frame.
    pub fn attach(&self) -> Tap {
        self.viewers.fetch_add(1, Ordering::SeqCst);
        debug!("video tap attached");
        Tap {
            view: FrameView(self.frames.clone()),
            viewers: Arc::clone(&self.viewers),
        }
    }

    /// Number of taps currently attached to this stream or any of its clones.
    #[cfg(test)]
    pub fn viewers(&self) -> usize {
        self.viewers.load(Ordering::SeqCst)
    }
}

/// A playing view onto a [`Stream`]. Dropping it detaches from the source.
#[derive(Debug)]
pub(crate) struct Tap {
    view: FrameView,
    viewers: Arc<AtomicUsize>,
}

impl Tap {
    /// A reader of this tap's frames. It does not count as a viewer and
    /// does not keep the tap attached.
    pub fn view(&self) -> FrameView {
        self.view.clone()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct FrameView(watch::Receiver<Option<Frame>>);

impl FrameView {
    pub fn current_frame(&self) -> Option<Frame> {
        self.0.borrow().clone()
    }
}

impl Drop for Tap {
    fn drop(&mut self) {
        self.viewers.fetch_sub(1, Ordering::SeqCst);
        debug!("video tap detached");
    }
}
