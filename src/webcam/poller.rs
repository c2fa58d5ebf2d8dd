use super::{
    traits::{FrameSink, Surface},
    CaptureSurface, FrameView, Stream, Tap, CAPTURE_HEIGHT, CAPTURE_WIDTH, JPEG_QUALITY,
    POLL_INTERVAL,
};

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{error, info, warn};

enum State {
    Inactive,
    // The tap lives here, not in the ticker, so it detaches the moment the
    // state is dropped.
    Active { ticker: JoinHandle<()>, tap: Tap },
}

/// Periodically snapshots a [`Stream`] and hands each frame, JPEG-encoded,
/// to a [`FrameSink`].
///
/// Ticks follow the interval, not delivery completion: a slow sink never
/// delays the next capture, and deliveries may overlap.
pub(crate) struct Poller {
    state: State,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            state: State::Inactive,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Starts polling `stream`, replacing any previous activation.
    ///
    /// Returns `false`, leaving the poller inactive, if no capture surface
    /// could be acquired.
    pub fn activate<K: FrameSink>(&mut self, stream: &Stream, sink: K) -> bool {
        let surface = CaptureSurface::acquire(CAPTURE_WIDTH, CAPTURE_HEIGHT, JPEG_QUALITY);
        if let Ok(surface) = &surface {
            let (width, height) = surface.dimensions();
            info!("capture surface {width}x{height} at quality {JPEG_QUALITY}");
        }
        self.activate_with(stream, surface, sink, POLL_INTERVAL)
    }

    pub(crate) fn activate_with<S, E, K>(
        &mut self,
        stream: &Stream,
        surface: Result<S, E>,
        sink: K,
        period: Duration,
    ) -> bool
    where
        S: Surface,
        E: std::error::Error,
        K: FrameSink,
    {
        self.deactivate();

        let tap = stream.attach();
        let surface = match surface {
            Ok(surface) => surface,
            Err(e) => {
                // `tap` is released on return
                error!("failed to get capture surface for webcam polling: {e}");
                return false;
            }
        };

        let start = Instant::now() + period;
        let ticker = tokio::spawn(run(tap.view(), surface, Arc::new(sink), start, period));
        self.state = State::Active { ticker, tap };
        info!("webcam polling every {period:?}");
        true
    }

    /// Cancels all future ticks and releases the tap and capture surface.
    /// Deliveries already issued are left to finish on their own.
    pub fn deactivate(&mut self) {
        if let State::Active { ticker, tap } = std::mem::replace(&mut self.state, State::Inactive)
        {
            ticker.abort();
            drop(tap);
            info!("webcam polling stopped");
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.deactivate();
    }
}

async fn run<S: Surface, K: FrameSink>(
    frames: FrameView,
    mut surface: S,
    sink: Arc<K>,
    start: Instant,
    period: Duration,
) {
    let mut ticks = time::interval_at(start, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let in_flight = Arc::new(AtomicUsize::new(0));

    loop {
        ticks.tick().await;

        if let Err(e) = surface.draw(frames.current_frame().as_ref()) {
            error!("failed to draw video frame for webcam polling: {e}");
            continue;
        }
        let Some(payload) = surface.encode() else {
            error!("failed to encode capture surface for webcam polling");
            continue;
        };

        // Overlap is reported, never bounded
        let pending = in_flight.fetch_add(1, Ordering::SeqCst);
        if pending > 0 {
            warn!(pending, "previous frame deliveries still in flight");
        }

        let sink = Arc::clone(&sink);
        let in_flight = Arc::clone(&in_flight);
        tokio::spawn(async move {
            if let Err(e) = sink.deliver(payload).await {
                error!("error sending frame: {e}");
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}
