mod api;
mod session;
mod webcam;

use api::{ApiClient, ApiVersion};
use session::{Credentials, Session};
use webcam::{MonitorEndpoint, Poller, Process, VideoSource};

use anyhow::bail;
use clap::Parser;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(
        long,
        short,
        env = "EXAM_MONITOR_FORMAT",
        help = "ffmpeg input format of the source, e.g. v4l2"
    )]
    format: Option<String>,

    #[arg(
        long,
        env = "EXAM_MONITOR_FPS",
        help = "Rate at which frames are decoded from the source",
        default_value = "1"
    )]
    fps: u32,

    #[arg(
        long,
        env = "EXAM_MONITOR_API_BASE",
        help = "Base URL of the exam backend",
        default_value = "http://127.0.0.1:8000"
    )]
    api_base: String,

    #[arg(
        long,
        env = "EXAM_MONITOR_API_VERSION",
        help = "API version frames are posted to",
        value_enum,
        default_value_t = ApiVersion::V1
    )]
    api_version: ApiVersion,

    #[arg(
        long,
        env = "EXAM_MONITOR_USER",
        help = "Name of the candidate taking the exam",
        default_value = "candidate"
    )]
    user: String,

    #[arg(
        long,
        env = "EXAM_MONITOR_TOKEN",
        hide_env_values = true,
        help = "Access token; requests are unauthenticated without one"
    )]
    token: Option<String>,

    #[arg(help = "Camera device or stream to monitor, as understood by ffmpeg")]
    source: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging to stdout via `tracing`
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let session = Session::new();
    if let Some(access_token) = args.token {
        session.login(Credentials {
            username: args.user,
            access_token,
        });
    }
    let api = ApiClient::new(&args.api_base, session.reader());
    let reader = session.reader();
    match reader.credentials() {
        Some(credentials) => info!(user = %credentials.username, "session ready"),
        None => info!(authenticated = reader.is_authenticated(), "session ready"),
    }
    info!(
        "delivering frames to {}",
        api.url(webcam::MONITOR_FRAME_PATH, args.api_version)
    );

    let mut source = Process::new(&args.source, args.format.as_deref(), args.fps)?;
    let stream = source.subscribe();

    let mut poller = Poller::new();
    if !poller.activate(&stream, MonitorEndpoint::new(api, args.api_version)) {
        source.stop().await?;
        bail!("webcam polling could not start");
    }

    let source_error = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("shutting down");
            None
        }
        err = source.closed() => Some(err),
    };

    poller.deactivate();
    if let Err(e) = source.stop().await {
        warn!("failed to stop video source: {e}");
    }
    session.logout();

    match source_error {
        Some(e) => Err(anyhow::Error::new(e).context("video source closed")),
        None => Ok(()),
    }
}
