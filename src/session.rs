use tokio::sync::watch;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Credentials {
    pub username: String,
    pub access_token: String,
}

/// Authentication state for the running agent. Owning a `Session` is the
/// capability to log in and out; everything else gets a [`SessionReader`].
#[derive(Debug)]
pub(crate) struct Session {
    state: watch::Sender<Option<Credentials>>,
}

/// Read-only view of a [`Session`], always reflecting its latest state.
#[derive(Clone, Debug)]
pub(crate) struct SessionReader {
    state: watch::Receiver<Option<Credentials>>,
}

impl Session {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader {
            state: self.state.subscribe(),
        }
    }

    pub fn login(&self, credentials: Credentials) {
        info!("logged in as {}", credentials.username);
        self.state.send_replace(Some(credentials));
    }

    pub fn logout(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            info!("logged out {}", previous.username);
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionReader {
    pub fn credentials(&self) -> Option<Credentials> {
        self.state.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .borrow()
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }
}
