use crate::error::ClientError;
use crate::models::User;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerStatus {
    Initial,
    Pending,
    Authenticated,
    Anonymous,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    BootstrapStarted,
    ProfileLoaded(User),
    ProfileFailed(ClientError),
    SignedOut,
}

/// Viewer status state machine. Nothing leads back to `Initial`.
pub fn transition(status: ViewerStatus, event: &SessionEvent) -> ViewerStatus {
    match (status, event) {
        (ViewerStatus::Authenticated, SessionEvent::BootstrapStarted) => {
            ViewerStatus::Authenticated
        }
        (_, SessionEvent::BootstrapStarted) => ViewerStatus::Pending,
        (_, SessionEvent::ProfileLoaded(_)) => ViewerStatus::Authenticated,
        (_, SessionEvent::ProfileFailed(err)) if err.is_auth() => ViewerStatus::Anonymous,
        // Network and shape failures are not a verdict on the session.
        (current, SessionEvent::ProfileFailed(_)) => current,
        (_, SessionEvent::SignedOut) => ViewerStatus::Anonymous,
    }
}

struct ViewerState {
    status: ViewerStatus,
    user: Option<User>,
}

/// Who is logged in, and whether that is known yet.
#[derive(Clone)]
pub struct ViewerSession {
    state: Arc<RwLock<ViewerState>>,
    status_tx: Arc<watch::Sender<ViewerStatus>>,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerSession {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(ViewerStatus::Initial);
        Self {
            state: Arc::new(RwLock::new(ViewerState {
                status: ViewerStatus::Initial,
                user: None,
            })),
            status_tx: Arc::new(status_tx),
        }
    }

    pub fn status(&self) -> ViewerStatus {
        self.state.read().status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == ViewerStatus::Authenticated
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewerStatus> {
        self.status_tx.subscribe()
    }

    /// Applies an event and returns the resulting status.
    pub fn apply(&self, event: SessionEvent) -> ViewerStatus {
        let (previous, next) = {
            let mut state = self.state.write();
            let previous = state.status;
            let next = transition(previous, &event);
            match event {
                SessionEvent::ProfileLoaded(user) => state.user = Some(user),
                SessionEvent::SignedOut => state.user = None,
                SessionEvent::ProfileFailed(err) if err.is_auth() => state.user = None,
                _ => {}
            }
            state.status = next;
            (previous, next)
        };
        if previous != next {
            tracing::info!(from = ?previous, to = ?next, "viewer status changed");
            self.status_tx.send_replace(next);
        }
        next
    }

    pub fn begin(&self) -> ViewerStatus {
        self.apply(SessionEvent::BootstrapStarted)
    }

    /// Resolves the session from the outcome of a "who am I" fetch.
    pub fn resolve(&self, profile: Result<User, ClientError>) -> ViewerStatus {
        match profile {
            Ok(user) => self.apply(SessionEvent::ProfileLoaded(user)),
            Err(err) => {
                if !err.is_auth() {
                    tracing::warn!(%err, "profile fetch failed; session stays unresolved");
                }
                self.apply(SessionEvent::ProfileFailed(err))
            }
        }
    }

    pub fn sign_out(&self) -> ViewerStatus {
        self.apply(SessionEvent::SignedOut)
    }
}
