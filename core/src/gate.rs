//! Barrier in front of every authorized call.
//!
//! While the viewer is not authenticated, calls are parked until one refresh
//! cycle settles, then replayed once in the order they were issued. Once
//! authenticated, a call rejected as unauthenticated gets exactly one refresh
//! and one retry.

use crate::api::ProfileApi;
use crate::auth::CredentialRefresher;
use crate::error::ClientError;
use crate::session::ViewerSession;
use crate::store::{Credential, TokenStore};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct AuthGate {
    session: ViewerSession,
    tokens: TokenStore,
    refresher: CredentialRefresher,
    profile: Option<Arc<dyn ProfileApi>>,
    held: Arc<HoldQueue>,
}

impl AuthGate {
    pub fn new(session: ViewerSession, tokens: TokenStore, refresher: CredentialRefresher) -> Self {
        Self {
            session,
            tokens,
            refresher,
            profile: None,
            held: Arc::new(HoldQueue::default()),
        }
    }

    /// Resolves the viewer through `profile` whenever the barrier lifts, so
    /// the session leaves `Initial`/`Pending` after the first refresh cycle.
    pub fn with_profile(mut self, profile: Arc<dyn ProfileApi>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Number of operations currently parked behind a refresh.
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Runs an authorized operation under the barrier.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, ClientError>
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        // An authenticated session whose credential was cleared goes through
        // the barrier too; nothing is dispatched with an empty bearer.
        if self.session.is_authenticated() && !self.tokens.get().is_empty() {
            return self.with_retry(op).await;
        }

        // Ticket is taken before the first suspension point so replay order
        // is issuance order.
        let ticket = self.held.enqueue();
        tracing::debug!(ticket = ticket.id, "holding authorized call until refresh settles");
        let refreshed = self.refresher.refresh().await;
        self.held.wait_turn(&ticket).await;
        match refreshed {
            Ok(credential) => {
                self.resolve_viewer(&credential).await;
                let replay = op(credential);
                drop(ticket);
                replay.await
            }
            Err(err) => {
                tracing::debug!(ticket = ticket.id, reason = %err.reason, "dropping held call");
                Err(ClientError::unauthenticated())
            }
        }
    }

    /// Runs immediately with the stored credential instead of holding, used
    /// while the session itself is being resolved. An empty credential is
    /// refreshed first. Refresh failures keep their own kind.
    pub async fn attempt<T, F, Fut>(&self, op: F) -> Result<T, ClientError>
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let credential = self.tokens.get();
        if credential.is_empty() {
            let credential = self.refresher.refresh().await?;
            return op(credential).await;
        }
        match op(credential).await {
            Err(err) if err.is_unauthenticated() => {
                tracing::debug!("credential rejected; refreshing once");
                let credential = self.refresher.refresh().await?;
                op(credential).await
            }
            other => other,
        }
    }

    /// Runs under the first ticket only; later holders see the session
    /// already resolved.
    async fn resolve_viewer(&self, credential: &Credential) {
        let Some(profile) = &self.profile else {
            return;
        };
        if self.session.is_authenticated() {
            return;
        }
        let status = self.session.resolve(profile.me(credential).await);
        tracing::debug!(?status, "viewer resolved after refresh");
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, ClientError>
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        match op(self.tokens.get()).await {
            Err(err) if err.is_unauthenticated() => {
                tracing::debug!("credential rejected; refreshing once");
                let credential = self
                    .refresher
                    .refresh()
                    .await
                    .map_err(|_| ClientError::unauthenticated())?;
                op(credential).await
            }
            other => other,
        }
    }
}

/// Ordered set of outstanding tickets. A ticket may dispatch once every
/// ticket issued before it has dispatched or been dropped.
#[derive(Default)]
struct HoldQueue {
    state: Mutex<HoldState>,
    turn: Notify,
}

#[derive(Default)]
struct HoldState {
    next_ticket: u64,
    outstanding: BTreeSet<u64>,
}

struct Ticket<'a> {
    queue: &'a HoldQueue,
    id: u64,
}

impl HoldQueue {
    fn enqueue(&self) -> Ticket<'_> {
        let mut state = self.state.lock();
        let id = state.next_ticket;
        state.next_ticket += 1;
        state.outstanding.insert(id);
        Ticket { queue: self, id }
    }

    fn len(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    fn is_first(&self, id: u64) -> bool {
        self.state.lock().outstanding.first() == Some(&id)
    }

    async fn wait_turn(&self, ticket: &Ticket<'_>) {
        loop {
            let notified = self.turn.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_first(ticket.id) {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.queue.state.lock().outstanding.remove(&self.id);
        self.queue.turn.notify_waiters();
    }
}
