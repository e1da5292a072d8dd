use crate::error::{ClientError, RefreshError};
use crate::store::{Credential, IssuedVia, TokenStore};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;

/// Backend endpoints that issue access tokens.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges the ambient session proof (cookie) for a fresh access token.
    async fn refresh(&self) -> Result<String, RefreshError>;

    async fn login_by_phone(&self, phone: &str, password: &str) -> Result<String, ClientError>;
}

type RefreshFuture = Shared<BoxFuture<'static, Result<Credential, RefreshError>>>;

#[derive(Default)]
struct InFlight {
    next_id: u64,
    current: Option<(u64, RefreshFuture)>,
}

/// Reacquires the access credential. Concurrent callers share one request.
#[derive(Clone)]
pub struct CredentialRefresher {
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    in_flight: Arc<Mutex<InFlight>>,
}

impl CredentialRefresher {
    pub fn new(api: Arc<dyn AuthApi>, tokens: TokenStore) -> Self {
        Self {
            api,
            tokens,
            in_flight: Arc::new(Mutex::new(InFlight::default())),
        }
    }

    /// Refreshes the credential, joining an in-flight refresh if one exists.
    ///
    /// On success the new credential is already in the token store when this
    /// returns. On failure the store is left untouched.
    pub async fn refresh(&self) -> Result<Credential, RefreshError> {
        let pending = {
            let mut slot = self.in_flight.lock();
            match &slot.current {
                Some((id, pending)) => {
                    tracing::debug!(refresh_id = id, "joining in-flight refresh");
                    pending.clone()
                }
                None => {
                    slot.next_id += 1;
                    let id = slot.next_id;
                    let pending = run_refresh(
                        self.api.clone(),
                        self.tokens.clone(),
                        self.in_flight.clone(),
                        id,
                    )
                    .boxed()
                    .shared();
                    slot.current = Some((id, pending.clone()));
                    pending
                }
            }
        };
        pending.await
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.lock().current.is_some()
    }
}

async fn run_refresh(
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    in_flight: Arc<Mutex<InFlight>>,
    id: u64,
) -> Result<Credential, RefreshError> {
    tracing::debug!(refresh_id = id, "refreshing credential");
    let outcome = api.refresh().await;

    // Settled: the next caller must start a fresh request.
    {
        let mut slot = in_flight.lock();
        if slot.current.as_ref().map(|(current, _)| *current) == Some(id) {
            slot.current = None;
        }
    }

    match outcome {
        Ok(token) if token.is_empty() => {
            tracing::warn!(refresh_id = id, "refresh returned an empty token");
            Err(RefreshError::malformed("empty access token"))
        }
        Ok(token) => {
            tokens.set_credential(token, IssuedVia::Refresh);
            tracing::info!(refresh_id = id, "credential refreshed");
            Ok(tokens.get())
        }
        Err(err) => {
            tracing::warn!(refresh_id = id, reason = %err.reason, "credential refresh failed");
            Err(err)
        }
    }
}
