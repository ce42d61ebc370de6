//! Single-use nonce claiming.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sigchain_storage::{NewNonce, NonceStore};
use tracing::{debug, warn};

use crate::error::{RejectReason, VerifyResult};

/// How a nonce was claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceClaim {
    /// First time this nonce was seen.
    Fresh,
    /// An earlier claim had expired unconsumed and was renewed.
    Refreshed,
}

/// Claims and consumes nonces against a [`NonceStore`].
///
/// Claiming relies entirely on the store's atomic steps: a unique insert,
/// and conditional refresh / consume updates. Two concurrent claims of the
/// same nonce cannot both succeed.
#[derive(Clone)]
pub struct NonceGuard {
    store: Arc<dyn NonceStore>,
    ttl: Duration,
}

impl std::fmt::Debug for NonceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceGuard")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl NonceGuard {
    /// Guard with the given claim lifetime.
    #[must_use]
    pub fn new(store: Arc<dyn NonceStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Claim lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Claim `nonce` at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`RejectReason::ReplayedNonce`] if the nonce is consumed or
    /// still claimed, or a storage error.
    pub async fn claim(
        &self,
        nonce: &str,
        agent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> VerifyResult<NonceClaim> {
        let new = NewNonce {
            nonce: nonce.to_string(),
            agent_id: agent_id.map(str::to_string),
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(now),
        };

        if self.store.insert_nonce_if_absent(new.clone()).await?.is_some() {
            debug!(nonce, "nonce claimed");
            return Ok(NonceClaim::Fresh);
        }

        let Some(existing) = self.store.get_nonce(nonce).await? else {
            // Row vanished between insert and read; one more insert decides.
            return match self.store.insert_nonce_if_absent(new).await? {
                Some(_) => Ok(NonceClaim::Fresh),
                None => Err(RejectReason::ReplayedNonce.into()),
            };
        };

        if existing.is_replay_at(now) {
            debug!(nonce, consumed = existing.consumed_at.is_some(), "nonce replay");
            return Err(RejectReason::ReplayedNonce.into());
        }

        match self.store.refresh_expired_nonce(new, now).await? {
            Some(_) => {
                debug!(nonce, "expired nonce refreshed");
                Ok(NonceClaim::Refreshed)
            },
            None => Err(RejectReason::ReplayedNonce.into()),
        }
    }

    /// Mark `nonce` consumed. Failures are logged, not returned.
    ///
    /// Returns whether this call consumed it.
    pub async fn consume(&self, nonce: &str, consumed_by: &str, now: DateTime<Utc>) -> bool {
        match self
            .store
            .consume_nonce_if_unconsumed(nonce, consumed_by, now)
            .await
        {
            Ok(Some(_)) => true,
            Ok(None) => {
                warn!(nonce, "nonce was already consumed");
                false
            },
            Err(e) => {
                warn!(nonce, error = %e, "failed to mark nonce consumed, replay protection degraded until expiry");
                false
            },
        }
    }
}
