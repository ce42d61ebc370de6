//! Row types shared by all backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEventRow {
    /// Event id.
    pub id: Uuid,
    /// Who performed the audited action.
    pub actor_id: String,
    /// What kind of action it was.
    pub event_type: String,
    /// Structured event payload.
    pub payload: serde_json::Value,
    /// Base64 signature over the event digest, `None` if unsigned.
    pub signature: Option<String>,
    /// Key id that produced `signature`.
    pub signer_kid: Option<String>,
    /// Hex digest of the previous event, `None` for the first event.
    pub prev_hash: Option<String>,
    /// Insertion time; non-decreasing in insertion order.
    pub created_at: DateTime<Utc>,
}

/// An audit event about to be appended.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    /// Who performed the audited action.
    pub actor_id: String,
    /// What kind of action it was.
    pub event_type: String,
    /// Structured event payload.
    pub payload: serde_json::Value,
    /// Base64 signature, `None` if unsigned.
    pub signature: Option<String>,
    /// Key id that produced `signature`.
    pub signer_kid: Option<String>,
    /// Hex digest of the previous event.
    pub prev_hash: Option<String>,
    /// Id of the latest event when `prev_hash` was computed.
    pub predecessor_id: Option<Uuid>,
}

/// What the store assigned on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedAuditEvent {
    /// New event id.
    pub id: Uuid,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// A replay-protection nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelNonce {
    /// Opaque nonce value (unique).
    pub nonce: String,
    /// Agent that presented the nonce, when known.
    pub agent_id: Option<String>,
    /// When the nonce was first claimed (or last refreshed).
    pub created_at: DateTime<Utc>,
    /// When the claim lapses.
    pub expires_at: DateTime<Utc>,
    /// When the nonce was consumed.
    pub consumed_at: Option<DateTime<Utc>>,
    /// Who consumed it (agent id or key id).
    pub consumed_by: Option<String>,
}

impl KernelNonce {
    /// Whether a second presentation of this nonce at `now` is a replay.
    ///
    /// A consumed nonce is always a replay. An unconsumed one is a replay
    /// until it expires.
    #[must_use]
    pub fn is_replay_at(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_some() || self.expires_at > now
    }

    /// Whether the claim has lapsed without being consumed.
    #[must_use]
    pub fn is_expired_unconsumed(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at <= now
    }
}

/// A nonce claim to insert.
#[derive(Debug, Clone)]
pub struct NewNonce {
    /// Opaque nonce value.
    pub nonce: String,
    /// Agent that presented the nonce.
    pub agent_id: Option<String>,
    /// Claim time.
    pub created_at: DateTime<Utc>,
    /// Expiry of the claim.
    pub expires_at: DateTime<Utc>,
}

impl NewNonce {
    pub(crate) fn into_row(self) -> KernelNonce {
        KernelNonce {
            nonce: self.nonce,
            agent_id: self.agent_id,
            created_at: self.created_at,
            expires_at: self.expires_at,
            consumed_at: None,
            consumed_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn nonce(expires_in: i64, consumed: bool) -> (KernelNonce, DateTime<Utc>) {
        let now = Utc::now();
        let row = KernelNonce {
            nonce: "n".into(),
            agent_id: None,
            created_at: now,
            expires_at: now + Duration::seconds(expires_in),
            consumed_at: consumed.then_some(now),
            consumed_by: None,
        };
        (row, now)
    }

    #[test]
    fn test_live_unconsumed_is_replay() {
        let (row, now) = nonce(60, false);
        assert!(row.is_replay_at(now));
        assert!(!row.is_expired_unconsumed(now));
    }

    #[test]
    fn test_consumed_is_always_replay() {
        let (row, now) = nonce(-60, true);
        assert!(row.is_replay_at(now));
        assert!(!row.is_expired_unconsumed(now));
    }

    #[test]
    fn test_expired_unconsumed_is_fresh_slot() {
        let (row, now) = nonce(-1, false);
        assert!(!row.is_replay_at(now));
        assert!(row.is_expired_unconsumed(now));

        // Expiry is inclusive: expires_at == now counts as expired.
        let (row, now) = nonce(0, false);
        assert!(row.is_expired_unconsumed(now));
    }
}
