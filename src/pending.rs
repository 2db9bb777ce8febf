//! Pending-action ledger
//!
//! Short-lived server-held state bridging the two-step "offer, then confirm
//! via callback" interaction. Callbacks carry only an opaque token; the
//! record or name it resolves to never leaves the server, so a client cannot
//! tamper with what gets committed.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::Record;
use crate::types::{CertwatchError, Result};

/// Default token lifetime: 15 minutes
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// What a confirmed callback should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingIntent {
    /// Add an entry with the carried record as its snapshot
    RegisterRecord(Record),
    /// Add an entry with no snapshot for a not-yet-certified model
    RegisterBare(String),
    /// Remove all entries registered under the name
    Remove(String),
    /// Acknowledge and do nothing
    Cancel,
}

/// One ledger row, bound to the caller that created it
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub intent: PendingIntent,
    pub notify_target: String,
    expires_at: Instant,
}

/// Ephemeral token-to-action mapping with TTL eviction
///
/// Never persisted; a restart simply invalidates outstanding offers.
pub struct PendingLedger {
    actions: DashMap<String, PendingAction>,
    ttl: Duration,
}

impl PendingLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            actions: DashMap::new(),
            ttl,
        }
    }

    /// Store an action and return its opaque token
    pub fn insert(&self, intent: PendingIntent, notify_target: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.actions.insert(
            token.clone(),
            PendingAction {
                intent,
                notify_target: notify_target.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Consume a token, returning its action
    ///
    /// The token is deleted on first use. A token past its TTL fails even
    /// before the sweeper has removed it.
    pub fn take(&self, token: &str) -> Result<PendingAction> {
        let (_, action) = self
            .actions
            .remove(token)
            .ok_or_else(|| CertwatchError::NotFound(token.to_string()))?;
        if action.expires_at <= Instant::now() {
            return Err(CertwatchError::ExpiredToken);
        }
        Ok(action)
    }

    /// Drop expired rows; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.actions.len();
        self.actions.retain(|_, action| action.expires_at > now);
        before - self.actions.len()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Spawn a background task to periodically drop expired tokens
pub fn spawn_cleanup_task(ledger: Arc<PendingLedger>) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60);
        loop {
            tokio::time::sleep(interval).await;
            let removed = ledger.cleanup();
            if removed > 0 {
                debug!(removed, "Pending-action cleanup removed expired tokens");
            }
        }
    });
    info!("Pending-action cleanup task started");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_consumed_on_first_use() {
        let ledger = PendingLedger::new(DEFAULT_TTL);
        let token = ledger.insert(PendingIntent::RegisterBare("A".to_string()), "chan");

        let action = ledger.take(&token).unwrap();
        assert_eq!(action.intent, PendingIntent::RegisterBare("A".to_string()));
        assert_eq!(action.notify_target, "chan");

        assert!(matches!(
            ledger.take(&token),
            Err(CertwatchError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_token_misses() {
        let ledger = PendingLedger::new(DEFAULT_TTL);
        assert!(matches!(
            ledger.take("no-such-token"),
            Err(CertwatchError::NotFound(_))
        ));
    }

    #[test]
    fn expired_token_fails_and_cleanup_sweeps() {
        let ledger = PendingLedger::new(Duration::from_millis(0));
        let token = ledger.insert(PendingIntent::Cancel, "");
        std::thread::sleep(Duration::from_millis(5));

        assert!(matches!(
            ledger.take(&token),
            Err(CertwatchError::ExpiredToken)
        ));

        let other = ledger.insert(PendingIntent::Cancel, "");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ledger.cleanup(), 1);
        assert!(ledger.take(&other).is_err());
        assert!(ledger.is_empty());
    }
}
