use crate::models::{SessionEvent, SessionEventKind};
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;
pub const DEFAULT_REVOCATION_TTL: Duration = Duration::from_secs(3600);

const MAX_TRACKED_ACCOUNTS: u64 = 100_000;

/// Fan-out of identity provider session changes.
///
/// A sign-out revokes the account's sessions until the next sign-in or until
/// the revocation TTL lapses. Guards subscribe while a check is in flight so a
/// sign-out can preempt it.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
    /// Latest event per account, keyed by account id.
    latest: Cache<String, (DateTime<Utc>, SessionEventKind)>,
    generation: Arc<AtomicU64>,
}

impl SessionEvents {
    pub fn new(capacity: usize, revocation_ttl: Duration) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            latest: Cache::builder()
                .max_capacity(MAX_TRACKED_ACCOUNTS)
                .time_to_live(revocation_ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records the event and notifies every subscriber.
    ///
    /// An event older than the one already recorded for the account is
    /// dropped and `false` is returned.
    pub fn publish(&self, event: SessionEvent) -> bool {
        let incoming = (event.occurred_at, event.kind);
        let recorded = self
            .latest
            .entry(event.account_id.clone())
            .and_upsert_with(|current| match current {
                Some(entry) if entry.value().0 > event.occurred_at => *entry.value(),
                _ => incoming,
            })
            .into_value();

        if recorded != incoming {
            tracing::warn!(
                "Ignoring out-of-order session event {:?} for account {} ({} < {})",
                event.kind,
                event.account_id,
                event.occurred_at,
                recorded.0
            );
            return false;
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            "Session event {:?} for account {}",
            event.kind,
            event.account_id
        );

        // No receivers is fine: nothing is in flight
        let _ = self.sender.send(event);
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn is_revoked(&self, account_id: &str) -> bool {
        matches!(
            self.latest.get(account_id),
            Some((_, SessionEventKind::SignedOut))
        )
    }

    /// Counter bumped by every accepted event. Readers compare two values to
    /// tell whether an event landed in between.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Resolves once `account_id` signs out on `receiver`.
    ///
    /// A lagged receiver may have missed the event, so lag falls back to the
    /// revocation check. A closed channel never resolves.
    pub async fn signed_out(mut receiver: broadcast::Receiver<SessionEvent>, account_id: &str) {
        loop {
            match receiver.recv().await {
                Ok(event)
                    if event.account_id == account_id
                        && event.kind == SessionEventKind::SignedOut =>
                {
                    return;
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Session event receiver lagged by {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY, DEFAULT_REVOCATION_TTL)
    }
}
