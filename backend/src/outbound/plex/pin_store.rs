//! In-memory store for pending plex.tv OAuth PINs.
//!
//! A redeemer without a Plex token starts the PIN flow before the invitation
//! is redeemed; the pending PIN lives here between the initial request and
//! the poll that claims its token. Entries expire after a TTL with a small
//! random spread so a burst of simultaneous sign-ins does not purge in
//! lockstep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Base lifetime of a pending PIN, matching plex.tv's own PIN expiry.
pub const DEFAULT_PIN_TTL_SECONDS: i64 = 600;
/// Upper bound of the random spread added to each entry's lifetime.
pub const PIN_TTL_JITTER_SECONDS: i64 = 30;

/// An OAuth PIN issued by plex.tv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlexPin {
    /// plex.tv PIN identifier, used to poll for the token.
    pub id: i64,
    /// Short code the redeemer enters at plex.tv/link.
    pub code: String,
    /// Auth token, present once the redeemer approved the PIN.
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredPin {
    pin: PlexPin,
    expires_at: DateTime<Utc>,
}

/// Tracks pending PINs and evicts the ones past their lifetime.
pub struct PinStore {
    entries: Mutex<HashMap<i64, StoredPin>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    jitter_seconds: i64,
}

impl PinStore {
    /// Create a store with the default TTL and jitter.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            ttl: Duration::seconds(DEFAULT_PIN_TTL_SECONDS),
            jitter_seconds: PIN_TTL_JITTER_SECONDS,
        }
    }

    /// Create a store with an explicit TTL and no jitter.
    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            ttl,
            jitter_seconds: 0,
        }
    }

    /// Record a pending PIN, replacing any previous entry with the same id.
    pub fn insert(&self, pin: PlexPin) {
        let now = self.clock.utc();
        let expires_at = now + self.ttl + self.jitter();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);
        entries.insert(pin.id, StoredPin { pin, expires_at });
    }

    /// Look up a pending PIN without removing it.
    pub fn pending(&self, id: i64) -> Option<PlexPin> {
        let now = self.clock.utc();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);
        entries.get(&id).map(|stored| stored.pin.clone())
    }

    /// Remove and return a pending PIN once its token has been claimed.
    pub fn claim(&self, id: i64) -> Option<PlexPin> {
        let now = self.clock.utc();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);
        entries.remove(&id).map(|stored| stored.pin)
    }

    /// Number of live entries, after purging expired ones.
    pub fn len(&self) -> usize {
        let now = self.clock.utc();
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, now);
        entries.len()
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn jitter(&self) -> Duration {
        if self.jitter_seconds == 0 {
            return Duration::zero();
        }
        let mut rng = SmallRng::from_entropy();
        Duration::seconds(rng.gen_range(0..=self.jitter_seconds))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, StoredPin>> {
        // A poisoned lock only means another thread panicked mid-update;
        // the map itself is still a coherent set of entries.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn purge_expired(entries: &mut HashMap<i64, StoredPin>, now: DateTime<Utc>) {
        let before = entries.len();
        entries.retain(|_, stored| stored.expires_at > now);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired plex pins");
        }
    }
}
