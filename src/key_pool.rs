//! Round-robin credential pool with a soft per-key usage ceiling

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::{AirsheetError, Result};

/// Usage units charged per successful attempt: one weather call plus one
/// pollution call.
pub const CALLS_PER_ATTEMPT: u32 = 2;

/// A credential handed out by the pool. Remembers its slot so usage is
/// charged to the right counter.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    slot: usize,
    secret: Arc<str>,
}

impl ApiKey {
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(#{})", self.slot)
    }
}

#[derive(Debug)]
struct PoolState {
    usage: Vec<u32>,
    cursor: usize,
}

/// Fixed set of keys rotated in configuration order.
///
/// Counters live for the lifetime of the pool and start at zero.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<ApiKey>,
    ceiling: u32,
    cooldown: Duration,
    state: Mutex<PoolState>,
}

impl KeyPool {
    pub fn new<I, S>(keys: I, ceiling: u32, cooldown: Duration) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<ApiKey> = keys
            .into_iter()
            .enumerate()
            .map(|(slot, key)| ApiKey {
                slot,
                secret: Arc::from(key.as_ref()),
            })
            .collect();

        if keys.is_empty() {
            return Err(AirsheetError::config("Key pool needs at least one API key"));
        }

        let usage = vec![0; keys.len()];
        Ok(Self {
            keys,
            ceiling,
            cooldown,
            state: Mutex::new(PoolState { usage, cursor: 0 }),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Next key under the ceiling. When every key is at the ceiling the
    /// caller waits out the cool-down and gets the next key regardless of
    /// its count.
    pub async fn acquire(&self) -> ApiKey {
        if let Some(key) = self.next_under_ceiling() {
            return key;
        }

        warn!(
            keys = self.keys.len(),
            ceiling = self.ceiling,
            cooldown_secs = self.cooldown.as_secs(),
            "All API keys reached their ceiling, cooling down"
        );
        tokio::time::sleep(self.cooldown).await;

        let mut state = self.lock();
        let slot = Self::advance(&mut state, self.keys.len());
        debug!(slot, usage = state.usage[slot], "Handing out key after cool-down");
        self.keys[slot].clone()
    }

    /// Charge one successful dual-call to `key`.
    pub fn record_success(&self, key: &ApiKey) {
        let mut state = self.lock();
        if let Some(count) = state.usage.get_mut(key.slot) {
            *count = count.saturating_add(CALLS_PER_ATTEMPT);
            debug!(slot = key.slot, usage = *count, "Recorded key usage");
        }
    }

    #[must_use]
    pub fn usage(&self, key: &ApiKey) -> u32 {
        self.lock().usage.get(key.slot).copied().unwrap_or_default()
    }

    /// Usage counters in configuration order
    #[must_use]
    pub fn snapshot(&self) -> Vec<u32> {
        self.lock().usage.clone()
    }

    fn next_under_ceiling(&self) -> Option<ApiKey> {
        let mut state = self.lock();
        for _ in 0..self.keys.len() {
            let slot = Self::advance(&mut state, self.keys.len());
            if state.usage[slot] < self.ceiling {
                return Some(self.keys[slot].clone());
            }
        }
        None
    }

    fn advance(state: &mut PoolState, len: usize) -> usize {
        let slot = state.cursor;
        state.cursor = (state.cursor + 1) % len;
        slot
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Counters are plain integers, a poisoned guard is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
