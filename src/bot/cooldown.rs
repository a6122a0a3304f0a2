// src/bot/cooldown.rs - Per-trigger rate limiting for automated replies

use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Remembers when each trigger last produced an automated reply.
///
/// Keys are lowercased triggers, values are Unix seconds. Records live for
/// the whole process; the number of keys is bounded by the configured
/// triggers.
#[derive(Debug, Default)]
pub struct CooldownGate {
    last_fired: Mutex<HashMap<String, i64>>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and claim the reply slot for `trigger` in one step.
    ///
    /// Returns true and records `now` when the trigger has never fired or at
    /// least `cooldown_seconds` have passed since it last did. Otherwise the
    /// record is left as it was.
    pub fn try_fire(&self, trigger: &str, cooldown_seconds: i64, now: i64) -> bool {
        let key = trigger.to_lowercase();
        let mut last_fired = self.lock();

        if let Some(&last) = last_fired.get(&key) {
            let elapsed = now.saturating_sub(last);
            if elapsed < cooldown_seconds {
                debug!(
                    "Trigger '{}' is on cooldown for {} more seconds",
                    key,
                    cooldown_seconds.saturating_sub(elapsed)
                );
                return false;
            }
        }

        last_fired.insert(key, now);
        true
    }

    /// Time of the last fired reply for a trigger, if any
    pub fn last_fired(&self, trigger: &str) -> Option<i64> {
        self.lock().get(&trigger.to_lowercase()).copied()
    }

    pub fn tracked_triggers(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.last_fired.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
