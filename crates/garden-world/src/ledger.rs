//! Per-actor placement cooldown.

use crate::storage::{keys, KeyValueStore};
use chrono::{DateTime, TimeZone, Utc};
use garden_core::{PlacementConfig, PlacementError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Last placement time per actor, persisted as one JSON map of epoch millis
pub struct PlacementLedger {
    store: Arc<dyn KeyValueStore>,
    config: PlacementConfig,
}

impl PlacementLedger {
    pub fn new(store: Arc<dyn KeyValueStore>, config: PlacementConfig) -> Self {
        Self { store, config }
    }

    pub fn is_enforced(&self) -> bool {
        self.config.enforce_cooldown
    }

    fn load(&self) -> HashMap<String, i64> {
        let raw = match self.store.get(keys::LAST_PLACEMENT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashMap::new(),
            Err(e) => {
                warn!(event = "ledger_read_failed", error = %e, "Failed to read placement ledger");
                return HashMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(event = "ledger_corrupt", error = %e, "Discarding unreadable placement ledger");
            HashMap::new()
        })
    }

    fn save(&self, entries: &HashMap<String, i64>) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.store.set(keys::LAST_PLACEMENT, &json)
    }

    pub fn last_placement(&self, actor: &str) -> Option<DateTime<Utc>> {
        let millis = *self.load().get(actor)?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Zero when the actor may place now
    pub fn time_until_next_placement(&self, actor: &str, now: DateTime<Utc>) -> Duration {
        if !self.config.enforce_cooldown {
            return Duration::ZERO;
        }
        let Some(last) = self.last_placement(actor) else {
            return Duration::ZERO;
        };

        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.config.cooldown().saturating_sub(elapsed)
    }

    pub fn can_place(&self, actor: &str, now: DateTime<Utc>) -> bool {
        self.time_until_next_placement(actor, now).is_zero()
    }

    pub fn check(&self, actor: &str, now: DateTime<Utc>) -> std::result::Result<(), PlacementError> {
        let remaining = self.time_until_next_placement(actor, now);
        if remaining.is_zero() {
            Ok(())
        } else {
            Err(PlacementError::CooldownActive { remaining })
        }
    }

    pub fn record_placement(&self, actor: &str, now: DateTime<Utc>) -> Result<()> {
        let mut entries = self.load();
        entries.insert(actor.to_string(), now.timestamp_millis());
        self.save(&entries)
    }

    /// Forget one actor, or everyone when `actor` is `None`
    pub fn reset(&self, actor: Option<&str>) -> Result<()> {
        match actor {
            Some(actor) => {
                let mut entries = self.load();
                if entries.remove(actor).is_some() {
                    self.save(&entries)?;
                }
            }
            None => self.store.remove(keys::LAST_PLACEMENT)?,
        }
        info!(event = "ledger_reset", actor = actor.unwrap_or("*"), "Placement cooldown reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use garden_core::format_remaining;

    fn ledger(store: &MemoryStore) -> PlacementLedger {
        PlacementLedger::new(Arc::new(store.clone()), PlacementConfig::default())
    }

    fn at(hours: i64, minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
            + chrono::Duration::hours(hours)
            + chrono::Duration::minutes(minutes)
    }

    #[test]
    fn test_first_placement_is_free() {
        let store = MemoryStore::new();
        let ledger = ledger(&store);
        assert!(ledger.can_place("alice", at(0, 0)));
        assert!(ledger.check("alice", at(0, 0)).is_ok());
    }

    #[test]
    fn test_cooldown_counts_down() {
        let store = MemoryStore::new();
        let ledger = ledger(&store);
        ledger.record_placement("alice", at(0, 0)).unwrap();

        assert!(!ledger.can_place("alice", at(1, 0)));
        assert!(ledger.can_place("bob", at(1, 0)));

        let remaining = ledger.time_until_next_placement("alice", at(22, 55));
        assert_eq!(format_remaining(remaining), "1h 5m");
        assert!(matches!(
            ledger.check("alice", at(22, 55)),
            Err(PlacementError::CooldownActive { .. })
        ));

        assert!(ledger.can_place("alice", at(24, 0)));
    }

    #[test]
    fn test_ledger_persists_in_store() {
        let store = MemoryStore::new();
        ledger(&store).record_placement("alice", at(0, 0)).unwrap();
        // A new ledger over the same store sees the record
        assert_eq!(ledger(&store).last_placement("alice"), Some(at(0, 0)));
    }

    #[test]
    fn test_reset() {
        let store = MemoryStore::new();
        let ledger = ledger(&store);
        ledger.record_placement("alice", at(0, 0)).unwrap();
        ledger.record_placement("bob", at(0, 0)).unwrap();

        ledger.reset(Some("alice")).unwrap();
        assert!(ledger.can_place("alice", at(0, 1)));
        assert!(!ledger.can_place("bob", at(0, 1)));

        ledger.reset(None).unwrap();
        assert!(ledger.can_place("bob", at(0, 1)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_disabled_ledger_never_blocks() {
        let store = MemoryStore::new();
        let ledger = PlacementLedger::new(
            Arc::new(store.clone()),
            PlacementConfig {
                enforce_cooldown: false,
                ..PlacementConfig::default()
            },
        );
        ledger.record_placement("alice", at(0, 0)).unwrap();
        assert!(ledger.can_place("alice", at(0, 1)));
    }

    #[test]
    fn test_corrupt_ledger_is_treated_as_empty() {
        let store = MemoryStore::new();
        store.set(keys::LAST_PLACEMENT, "not json").unwrap();
        assert!(ledger(&store).can_place("alice", at(0, 0)));
    }
}
