//! Monthly AI call allowance for a workspace
//!
//! Usage is stored under `ai/quota` as `{ "period": "YYYY-MM", "used": n }`
//! and resets when the calendar month changes.

use chrono::Local;
use riskwise_core::{Notifier, QuotaDecision, QuotaGuard, QuotaState, Storage, ToastLevel};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub const QUOTA_KEY: &str = "ai/quota";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
struct QuotaRecord {
    period: String,
    used: u32,
}

pub struct WorkspaceQuota {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    limit: u32,
    period: Option<String>,
    // Serializes read-modify-write of the stored record
    write_lock: Mutex<()>,
}

impl WorkspaceQuota {
    pub fn new(storage: Arc<dyn Storage>, notifier: Arc<dyn Notifier>, limit: u32) -> Self {
        Self {
            storage,
            notifier,
            limit,
            period: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Pin the accounting period instead of following the clock
    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn period(&self) -> String {
        self.period
            .clone()
            .unwrap_or_else(|| Local::now().format("%Y-%m").to_string())
    }

    fn load(&self) -> QuotaRecord {
        let period = self.period();
        let stored = self
            .storage
            .get(QUOTA_KEY)
            .and_then(|raw| match serde_json::from_str::<QuotaRecord>(&raw) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(error = %err, "ignoring unreadable quota record");
                    None
                }
            });
        match stored {
            Some(record) if record.period == period => record,
            _ => QuotaRecord { period, used: 0 },
        }
    }
}

impl QuotaGuard for WorkspaceQuota {
    fn can_make_call(&self) -> QuotaDecision {
        let record = self.load();
        if record.used < self.limit {
            QuotaDecision::allow()
        } else {
            QuotaDecision::deny(format!(
                "Monthly AI suggestion limit reached ({} of {} used)",
                record.used, self.limit
            ))
        }
    }

    fn record_call(&self) -> Result<(), String> {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut record = self.load();
        record.used = record.used.saturating_add(1);
        let encoded = serde_json::to_string(&record)
            .map_err(|err| format!("Failed to encode quota record: {}", err))?;
        if let Err(err) = self.storage.set(QUOTA_KEY, &encoded) {
            warn!(error = %err, "failed to persist quota usage");
            return Err(format!("Failed to persist quota usage: {}", err));
        }
        info!(used = record.used, limit = self.limit, period = %record.period, "AI call recorded");
        Ok(())
    }

    fn show_limit_notice(&self, decision: &QuotaDecision) {
        let reason = decision
            .reason
            .as_deref()
            .unwrap_or("Monthly AI suggestion limit reached");
        self.notifier.toast(
            &format!(
                "{}. Upgrade your plan for more AI suggestions; template suggestions remain available.",
                reason
            ),
            ToastLevel::Warning,
        );
    }

    fn state(&self) -> QuotaState {
        let record = self.load();
        QuotaState {
            used: record.used,
            limit: self.limit,
            period: record.period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct Toasts(Mutex<Vec<(String, ToastLevel)>>);

    impl Notifier for Toasts {
        fn acknowledge(&self, _field_id: &str) {}
        fn toast(&self, message: &str, level: ToastLevel) {
            self.0.lock().unwrap().push((message.to_string(), level));
        }
    }

    fn quota(storage: Arc<MemoryStore>, limit: u32) -> (WorkspaceQuota, Arc<Toasts>) {
        let toasts = Arc::new(Toasts::default());
        let guard = WorkspaceQuota::new(storage, toasts.clone(), limit).with_period("2026-10");
        (guard, toasts)
    }

    #[test]
    fn test_allows_until_limit() {
        let storage = Arc::new(MemoryStore::new());
        let (guard, _) = quota(storage.clone(), 2);
        assert!(guard.can_make_call().allowed);
        guard.record_call().unwrap();
        guard.record_call().unwrap();

        let decision = guard.can_make_call();
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("2 of 2"));
        assert_eq!(
            guard.state(),
            QuotaState {
                used: 2,
                limit: 2,
                period: "2026-10".into()
            }
        );
        assert_eq!(
            storage.get(QUOTA_KEY).as_deref(),
            Some(r#"{"period":"2026-10","used":2}"#)
        );
    }

    #[test]
    fn test_new_month_resets_usage() {
        let storage =
            Arc::new(MemoryStore::new().with(QUOTA_KEY, r#"{"period":"2026-09","used":50}"#));
        let (guard, _) = quota(storage, 50);
        assert_eq!(guard.state().used, 0);
        assert!(guard.can_make_call().allowed);
        guard.record_call().unwrap();
        assert_eq!(guard.state().used, 1);
        assert_eq!(guard.state().period, "2026-10");
    }

    #[test]
    fn test_unreadable_record_starts_fresh() {
        let storage = Arc::new(MemoryStore::new().with(QUOTA_KEY, "not json"));
        let (guard, _) = quota(storage, 5);
        assert_eq!(
            guard.state(),
            QuotaState {
                used: 0,
                limit: 5,
                period: "2026-10".into()
            }
        );
    }

    #[test]
    fn test_zero_limit_denies() {
        let (guard, _) = quota(Arc::new(MemoryStore::new()), 0);
        assert!(!guard.can_make_call().allowed);
    }

    #[test]
    fn test_limit_notice_is_upsell_toast() {
        let (guard, toasts) = quota(Arc::new(MemoryStore::new()), 0);
        guard.show_limit_notice(&guard.can_make_call());
        let toasts = toasts.0.lock().unwrap();
        assert_eq!(toasts.len(), 1);
        assert!(toasts[0].0.contains("Upgrade your plan"));
        assert_eq!(toasts[0].1, ToastLevel::Warning);
    }

    struct ReadOnlyStore(MemoryStore);

    impl Storage for ReadOnlyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), String> {
            Err("store is read-only".to_string())
        }
    }

    #[test]
    fn test_unpersisted_call_is_reported() {
        let storage = Arc::new(ReadOnlyStore(
            MemoryStore::new().with(QUOTA_KEY, r#"{"period":"2026-10","used":1}"#),
        ));
        let guard = WorkspaceQuota::new(storage, Arc::new(Toasts::default()), 5)
            .with_period("2026-10");

        let err = guard.record_call().unwrap_err();
        assert!(err.contains("read-only"));
        assert_eq!(guard.state().used, 1);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let storage = Arc::new(MemoryStore::new());
        let (guard, _) = quota(storage, 100);
        let guard = Arc::new(guard);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || guard.record_call().unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(guard.state().used, 8);
    }
}
