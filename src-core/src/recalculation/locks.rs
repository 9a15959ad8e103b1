use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Process-wide locks keyed by user and by month.
///
/// A recalculation holds its month shared and its user exclusively, so two
/// recalculations for one user never interleave while different users run
/// side by side. Finalization holds the month exclusively and therefore
/// waits for in-flight recalculations of that month.
#[derive(Default)]
pub struct LockRegistry {
    users: DashMap<String, Arc<Mutex<()>>>,
    months: DashMap<String, Arc<RwLock<()>>>,
}

pub struct RecalculationGuard {
    _user: OwnedMutexGuard<()>,
    _month: OwnedRwLockReadGuard<()>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.users.entry(user_id.to_string()).or_default().clone()
    }

    fn month_lock(&self, month: &str) -> Arc<RwLock<()>> {
        self.months.entry(month.to_string()).or_default().clone()
    }

    pub async fn lock_recalculation(&self, user_id: &str, month: &str) -> RecalculationGuard {
        let month_guard = self.month_lock(month).read_owned().await;
        let user_guard = self.user_lock(user_id).lock_owned().await;
        debug!("Acquired recalculation lock for user {} month {}", user_id, month);
        RecalculationGuard {
            _user: user_guard,
            _month: month_guard,
        }
    }

    pub async fn lock_finalization(&self, month: &str) -> OwnedRwLockWriteGuard<()> {
        let guard = self.month_lock(month).write_owned().await;
        debug!("Acquired finalization lock for month {}", month);
        guard
    }
}
