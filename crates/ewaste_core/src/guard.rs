use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

type Key = (Uuid, &'static str);

/// Rejects a mutation while the same owner already has one of the same kind in flight.
#[derive(Clone, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<Mutex<HashSet<Key>>>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when `operation` is already running for `owner_id`.
    pub fn try_begin(&self, owner_id: Uuid, operation: &'static str) -> Option<InFlight> {
        let key = (owner_id, operation);
        let mut set = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(key) {
            return None;
        }
        Some(InFlight {
            key,
            in_flight: self.in_flight.clone(),
        })
    }
}

/// Held for the duration of a mutation; releases the slot on drop.
pub struct InFlight {
    key: Key,
    in_flight: Arc<Mutex<HashSet<Key>>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_submission_is_rejected_until_the_first_finishes() {
        let guard = SubmissionGuard::new();
        let owner = Uuid::new_v4();

        let first = guard.try_begin(owner, "collection_request");
        assert!(first.is_some());
        assert!(guard.try_begin(owner, "collection_request").is_none());

        // Other owners and other operations are unaffected.
        assert!(guard.try_begin(Uuid::new_v4(), "collection_request").is_some());
        assert!(guard.try_begin(owner, "dumping_report").is_some());

        drop(first);
        assert!(guard.try_begin(owner, "collection_request").is_some());
    }
}
