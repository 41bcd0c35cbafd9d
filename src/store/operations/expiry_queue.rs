use chrono::{DateTime, Utc};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// One due entry from the attempt expiry queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryEntry {
    pub fire_at_ms: i64,
    pub test_result_id: String,
}

impl Store {
    /// Durable delayed-queue entry; the expiry worker scans for due keys.
    pub fn enqueue_attempt_expiry(
        &self,
        fire_at: DateTime<Utc>,
        test_result_id: &str,
    ) -> Result<(), StoreError> {
        let key = keys::expiry_queue_key(fire_at.timestamp_millis(), test_result_id);
        self.attempt_expiry_queue.insert(key.as_bytes(), &[])?;
        Ok(())
    }

    /// Entries whose fire-at time is at or before `now`, oldest first.
    pub fn due_expiry_entries(&self, now: DateTime<Utc>) -> Result<Vec<ExpiryEntry>, StoreError> {
        let upper = keys::expiry_queue_upper_bound(now.timestamp_millis());
        let mut entries = Vec::new();
        for item in self.attempt_expiry_queue.range(..upper.as_bytes().to_vec()) {
            let (k, _) = item?;
            if let Some((fire_at_ms, test_result_id)) = keys::parse_expiry_queue_key(&k) {
                entries.push(ExpiryEntry {
                    fire_at_ms,
                    test_result_id,
                });
            }
        }
        Ok(entries)
    }

    pub fn remove_expiry_entry(&self, entry: &ExpiryEntry) -> Result<(), StoreError> {
        let key = keys::expiry_queue_key(entry.fire_at_ms, &entry.test_result_id);
        self.attempt_expiry_queue.remove(key.as_bytes())?;
        Ok(())
    }
}
