//! Settles attempts whose time window has elapsed. Runs every minute and
//! drains the durable fire-at queue: delivery is at least once, and the
//! lifecycle's submitted guard makes redelivery a no-op.

use chrono::Utc;

use crate::exam::lifecycle::AttemptLifecycle;
use crate::store::Store;

pub async fn run(store: &Store, lifecycle: &AttemptLifecycle) {
    let now = Utc::now();
    let due = match store.due_expiry_entries(now) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(error = %e, "Failed to scan attempt expiry queue");
            return;
        }
    };
    if due.is_empty() {
        return;
    }
    tracing::info!(count = due.len(), "Processing due attempt expiries");

    for entry in due {
        match lifecycle.finalize_expired(&entry.test_result_id).await {
            Ok(Some(outcome)) => {
                tracing::info!(
                    test_result_id = %entry.test_result_id,
                    passed = outcome.passed,
                    "Expired attempt finalized"
                );
            }
            Ok(None) => {
                // Already submitted, or the result is gone.
                tracing::debug!(
                    test_result_id = %entry.test_result_id,
                    "Expiry entry had nothing to settle"
                );
            }
            Err(e) => {
                tracing::error!(
                    test_result_id = %entry.test_result_id,
                    error = %e,
                    "Failed to finalize expired attempt, dropping queue entry"
                );
            }
        }
        if let Err(e) = store.remove_expiry_entry(&entry) {
            tracing::error!(
                test_result_id = %entry.test_result_id,
                error = %e,
                "Failed to remove expiry queue entry"
            );
        }
    }
}
