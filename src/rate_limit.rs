use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Per-integration spacing gate for provider calls.
///
/// Every outbound call — queue processor and bulk importer alike — must
/// `acquire` before sending. The gate sleeps until at least
/// `min_spacing` has passed since the previous call start for the same
/// integration. Slots are independent, so a slow integration never
/// delays another.
pub struct ProviderGate {
    min_spacing: Duration,
    /// integration id -> last call start
    slots: DashMap<Uuid, Arc<Mutex<Option<Instant>>>>,
}

impl ProviderGate {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            slots: DashMap::new(),
        }
    }

    /// Wait for this integration's slot, then stamp the call start.
    ///
    /// The slot mutex is held across the sleep, so concurrent callers for
    /// one integration queue up and leave spaced out in arrival order.
    pub async fn acquire(&self, integration_id: Uuid) {
        let slot = self
            .slots
            .entry(integration_id)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last = slot.lock().await;
        if let Some(prev) = *last {
            let ready = prev + self.min_spacing;
            if ready > Instant::now() {
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Drop slots idle longer than `max_age`.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.slots.retain(|_, slot| {
            slot.try_lock()
                .map(|last| matches!(*last, Some(prev) if now.duration_since(prev) < max_age))
                .unwrap_or(true)
        });
    }
}
