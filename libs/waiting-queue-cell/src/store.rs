// libs/waiting-queue-cell/src/store.rs
//
// Persistence seam for queue entries, plus the lifecycle hook through which
// queue transitions reach the appointment that backs an entry.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::TenantId;

use crate::error::QueueError;
use crate::models::WaitingQueueEntry;

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// All entries for the clinic and day, ordered by position.
    async fn find(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<WaitingQueueEntry>, QueueError>;

    async fn find_by_id(
        &self,
        tenant: TenantId,
        entry_id: Uuid,
    ) -> Result<WaitingQueueEntry, QueueError>;

    async fn save(&self, entry: WaitingQueueEntry) -> Result<WaitingQueueEntry, QueueError>;

    /// Persist a batch as one operation. Used by renumbering so readers never
    /// observe a half-shifted queue.
    async fn save_all(&self, entries: Vec<WaitingQueueEntry>) -> Result<(), QueueError>;
}

/// Queue events that map onto the backing appointment's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    CheckedIn,
    ServiceStarted,
    Completed,
}

/// Bridge into the appointment lifecycle, implemented by the API binary over
/// the scheduling cell. Entries without an appointment skip it entirely.
#[async_trait]
pub trait AppointmentLifecycle: Send + Sync {
    async fn apply(
        &self,
        tenant: TenantId,
        appointment_id: Uuid,
        event: LifecycleEvent,
    ) -> Result<(), QueueError>;
}

/// No-op bridge for walk-in-only deployments and tests.
pub struct NoAppointmentLifecycle;

#[async_trait]
impl AppointmentLifecycle for NoAppointmentLifecycle {
    async fn apply(
        &self,
        _tenant: TenantId,
        _appointment_id: Uuid,
        _event: LifecycleEvent,
    ) -> Result<(), QueueError> {
        Ok(())
    }
}

// ===== In-memory store =====

#[derive(Default)]
pub struct InMemoryQueueStore {
    entries: Arc<RwLock<HashMap<Uuid, WaitingQueueEntry>>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn find(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<WaitingQueueEntry>, QueueError> {
        let entries = self.entries.read().await;
        let mut found: Vec<WaitingQueueEntry> = entries
            .values()
            .filter(|e| e.tenant_id == tenant && e.clinic_id == clinic_id && e.day == day)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.position);
        Ok(found)
    }

    async fn find_by_id(
        &self,
        tenant: TenantId,
        entry_id: Uuid,
    ) -> Result<WaitingQueueEntry, QueueError> {
        let entries = self.entries.read().await;
        entries
            .get(&entry_id)
            .filter(|e| e.tenant_id == tenant)
            .cloned()
            .ok_or(QueueError::NotFound)
    }

    async fn save(&self, entry: WaitingQueueEntry) -> Result<WaitingQueueEntry, QueueError> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn save_all(&self, batch: Vec<WaitingQueueEntry>) -> Result<(), QueueError> {
        let mut entries = self.entries.write().await;
        for entry in batch {
            entries.insert(entry.id, entry);
        }
        Ok(())
    }
}
