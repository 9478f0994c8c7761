// libs/waiting-queue-cell/src/services/queue.rs
//
// Walk-in queue lifecycle. Every position mutation for one clinic and day
// runs under that queue's mutex so positions stay dense 1..N; different
// clinics and days proceed in parallel.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::TenantId;

use crate::error::QueueError;
use crate::models::{CheckInRequest, QueueEntryStatus, WaitingQueueEntry};
use crate::store::{AppointmentLifecycle, LifecycleEvent, QueueStore};

/// Keyed locks for per-(clinic, day) serialization.
#[derive(Default)]
struct QueueLockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl QueueLockRegistry {
    async fn acquire(&self, clinic_id: Uuid, day: NaiveDate) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(format!("queue:{}:{}", clinic_id, day))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct WaitingQueueService {
    store: Arc<dyn QueueStore>,
    lifecycle: Arc<dyn AppointmentLifecycle>,
    locks: QueueLockRegistry,
}

impl WaitingQueueService {
    pub fn new(store: Arc<dyn QueueStore>, lifecycle: Arc<dyn AppointmentLifecycle>) -> Self {
        Self {
            store,
            lifecycle,
            locks: QueueLockRegistry::default(),
        }
    }

    /// Today's queue for a clinic, ordered by position.
    pub async fn list(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<WaitingQueueEntry>, QueueError> {
        self.store.find(tenant, clinic_id, day).await
    }

    /// Add a patient to the back of today's queue. A patient already active
    /// in the queue cannot check in twice.
    pub async fn check_in(
        &self,
        tenant: TenantId,
        request: &CheckInRequest,
    ) -> Result<WaitingQueueEntry, QueueError> {
        let day = Utc::now().date_naive();
        let _guard = self.locks.acquire(request.clinic_id, day).await;

        let entries = self.store.find(tenant, request.clinic_id, day).await?;
        if entries
            .iter()
            .any(|e| e.patient_id == request.patient_id && e.is_active())
        {
            return Err(QueueError::Validation(format!(
                "patient {} is already in the queue",
                request.patient_id
            )));
        }

        let position = entries
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.position)
            .max()
            .unwrap_or(0)
            + 1;

        if let Some(appointment_id) = request.appointment_id {
            self.lifecycle
                .apply(tenant, appointment_id, LifecycleEvent::CheckedIn)
                .await?;
        }

        let now = Utc::now();
        let entry = self
            .store
            .save(WaitingQueueEntry {
                id: Uuid::new_v4(),
                tenant_id: tenant,
                clinic_id: request.clinic_id,
                patient_id: request.patient_id,
                appointment_id: request.appointment_id,
                position,
                status: QueueEntryStatus::Waiting,
                checked_in_at: now,
                called_at: None,
                service_started_at: None,
                service_ended_at: None,
                day,
                updated_at: now,
            })
            .await?;

        info!(
            "Patient {} checked in at clinic {} as position {}",
            entry.patient_id, entry.clinic_id, entry.position
        );
        Ok(entry)
    }

    /// Call the waiting patient with the lowest position.
    pub async fn call_next(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
    ) -> Result<WaitingQueueEntry, QueueError> {
        let day = Utc::now().date_naive();
        let _guard = self.locks.acquire(clinic_id, day).await;

        let entries = self.store.find(tenant, clinic_id, day).await?;
        let next = entries
            .into_iter()
            .filter(|e| e.status == QueueEntryStatus::Waiting)
            .min_by_key(|e| e.position)
            .ok_or(QueueError::NotFound)?;

        self.mark_called(next).await
    }

    /// Call a specific waiting patient. Skipping ahead of lower positions is
    /// permitted; it is logged for audit rather than rejected.
    pub async fn call(
        &self,
        tenant: TenantId,
        entry_id: Uuid,
    ) -> Result<WaitingQueueEntry, QueueError> {
        let target = self.store.find_by_id(tenant, entry_id).await?;
        let _guard = self.locks.acquire(target.clinic_id, target.day).await;

        // Re-read under the lock; the entry may have moved.
        let target = self.store.find_by_id(tenant, entry_id).await?;
        let entries = self.store.find(tenant, target.clinic_id, target.day).await?;
        let waiting_ahead: Vec<i32> = entries
            .iter()
            .filter(|e| e.status == QueueEntryStatus::Waiting && e.position < target.position)
            .map(|e| e.position)
            .collect();
        if !waiting_ahead.is_empty() {
            warn!(
                "Calling position {} at clinic {} ahead of waiting positions {:?}",
                target.position, target.clinic_id, waiting_ahead
            );
        }

        self.mark_called(target).await
    }

    async fn mark_called(
        &self,
        mut entry: WaitingQueueEntry,
    ) -> Result<WaitingQueueEntry, QueueError> {
        self.transition(&mut entry, QueueEntryStatus::Called)?;
        entry.called_at = Some(Utc::now());
        let entry = self.store.save(entry).await?;
        debug!(
            "Called queue entry {} (position {})",
            entry.id, entry.position
        );
        Ok(entry)
    }

    /// Begin service for a called patient.
    pub async fn start_service(
        &self,
        tenant: TenantId,
        entry_id: Uuid,
    ) -> Result<WaitingQueueEntry, QueueError> {
        let target = self.store.find_by_id(tenant, entry_id).await?;
        let _guard = self.locks.acquire(target.clinic_id, target.day).await;

        let mut entry = self.store.find_by_id(tenant, entry_id).await?;
        self.transition(&mut entry, QueueEntryStatus::InService)?;
        entry.service_started_at = Some(Utc::now());

        if let Some(appointment_id) = entry.appointment_id {
            self.lifecycle
                .apply(tenant, appointment_id, LifecycleEvent::ServiceStarted)
                .await?;
        }

        self.store.save(entry).await
    }

    /// End service. The entry leaves the queue and later positions shift
    /// down to keep positions dense.
    pub async fn complete_service(
        &self,
        tenant: TenantId,
        entry_id: Uuid,
    ) -> Result<WaitingQueueEntry, QueueError> {
        let target = self.store.find_by_id(tenant, entry_id).await?;
        let _guard = self.locks.acquire(target.clinic_id, target.day).await;

        let mut entry = self.store.find_by_id(tenant, entry_id).await?;
        self.transition(&mut entry, QueueEntryStatus::Done)?;
        entry.service_ended_at = Some(Utc::now());

        if let Some(appointment_id) = entry.appointment_id {
            self.lifecycle
                .apply(tenant, appointment_id, LifecycleEvent::Completed)
                .await?;
        }

        let entry = self.store.save(entry).await?;
        self.renumber_after(tenant, &entry).await?;
        info!(
            "Service complete for queue entry {} at clinic {}",
            entry.id, entry.clinic_id
        );
        Ok(entry)
    }

    /// Remove a waiting patient without service (no-show at the desk).
    pub async fn skip(
        &self,
        tenant: TenantId,
        entry_id: Uuid,
    ) -> Result<WaitingQueueEntry, QueueError> {
        let target = self.store.find_by_id(tenant, entry_id).await?;
        let _guard = self.locks.acquire(target.clinic_id, target.day).await;

        let mut entry = self.store.find_by_id(tenant, entry_id).await?;
        self.transition(&mut entry, QueueEntryStatus::Skipped)?;

        let entry = self.store.save(entry).await?;
        self.renumber_after(tenant, &entry).await?;
        info!(
            "Skipped queue entry {} (was position {}) at clinic {}",
            entry.id, entry.position, entry.clinic_id
        );
        Ok(entry)
    }

    fn transition(
        &self,
        entry: &mut WaitingQueueEntry,
        new_status: QueueEntryStatus,
    ) -> Result<(), QueueError> {
        if !entry.status.can_transition_to(&new_status) {
            return Err(QueueError::State {
                current: entry.status,
            });
        }
        entry.status = new_status;
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// Shift every active entry behind the removed one down by one. Caller
    /// holds the queue lock.
    async fn renumber_after(
        &self,
        tenant: TenantId,
        removed: &WaitingQueueEntry,
    ) -> Result<(), QueueError> {
        let entries = self
            .store
            .find(tenant, removed.clinic_id, removed.day)
            .await?;
        let shifted: Vec<WaitingQueueEntry> = entries
            .into_iter()
            .filter(|e| e.is_active() && e.position > removed.position)
            .map(|mut e| {
                e.position -= 1;
                e.updated_at = Utc::now();
                e
            })
            .collect();
        if shifted.is_empty() {
            return Ok(());
        }
        debug!(
            "Renumbering {} entries behind position {} at clinic {}",
            shifted.len(),
            removed.position,
            removed.clinic_id
        );
        self.store.save_all(shifted).await
    }
}
