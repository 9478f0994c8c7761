// libs/scheduling-cell/src/store.rs
//
// Collaborator contracts for the scheduling engine. Persistence technology
// is out of scope; these traits are the only seam the engine talks through.
// The in-memory implementation backs the API binary and the test suites.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::TenantId;

use crate::models::{
    Appointment, BlockedTimeSlot, ClinicSettings, DateRange, RecurringAppointmentPattern,
    SchedulingError, SchedulingNotification,
};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// All appointments for a clinic in the date range, optionally narrowed
    /// to one doctor (doctor-less rows are included either way, since they
    /// occupy the clinic-wide resource).
    async fn find(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        range: DateRange,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    /// NotFound covers both absence and tenant mismatch.
    async fn find_by_id(&self, tenant: TenantId, id: Uuid) -> Result<Appointment, SchedulingError>;

    async fn find_by_series(
        &self,
        tenant: TenantId,
        pattern_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn save(&self, appointment: Appointment) -> Result<Appointment, SchedulingError>;
}

#[async_trait]
pub trait BlockedSlotStore: Send + Sync {
    async fn find(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        range: DateRange,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<BlockedTimeSlot>, SchedulingError>;

    async fn save(&self, slot: BlockedTimeSlot) -> Result<BlockedTimeSlot, SchedulingError>;
}

#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn find_by_id(
        &self,
        tenant: TenantId,
        id: Uuid,
    ) -> Result<RecurringAppointmentPattern, SchedulingError>;

    async fn save(
        &self,
        pattern: RecurringAppointmentPattern,
    ) -> Result<RecurringAppointmentPattern, SchedulingError>;

    /// Persist a close-and-clone split atomically: the closed predecessor and
    /// its successor succeed or fail together.
    async fn save_pair(
        &self,
        closed: RecurringAppointmentPattern,
        successor: RecurringAppointmentPattern,
    ) -> Result<(), SchedulingError>;
}

/// Read-only clinic configuration collaborator. Returns an immutable
/// snapshot; callers never observe a half-applied config change.
#[async_trait]
pub trait ClinicDirectory: Send + Sync {
    async fn settings(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
    ) -> Result<ClinicSettings, SchedulingError>;
}

/// Outbound notification collaborator. Failures are logged and swallowed by
/// the caller; they never roll back a scheduling operation.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: SchedulingNotification) -> Result<(), SchedulingError>;
}

/// Default notifier: records the payload in the log stream. Real delivery
/// (email/SMS/WhatsApp) lives in an external service.
pub struct LoggingNotifier;

#[async_trait]
impl NotificationSender for LoggingNotifier {
    async fn send(&self, notification: SchedulingNotification) -> Result<(), SchedulingError> {
        info!("Dispatching notification: {:?}", notification);
        Ok(())
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Shared in-memory backing store. One instance serves every store trait plus
/// the clinic directory; all maps are tenant-checked on access.
#[derive(Default)]
pub struct InMemoryStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    blocked_slots: RwLock<HashMap<Uuid, BlockedTimeSlot>>,
    patterns: RwLock<HashMap<Uuid, RecurringAppointmentPattern>>,
    clinics: RwLock<HashMap<(TenantId, Uuid), ClinicSettings>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn register_clinic(&self, tenant: TenantId, settings: ClinicSettings) {
        debug!("Registering clinic {} for tenant {}", settings.clinic_id, tenant);
        self.clinics
            .write()
            .await
            .insert((tenant, settings.clinic_id), settings);
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn find(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        range: DateRange,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.tenant_id == tenant && a.clinic_id == clinic_id)
            .filter(|a| range.contains(a.date))
            .filter(|a| match doctor_id {
                Some(d) => a.doctor_id == Some(d) || a.doctor_id.is_none(),
                None => true,
            })
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.date, a.start_time));
        Ok(found)
    }

    async fn find_by_id(&self, tenant: TenantId, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.appointments
            .read()
            .await
            .get(&id)
            .filter(|a| a.tenant_id == tenant)
            .cloned()
            .ok_or(SchedulingError::NotFound)
    }

    async fn find_by_series(
        &self,
        tenant: TenantId,
        pattern_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.tenant_id == tenant)
            .filter(|a| {
                a.series
                    .map(|s| s.pattern_id == pattern_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        found.sort_by_key(|a| a.series.map(|s| s.occurrence_index));
        Ok(found)
    }

    async fn save(&self, mut appointment: Appointment) -> Result<Appointment, SchedulingError> {
        appointment.updated_at = Utc::now();
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }
}

#[async_trait]
impl BlockedSlotStore for InMemoryStore {
    async fn find(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        range: DateRange,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<BlockedTimeSlot>, SchedulingError> {
        let blocks = self.blocked_slots.read().await;
        let found = blocks
            .values()
            .filter(|b| b.tenant_id == tenant && b.clinic_id == clinic_id)
            .filter(|b| b.covers_doctor(doctor_id) || doctor_id.is_none())
            .filter(|b| {
                // Recurring blocks are date-filtered downstream once the rule
                // is expanded; only plain blocks can be pruned here.
                b.recurrence.is_some() || (b.start_date <= range.to && range.from <= b.end_date)
            })
            .cloned()
            .collect();
        Ok(found)
    }

    async fn save(&self, slot: BlockedTimeSlot) -> Result<BlockedTimeSlot, SchedulingError> {
        self.blocked_slots.write().await.insert(slot.id, slot.clone());
        Ok(slot)
    }
}

#[async_trait]
impl PatternStore for InMemoryStore {
    async fn find_by_id(
        &self,
        tenant: TenantId,
        id: Uuid,
    ) -> Result<RecurringAppointmentPattern, SchedulingError> {
        self.patterns
            .read()
            .await
            .get(&id)
            .filter(|p| p.tenant_id == tenant)
            .cloned()
            .ok_or(SchedulingError::NotFound)
    }

    async fn save(
        &self,
        mut pattern: RecurringAppointmentPattern,
    ) -> Result<RecurringAppointmentPattern, SchedulingError> {
        pattern.updated_at = Utc::now();
        self.patterns
            .write()
            .await
            .insert(pattern.id, pattern.clone());
        Ok(pattern)
    }

    async fn save_pair(
        &self,
        mut closed: RecurringAppointmentPattern,
        mut successor: RecurringAppointmentPattern,
    ) -> Result<(), SchedulingError> {
        let now = Utc::now();
        closed.updated_at = now;
        successor.updated_at = now;
        // Single write-lock section: both versions land or neither does.
        let mut patterns = self.patterns.write().await;
        patterns.insert(closed.id, closed);
        patterns.insert(successor.id, successor);
        Ok(())
    }
}

#[async_trait]
impl ClinicDirectory for InMemoryStore {
    async fn settings(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
    ) -> Result<ClinicSettings, SchedulingError> {
        self.clinics
            .read()
            .await
            .get(&(tenant, clinic_id))
            .cloned()
            .ok_or(SchedulingError::NotFound)
    }
}
