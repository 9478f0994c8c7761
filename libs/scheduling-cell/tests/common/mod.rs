// Shared fixture for the scheduling-cell test suites.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use scheduling_cell::models::{
    BookAppointmentRequest, ClinicSettings, TimeRange, WorkingHours,
};
use scheduling_cell::services::agenda::AgendaService;
use scheduling_cell::services::availability::AvailabilityService;
use scheduling_cell::services::booking::BookingService;
use scheduling_cell::services::conflict::ConflictResolverService;
use scheduling_cell::services::consistency::SlotLockRegistry;
use scheduling_cell::services::recurrence::RecurrenceExpansionService;
use scheduling_cell::services::series::SeriesMutationService;
use scheduling_cell::store::{InMemoryStore, LoggingNotifier, NotificationSender};
use shared_models::TenantId;
use waiting_queue_cell::store::InMemoryQueueStore;

// ==============================================================================
// TEST FIXTURES AND UTILITIES
// ==============================================================================

pub struct TestSetup {
    pub tenant: TenantId,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub store: Arc<InMemoryStore>,
    pub queue_store: Arc<InMemoryQueueStore>,
    pub conflicts: Arc<ConflictResolverService>,
    pub expander: Arc<RecurrenceExpansionService>,
    pub series: Arc<SeriesMutationService>,
    pub booking: Arc<BookingService>,
    pub availability: Arc<AvailabilityService>,
    pub agenda: Arc<AgendaService>,
}

impl TestSetup {
    pub async fn new() -> Self {
        Self::with_notifier(Arc::new(LoggingNotifier)).await
    }

    pub async fn with_notifier(notifier: Arc<dyn NotificationSender>) -> Self {
        let tenant = TenantId::new();
        let clinic_id = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();

        let store = InMemoryStore::new();
        let queue_store = Arc::new(InMemoryQueueStore::new());
        let locks = SlotLockRegistry::new();

        store
            .register_clinic(
                tenant,
                ClinicSettings {
                    clinic_id,
                    timezone: "America/Sao_Paulo".to_string(),
                    slot_increment_minutes: 30,
                    default_duration_minutes: 30,
                    working_hours: every_day(vec![range(8, 0, 12, 0)]),
                },
            )
            .await;

        let conflicts = Arc::new(ConflictResolverService::new(store.clone(), store.clone()));
        let expander = Arc::new(RecurrenceExpansionService::new(
            store.clone(),
            conflicts.clone(),
            locks.clone(),
        ));
        let series = Arc::new(SeriesMutationService::new(
            store.clone(),
            store.clone(),
            conflicts.clone(),
            expander.clone(),
            locks.clone(),
        ));
        let booking = Arc::new(BookingService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            conflicts.clone(),
            expander.clone(),
            series.clone(),
            locks,
            notifier,
        ));
        let availability = Arc::new(AvailabilityService::new(
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let agenda = Arc::new(AgendaService::new(
            store.clone(),
            store.clone(),
            queue_store.clone(),
        ));

        Self {
            tenant,
            clinic_id,
            doctor_id,
            store,
            queue_store,
            conflicts,
            expander,
            series,
            booking,
            availability,
            agenda,
        }
    }

    pub fn book_request(&self, date: NaiveDate, start: NaiveTime) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: Uuid::new_v4(),
            clinic_id: self.clinic_id,
            doctor_id: Some(self.doctor_id),
            date,
            start_time: start,
            duration_minutes: Some(30),
            recurrence: None,
        }
    }
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn range(start_h: u32, start_m: u32, end_h: u32, end_m: u32) -> TimeRange {
    TimeRange::new(time(start_h, start_m), time(end_h, end_m)).unwrap()
}

/// Today plus an offset, so scenarios stay in the future regardless of when
/// the suite runs.
pub fn today_plus(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

/// Same working hours all seven days, so date offsets never land on a
/// closed weekday.
pub fn every_day(windows: Vec<TimeRange>) -> WorkingHours {
    WorkingHours {
        monday: windows.clone(),
        tuesday: windows.clone(),
        wednesday: windows.clone(),
        thursday: windows.clone(),
        friday: windows.clone(),
        saturday: windows.clone(),
        sunday: windows,
    }
}
