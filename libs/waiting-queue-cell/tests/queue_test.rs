// libs/waiting-queue-cell/tests/queue_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;
use uuid::Uuid;

use shared_models::TenantId;
use waiting_queue_cell::models::{CheckInRequest, QueueEntryStatus, WaitingQueueEntry};
use waiting_queue_cell::services::WaitingQueueService;
use waiting_queue_cell::store::{InMemoryQueueStore, NoAppointmentLifecycle, QueueStore};
use waiting_queue_cell::QueueError;

// ==============================================================================
// TEST FIXTURES AND UTILITIES
// ==============================================================================

struct TestSetup {
    tenant: TenantId,
    clinic_id: Uuid,
    store: Arc<InMemoryQueueStore>,
    service: WaitingQueueService,
}

impl TestSetup {
    fn new() -> Self {
        let store = Arc::new(InMemoryQueueStore::new());
        let service =
            WaitingQueueService::new(store.clone(), Arc::new(NoAppointmentLifecycle));
        Self {
            tenant: TenantId::new(),
            clinic_id: Uuid::new_v4(),
            store,
            service,
        }
    }

    async fn check_in_patients(&self, count: usize) -> Vec<WaitingQueueEntry> {
        let mut entries = Vec::new();
        for _ in 0..count {
            let entry = self
                .service
                .check_in(
                    self.tenant,
                    &CheckInRequest {
                        clinic_id: self.clinic_id,
                        patient_id: Uuid::new_v4(),
                        appointment_id: None,
                    },
                )
                .await
                .unwrap();
            entries.push(entry);
        }
        entries
    }

    async fn active_positions(&self) -> Vec<i32> {
        self.store
            .find(self.tenant, self.clinic_id, Utc::now().date_naive())
            .await
            .unwrap()
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.position)
            .collect()
    }
}

// ==============================================================================
// POSITIONS
// ==============================================================================

#[tokio::test]
async fn check_in_appends_to_the_back_of_the_queue() {
    let setup = TestSetup::new();
    let entries = setup.check_in_patients(3).await;

    assert_eq!(
        entries.iter().map(|e| e.position).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(entries.iter().all(|e| e.status == QueueEntryStatus::Waiting));
}

#[tokio::test]
async fn skipping_p3_of_five_renumbers_to_dense_positions() {
    let setup = TestSetup::new();
    let entries = setup.check_in_patients(5).await;

    setup.service.skip(setup.tenant, entries[2].id).await.unwrap();

    assert_eq!(setup.active_positions().await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn positions_stay_dense_across_mixed_removals() {
    let setup = TestSetup::new();
    let entries = setup.check_in_patients(4).await;

    // P1 goes through a full service; P3 walks out before being called.
    setup.service.call(setup.tenant, entries[0].id).await.unwrap();
    setup
        .service
        .start_service(setup.tenant, entries[0].id)
        .await
        .unwrap();
    setup
        .service
        .complete_service(setup.tenant, entries[0].id)
        .await
        .unwrap();
    setup.service.skip(setup.tenant, entries[2].id).await.unwrap();

    assert_eq!(setup.active_positions().await, vec![1, 2]);

    // A new arrival lands behind the survivors.
    let late = setup.check_in_patients(1).await;
    assert_eq!(late[0].position, 3);
}

#[tokio::test]
async fn duplicate_check_in_is_rejected_while_active() {
    let setup = TestSetup::new();
    let patient_id = Uuid::new_v4();
    let request = CheckInRequest {
        clinic_id: setup.clinic_id,
        patient_id,
        appointment_id: None,
    };

    setup.service.check_in(setup.tenant, &request).await.unwrap();
    let result = setup.service.check_in(setup.tenant, &request).await;

    assert_matches!(result, Err(QueueError::Validation(_)));
}

// ==============================================================================
// CALLING
// ==============================================================================

#[tokio::test]
async fn call_next_takes_the_lowest_waiting_position() {
    let setup = TestSetup::new();
    let entries = setup.check_in_patients(3).await;

    let first = setup.service.call_next(setup.tenant, setup.clinic_id).await.unwrap();
    assert_eq!(first.id, entries[0].id);
    assert_eq!(first.status, QueueEntryStatus::Called);
    assert!(first.called_at.is_some());

    // The called entry is out of the waiting pool; the next call moves on.
    let second = setup.service.call_next(setup.tenant, setup.clinic_id).await.unwrap();
    assert_eq!(second.id, entries[1].id);
}

#[tokio::test]
async fn calling_out_of_order_is_permitted() {
    let setup = TestSetup::new();
    let entries = setup.check_in_patients(3).await;

    // Calling P3 ahead of P1 and P2 succeeds; the skip-ahead is only logged.
    let called = setup.service.call(setup.tenant, entries[2].id).await.unwrap();
    assert_eq!(called.status, QueueEntryStatus::Called);

    let next = setup.service.call_next(setup.tenant, setup.clinic_id).await.unwrap();
    assert_eq!(next.id, entries[0].id);
}

#[tokio::test]
async fn call_next_on_an_empty_queue_is_not_found() {
    let setup = TestSetup::new();
    let result = setup.service.call_next(setup.tenant, setup.clinic_id).await;
    assert_matches!(result, Err(QueueError::NotFound));
}

// ==============================================================================
// TRANSITIONS
// ==============================================================================

#[tokio::test]
async fn lifecycle_is_one_directional() {
    let setup = TestSetup::new();
    let entries = setup.check_in_patients(1).await;
    let id = entries[0].id;

    // Service cannot start before the patient is called.
    assert_matches!(
        setup.service.start_service(setup.tenant, id).await,
        Err(QueueError::State {
            current: QueueEntryStatus::Waiting
        })
    );

    setup.service.call(setup.tenant, id).await.unwrap();

    // A called patient cannot be skipped.
    assert_matches!(
        setup.service.skip(setup.tenant, id).await,
        Err(QueueError::State {
            current: QueueEntryStatus::Called
        })
    );

    // Completing before starting is rejected.
    assert_matches!(
        setup.service.complete_service(setup.tenant, id).await,
        Err(QueueError::State {
            current: QueueEntryStatus::Called
        })
    );

    let started = setup.service.start_service(setup.tenant, id).await.unwrap();
    assert!(started.service_started_at.is_some());

    let done = setup.service.complete_service(setup.tenant, id).await.unwrap();
    assert_eq!(done.status, QueueEntryStatus::Done);
    assert!(done.service_ended_at.is_some());

    // Terminal: nothing further applies.
    assert_matches!(
        setup.service.call(setup.tenant, id).await,
        Err(QueueError::State {
            current: QueueEntryStatus::Done
        })
    );
}

#[tokio::test]
async fn patient_can_check_in_again_after_leaving_the_queue() {
    let setup = TestSetup::new();
    let patient_id = Uuid::new_v4();
    let request = CheckInRequest {
        clinic_id: setup.clinic_id,
        patient_id,
        appointment_id: None,
    };

    let first = setup.service.check_in(setup.tenant, &request).await.unwrap();
    setup.service.skip(setup.tenant, first.id).await.unwrap();

    let second = setup.service.check_in(setup.tenant, &request).await.unwrap();
    assert_eq!(second.position, 1);
}

// ==============================================================================
// TENANT ISOLATION
// ==============================================================================

#[tokio::test]
async fn cross_tenant_entry_lookup_is_not_found() {
    let setup = TestSetup::new();
    let entries = setup.check_in_patients(1).await;

    let other_tenant = TenantId::new();
    let result = setup.service.call(other_tenant, entries[0].id).await;

    assert_matches!(result, Err(QueueError::NotFound));
}
