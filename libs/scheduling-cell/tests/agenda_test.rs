// libs/scheduling-cell/tests/agenda_test.rs

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use uuid::Uuid;

use common::{time, today_plus, TestSetup};
use scheduling_cell::models::{DateRange, SchedulingError};
use waiting_queue_cell::models::{QueueEntryStatus, WaitingQueueEntry};
use waiting_queue_cell::store::QueueStore;

#[tokio::test]
async fn weekly_agenda_groups_by_day_and_keeps_empty_days() {
    let setup = TestSetup::new().await;

    setup
        .booking
        .book(setup.tenant, &setup.book_request(today_plus(1), time(9, 0)))
        .await
        .unwrap();
    setup
        .booking
        .book(setup.tenant, &setup.book_request(today_plus(1), time(8, 0)))
        .await
        .unwrap();
    setup
        .booking
        .book(setup.tenant, &setup.book_request(today_plus(3), time(10, 0)))
        .await
        .unwrap();

    let range = DateRange::new(today_plus(1), today_plus(5)).unwrap();
    let agenda = setup
        .agenda
        .weekly(setup.tenant, setup.clinic_id, range)
        .await
        .unwrap();

    assert_eq!(agenda.days.len(), 5);
    assert_eq!(agenda.days[0].appointments.len(), 2);
    // Sorted by start time within the day.
    assert_eq!(agenda.days[0].appointments[0].start_time, time(8, 0));
    assert_eq!(agenda.days[2].appointments.len(), 1);
    // Days with nothing scheduled are present, not omitted.
    assert!(agenda.days[1].appointments.is_empty());
    assert!(agenda.days[4].appointments.is_empty());
}

#[tokio::test]
async fn agenda_range_beyond_seven_days_is_rejected() {
    let setup = TestSetup::new().await;

    let range = DateRange::new(today_plus(1), today_plus(8)).unwrap();
    let result = setup
        .agenda
        .weekly(setup.tenant, setup.clinic_id, range)
        .await;

    assert_matches!(result, Err(SchedulingError::Validation(_)));

    let full_week = DateRange::new(today_plus(1), today_plus(7)).unwrap();
    assert!(setup
        .agenda
        .weekly(setup.tenant, setup.clinic_id, full_week)
        .await
        .is_ok());
}

#[tokio::test]
async fn daily_agenda_counts_active_queue_entries() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    let statuses = [
        QueueEntryStatus::Waiting,
        QueueEntryStatus::Called,
        QueueEntryStatus::InService,
        QueueEntryStatus::Done,
        QueueEntryStatus::Skipped,
    ];
    for (i, status) in statuses.into_iter().enumerate() {
        let now = Utc::now();
        setup
            .queue_store
            .save(WaitingQueueEntry {
                id: Uuid::new_v4(),
                tenant_id: setup.tenant,
                clinic_id: setup.clinic_id,
                patient_id: Uuid::new_v4(),
                appointment_id: None,
                position: i as i32 + 1,
                status,
                checked_in_at: now,
                called_at: None,
                service_started_at: None,
                service_ended_at: None,
                day: date,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    let day = setup
        .agenda
        .daily(setup.tenant, setup.clinic_id, date)
        .await
        .unwrap();

    // Done and Skipped have left the queue.
    assert_eq!(day.waiting_count, 3);
}

#[tokio::test]
async fn agenda_is_tenant_scoped() {
    let setup = TestSetup::new().await;

    setup
        .booking
        .book(setup.tenant, &setup.book_request(today_plus(1), time(9, 0)))
        .await
        .unwrap();

    let other_tenant = shared_models::TenantId::new();
    let day = setup
        .agenda
        .daily(other_tenant, setup.clinic_id, today_plus(1))
        .await
        .unwrap();

    assert!(day.appointments.is_empty());
}
