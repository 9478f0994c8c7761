// libs/scheduling-cell/tests/conflict_test.rs

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use uuid::Uuid;

use common::{time, today_plus, TestSetup};
use scheduling_cell::models::{BlockedTimeSlot, SchedulingError};
use scheduling_cell::services::conflict::ProposedBooking;
use scheduling_cell::store::BlockedSlotStore;

fn proposal(setup: &TestSetup, date: chrono::NaiveDate, start: chrono::NaiveTime, end: chrono::NaiveTime) -> ProposedBooking {
    ProposedBooking {
        clinic_id: setup.clinic_id,
        doctor_id: Some(setup.doctor_id),
        date,
        start_time: start,
        end_time: end,
        exclude_appointment_id: None,
    }
}

#[tokio::test]
async fn overlapping_booking_reports_the_existing_interval() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    setup
        .booking
        .book(setup.tenant, &setup.book_request(date, time(9, 0)))
        .await
        .unwrap();

    // 09:15-09:45 collides with the existing 09:00-09:30.
    let result = setup
        .conflicts
        .check(setup.tenant, &proposal(&setup, date, time(9, 15), time(9, 45)))
        .await;

    match result {
        Err(SchedulingError::Conflict { interval }) => {
            assert_eq!(interval.start, time(9, 0));
            assert_eq!(interval.end, time(9, 30));
            assert!(!interval.blocked);
        }
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn adjacent_booking_is_accepted() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    setup
        .booking
        .book(setup.tenant, &setup.book_request(date, time(9, 0)))
        .await
        .unwrap();

    let result = setup
        .conflicts
        .check(setup.tenant, &proposal(&setup, date, time(9, 30), time(10, 0)))
        .await;

    assert_matches!(result, Ok(()));
}

#[tokio::test]
async fn different_doctors_do_not_contend() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    setup
        .booking
        .book(setup.tenant, &setup.book_request(date, time(9, 0)))
        .await
        .unwrap();

    let mut other = proposal(&setup, date, time(9, 0), time(9, 30));
    other.doctor_id = Some(Uuid::new_v4());

    assert_matches!(setup.conflicts.check(setup.tenant, &other).await, Ok(()));
}

#[tokio::test]
async fn doctorless_booking_contends_clinic_wide() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    let mut request = setup.book_request(date, time(9, 0));
    request.doctor_id = None;
    setup.booking.book(setup.tenant, &request).await.unwrap();

    // Any doctor's proposal collides with the clinic-wide booking.
    let result = setup
        .conflicts
        .check(setup.tenant, &proposal(&setup, date, time(9, 0), time(9, 30)))
        .await;

    assert_matches!(result, Err(SchedulingError::Conflict { .. }));
}

#[tokio::test]
async fn blocked_time_wins_and_is_marked_blocked() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    setup
        .store
        .save(BlockedTimeSlot {
            id: Uuid::new_v4(),
            tenant_id: setup.tenant,
            clinic_id: setup.clinic_id,
            doctor_id: None,
            start_date: date,
            end_date: date,
            start_time: time(10, 0),
            end_time: time(11, 0),
            recurrence: None,
            reason: Some("staff meeting".to_string()),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let result = setup
        .conflicts
        .check(setup.tenant, &proposal(&setup, date, time(10, 30), time(11, 0)))
        .await;

    match result {
        Err(SchedulingError::Conflict { interval }) => {
            assert!(interval.blocked);
            assert_eq!(interval.start, time(10, 0));
            assert_eq!(interval.end, time(11, 0));
        }
        other => panic!("expected blocked conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn excluded_appointment_does_not_conflict_with_itself() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    let outcome = setup
        .booking
        .book(setup.tenant, &setup.book_request(date, time(9, 0)))
        .await
        .unwrap();
    let existing = &outcome.appointments[0];

    let mut same_slot = proposal(&setup, date, time(9, 0), time(9, 30));
    same_slot.exclude_appointment_id = Some(existing.id);

    assert_matches!(setup.conflicts.check(setup.tenant, &same_slot).await, Ok(()));
}

#[tokio::test]
async fn cancelled_appointment_releases_its_slot() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    let outcome = setup
        .booking
        .book(setup.tenant, &setup.book_request(date, time(9, 0)))
        .await
        .unwrap();
    let booked = &outcome.appointments[0];

    setup
        .booking
        .cancel(
            setup.tenant,
            booked.id,
            &scheduling_cell::models::CancelAppointmentRequest {
                scope: scheduling_cell::models::MutationScope::ThisOccurrence,
                reason: "patient request".to_string(),
            },
        )
        .await
        .unwrap();

    let result = setup
        .conflicts
        .check(setup.tenant, &proposal(&setup, date, time(9, 0), time(9, 30)))
        .await;

    assert_matches!(result, Ok(()));
}

#[tokio::test]
async fn cross_tenant_lookup_is_not_found() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    let outcome = setup
        .booking
        .book(setup.tenant, &setup.book_request(date, time(9, 0)))
        .await
        .unwrap();

    let other_tenant = shared_models::TenantId::new();
    let result = setup
        .booking
        .get_appointment(other_tenant, outcome.appointments[0].id)
        .await;

    assert_matches!(result, Err(SchedulingError::NotFound));
}
