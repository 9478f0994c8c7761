// libs/scheduling-cell/tests/availability_test.rs

mod common;

use assert_matches::assert_matches;
use chrono::Duration;

use common::{range, time, today_plus, TestSetup};
use scheduling_cell::models::{AvailabilityQuery, SchedulingError};
use scheduling_cell::services::calendar;

fn query(setup: &TestSetup, date: chrono::NaiveDate) -> AvailabilityQuery {
    AvailabilityQuery {
        clinic_id: setup.clinic_id,
        date,
        doctor_id: Some(setup.doctor_id),
        duration_minutes: Some(30),
    }
}

#[tokio::test]
async fn four_hour_window_with_30_minute_slots_yields_eight() {
    let setup = TestSetup::new().await;

    let slots = setup
        .availability
        .get_available_slots(setup.tenant, &query(&setup, today_plus(1)))
        .await
        .unwrap();

    assert_eq!(slots.len(), 8);
    assert_eq!(slots[0].start, time(8, 0));
    assert_eq!(slots[7].end, time(12, 0));
    assert!(slots.iter().all(|s| s.available));
}

#[tokio::test]
async fn slots_are_contained_aligned_and_non_overlapping() {
    let setup = TestSetup::new().await;
    let window = range(8, 0, 12, 0);

    let slots = setup
        .availability
        .get_available_slots(setup.tenant, &query(&setup, today_plus(2)))
        .await
        .unwrap();

    for slot in &slots {
        assert!(window.start <= slot.start && slot.end <= window.end);
        assert_eq!((slot.end - slot.start).num_minutes(), 30);
        // Starts sit on the 30-minute grid anchored at the window start.
        assert_eq!((slot.start - window.start).num_minutes() % 30, 0);
    }
    for pair in slots.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
}

#[tokio::test]
async fn booked_slot_is_flagged_unavailable() {
    let setup = TestSetup::new().await;
    let date = today_plus(1);

    setup
        .booking
        .book(setup.tenant, &setup.book_request(date, time(9, 0)))
        .await
        .unwrap();

    let slots = setup
        .availability
        .get_available_slots(setup.tenant, &query(&setup, date))
        .await
        .unwrap();

    let taken: Vec<_> = slots.iter().filter(|s| !s.available).collect();
    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].start, time(9, 0));
}

#[tokio::test]
async fn odd_duration_steps_on_the_next_increment_multiple() {
    let setup = TestSetup::new().await;
    let mut q = query(&setup, today_plus(1));
    q.duration_minutes = Some(45);

    let slots = setup
        .availability
        .get_available_slots(setup.tenant, &q)
        .await
        .unwrap();

    // 45 minutes on a 30-minute grid rounds the stride up to 60.
    assert_eq!(slots.len(), 4);
    assert_eq!(slots[0].start, time(8, 0));
    assert_eq!(slots[0].end, time(8, 45));
    assert_eq!(slots[3].start, time(11, 0));
    assert_eq!(slots[3].end, time(11, 45));
}

#[tokio::test]
async fn past_date_yields_empty_grid() {
    let setup = TestSetup::new().await;

    let slots = setup
        .availability
        .get_available_slots(setup.tenant, &query(&setup, today_plus(-1)))
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn duration_longer_than_window_yields_empty_grid() {
    let setup = TestSetup::new().await;
    let mut q = query(&setup, today_plus(1));
    q.duration_minutes = Some(300);

    let slots = setup
        .availability
        .get_available_slots(setup.tenant, &q)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn non_positive_duration_is_rejected() {
    let setup = TestSetup::new().await;
    let mut q = query(&setup, today_plus(1));
    q.duration_minutes = Some(0);

    let result = setup
        .availability
        .get_available_slots(setup.tenant, &q)
        .await;

    assert_matches!(result, Err(SchedulingError::Validation(_)));
}

#[tokio::test]
async fn unknown_clinic_is_not_found() {
    let setup = TestSetup::new().await;
    let mut q = query(&setup, today_plus(1));
    q.clinic_id = uuid::Uuid::new_v4();

    let result = setup
        .availability
        .get_available_slots(setup.tenant, &q)
        .await;

    assert_matches!(result, Err(SchedulingError::NotFound));
}

#[test]
fn slicing_odd_duration_rounds_the_step_up() {
    // 45-minute appointments on a 30-minute grid step by 60 so adjacent
    // slots never overlap.
    let window = range(8, 0, 12, 0);
    let slots = calendar::slice_aligned(&window, 45, 60).unwrap();

    assert_eq!(slots.len(), 4);
    assert_eq!(slots[0].start, time(8, 0));
    assert_eq!(slots[0].end, time(8, 45));
    assert_eq!(slots[1].start, time(9, 0));
    for pair in slots.windows(2) {
        assert!(!calendar::overlaps(&pair[0].range(), &pair[1].range()));
    }
}

#[test]
fn slicing_never_spills_past_the_window() {
    let window = range(9, 0, 10, 15);
    let slots = calendar::slice(&window, 30).unwrap();

    assert_eq!(slots.len(), 2);
    assert_eq!(slots.last().unwrap().end, time(10, 0));
}

#[test]
fn overlap_is_symmetric_and_ignores_touching_edges() {
    let a = range(9, 0, 9, 30);
    let b = range(9, 15, 9, 45);
    let c = range(9, 30, 10, 0);

    assert!(calendar::overlaps(&a, &b));
    assert!(calendar::overlaps(&b, &a));
    assert!(!calendar::overlaps(&a, &c));
}

#[test]
fn time_range_duration_is_in_minutes() {
    let window = range(8, 0, 12, 0);
    assert_eq!(window.duration_minutes(), Duration::hours(4).num_minutes());
}
