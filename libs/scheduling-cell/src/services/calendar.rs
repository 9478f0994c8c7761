// libs/scheduling-cell/src/services/calendar.rs
//
// Pure time-interval arithmetic. Every other service routes its interval
// math through here; nothing else in the workspace re-implements overlap
// checks or slot slicing.

use chrono::{Duration, NaiveTime};

use crate::models::{SchedulingError, TimeRange, TimeSlot};

/// Two half-open intervals overlap iff each starts before the other ends.
pub fn overlaps(a: &TimeRange, b: &TimeRange) -> bool {
    a.start < b.end && b.start < a.end
}

pub fn is_within(time: NaiveTime, range: &TimeRange) -> bool {
    range.start <= time && time < range.end
}

/// Slice a window into duration-sized slots stepping by the same duration.
pub fn slice(range: &TimeRange, duration_minutes: i32) -> Result<Vec<TimeSlot>, SchedulingError> {
    slice_aligned(range, duration_minutes, duration_minutes)
}

/// Slice a window into `duration_minutes`-long slots whose starts fall on the
/// `increment_minutes` grid anchored at the window start. Slots that would
/// spill past the window end are not produced, so every returned slot is
/// fully contained in the window.
pub fn slice_aligned(
    range: &TimeRange,
    duration_minutes: i32,
    increment_minutes: i32,
) -> Result<Vec<TimeSlot>, SchedulingError> {
    if duration_minutes <= 0 {
        return Err(SchedulingError::Validation(format!(
            "slot duration must be positive, got {}",
            duration_minutes
        )));
    }
    if increment_minutes <= 0 {
        return Err(SchedulingError::Validation(format!(
            "slot increment must be positive, got {}",
            increment_minutes
        )));
    }

    let duration = Duration::minutes(duration_minutes as i64);
    let step = Duration::minutes(increment_minutes as i64);

    let mut slots = Vec::new();
    let mut current = range.start;

    // NaiveTime arithmetic wraps at midnight; track elapsed minutes instead
    // of comparing wrapped times.
    let window_minutes = range.duration_minutes();
    let mut elapsed: i64 = 0;

    while elapsed + duration.num_minutes() <= window_minutes {
        slots.push(TimeSlot {
            start: current,
            end: current + duration,
            available: true,
        });
        current += step;
        elapsed += step.num_minutes();
    }

    Ok(slots)
}
