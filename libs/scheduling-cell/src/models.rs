// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::TenantId;

// ==============================================================================
// TIME VALUE OBJECTS
// ==============================================================================

/// Half-open clinic-local time interval within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, SchedulingError> {
        if end <= start {
            return Err(SchedulingError::Validation(format!(
                "time range end {} must be after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Candidate booking interval produced by slicing working hours.
/// Value object, never persisted or mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub available: bool,
}

impl TimeSlot {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, SchedulingError> {
        if to < from {
            return Err(SchedulingError::Validation(format!(
                "date range end {} precedes start {}",
                to, from
            )));
        }
        Ok(Self { from, to })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    pub fn num_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.from.iter_days().take(self.num_days() as usize)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    /// None means the appointment occupies the clinic-wide resource.
    pub doctor_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    /// Set when this row is one occurrence of a recurring series.
    pub series: Option<SeriesRef>,
    /// Present only when status is Cancelled.
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRef {
    pub pattern_id: Uuid,
    pub occurrence_index: u32,
}

impl Appointment {
    pub fn end_time(&self) -> NaiveTime {
        self.start_time + chrono::Duration::minutes(self.duration_minutes as i64)
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time(),
        }
    }

    /// Whether this row still occupies its slot for availability and
    /// conflict purposes. Only Cancelled rows release the interval.
    pub fn occupies_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Transition table. Monotonic: terminal states transition nowhere, so a
    /// Cancelled or Completed appointment can never be resurrected.
    pub fn can_transition_to(&self, target: &AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match (self, target) {
            (Scheduled, CheckedIn) => true,
            (Scheduled, InProgress) => true,
            (Scheduled, Cancelled) => true,
            (Scheduled, NoShow) => true,
            (CheckedIn, InProgress) => true,
            (CheckedIn, Cancelled) => true,
            (CheckedIn, NoShow) => true,
            (InProgress, Completed) => true,
            (InProgress, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::CheckedIn => write!(f, "checked_in"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

// ==============================================================================
// RECURRENCE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// When a recurrence sequence ends. Exactly one mechanism is active, by
/// construction of the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Stop after this many occurrences.
    Count(u32),
    /// Stop after this date (inclusive).
    Until(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Step between occurrences, in units of `frequency`. Must be >= 1.
    pub interval: u32,
    /// Weekly only: the weekdays generated within each stride week.
    #[serde(default)]
    pub weekdays: Vec<Weekday>,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub termination: Termination,
}

/// One version in a pattern's append-only chain. A version is closed when a
/// this-and-future edit splits the series; closed versions are never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PatternState {
    Open { from: NaiveDate },
    Closed { from: NaiveDate, until: NaiveDate },
}

impl PatternState {
    pub fn from_date(&self) -> NaiveDate {
        match self {
            PatternState::Open { from } => *from,
            PatternState::Closed { from, .. } => *from,
        }
    }

    /// Exclusive upper bound on generated dates, when the version is closed.
    pub fn until_exclusive(&self) -> Option<NaiveDate> {
        match self {
            PatternState::Open { .. } => None,
            PatternState::Closed { until, .. } => Some(*until),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PatternState::Closed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringAppointmentPattern {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub rule: RecurrenceRule,
    pub state: PatternState,
    /// The closed version this pattern was split from, if any.
    pub predecessor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// BLOCKED TIME
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTimeSlot {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub clinic_id: Uuid,
    /// None blocks the whole clinic.
    pub doctor_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Blocks can themselves recur; the rule is expanded with the same
    /// machinery as appointment series.
    pub recurrence: Option<RecurrenceRule>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlockedTimeSlot {
    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Whether this block applies to the given doctor filter. Clinic-wide
    /// blocks (no doctor) apply to everyone.
    pub fn covers_doctor(&self, doctor_id: Option<Uuid>) -> bool {
        match (self.doctor_id, doctor_id) {
            (None, _) => true,
            (Some(blocked), Some(requested)) => blocked == requested,
            (Some(_), None) => false,
        }
    }
}

// ==============================================================================
// CLINIC CONFIGURATION SNAPSHOT
// ==============================================================================

/// Immutable per-call snapshot of a clinic's configuration, supplied by the
/// clinic-configuration collaborator. Never cached as mutable global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicSettings {
    pub clinic_id: Uuid,
    pub timezone: String,
    /// Slot grid increment; bookings align to it to keep adjacent slots
    /// gap-free.
    pub slot_increment_minutes: i32,
    pub default_duration_minutes: i32,
    pub working_hours: WorkingHours,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(default)]
    pub monday: Vec<TimeRange>,
    #[serde(default)]
    pub tuesday: Vec<TimeRange>,
    #[serde(default)]
    pub wednesday: Vec<TimeRange>,
    #[serde(default)]
    pub thursday: Vec<TimeRange>,
    #[serde(default)]
    pub friday: Vec<TimeRange>,
    #[serde(default)]
    pub saturday: Vec<TimeRange>,
    #[serde(default)]
    pub sunday: Vec<TimeRange>,
}

impl WorkingHours {
    pub fn for_weekday(&self, weekday: Weekday) -> &[TimeRange] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    /// Same hours every weekday, none on weekends.
    pub fn weekdays(windows: Vec<TimeRange>) -> Self {
        Self {
            monday: windows.clone(),
            tuesday: windows.clone(),
            wednesday: windows.clone(),
            thursday: windows.clone(),
            friday: windows,
            ..Default::default()
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    /// Defaults to the clinic's configured duration.
    pub duration_minutes: Option<i32>,
    /// When present, books a whole series anchored at `date`.
    pub recurrence: Option<BookingRecurrence>,
}

/// Recurrence parameters accepted at booking time. Start time and duration
/// come from the enclosing request.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRecurrence {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default)]
    pub weekdays: Vec<Weekday>,
    pub termination: Termination,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub appointments: Vec<Appointment>,
    pub pattern_id: Option<Uuid>,
    /// Occurrences that could not be materialized because their slot was
    /// taken or blocked. Surfaced to the caller, never silently dropped.
    pub skipped: Vec<SkippedOccurrence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedOccurrence {
    pub occurrence_index: u32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub conflict: ConflictInterval,
}

/// The interval a rejected request collided with, so the caller can suggest
/// alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInterval {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub blocked: bool,
}

/// Which subset of a series an edit or cancellation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationScope {
    ThisOccurrence,
    ThisAndFuture,
    AllInSeries,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub scope: MutationScope,
    pub new_date: Option<NaiveDate>,
    pub new_start_time: Option<NaiveTime>,
    pub new_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub scope: MutationScope,
    /// Audit reason, required and non-empty for every cancellation.
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub affected: usize,
    /// Occurrences excluded because they were already Completed. Reported
    /// explicitly so a partial mutation is never mistaken for success-on-all.
    pub skipped_completed: usize,
    pub skipped_conflicts: Vec<SkippedOccurrence>,
    /// Set when a this-and-future edit split the series.
    pub new_pattern_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    pub doctor_id: Option<Uuid>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgendaDay {
    pub date: NaiveDate,
    pub appointments: Vec<Appointment>,
    pub blocked_slots: Vec<BlockedTimeSlot>,
    pub waiting_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Agenda {
    pub clinic_id: Uuid,
    pub days: Vec<AgendaDay>,
}

// ==============================================================================
// NOTIFICATION PAYLOADS
// ==============================================================================

/// Outbound payloads for the notification collaborator. Dispatch is
/// fire-and-forget; delivery failure never rolls back a scheduling write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SchedulingNotification {
    Booked {
        appointment_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
    },
    Rescheduled {
        appointment_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
    },
    Cancelled {
        appointment_id: Uuid,
        patient_id: Uuid,
        reason: String,
    },
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slot conflict on {} from {} to {}", .interval.date, .interval.start, .interval.end)]
    Conflict { interval: ConflictInterval },

    /// Unknown id or tenant mismatch; deliberately indistinguishable.
    #[error("Not found")]
    NotFound,

    #[error("Operation not allowed in status {current}")]
    State { current: AppointmentStatus },

    #[error("Store error: {0}")]
    Store(String),
}
