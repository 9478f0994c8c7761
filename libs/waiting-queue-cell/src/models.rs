use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::TenantId;

// ===== Queue Entry =====

/// One patient in a clinic's walk-in queue for a given day. Positions are
/// dense 1..N across the non-terminal entries of that clinic and day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingQueueEntry {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    /// Present when the patient checked in against a booked appointment.
    pub appointment_id: Option<Uuid>,
    pub position: i32,
    pub status: QueueEntryStatus,
    pub checked_in_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub service_started_at: Option<DateTime<Utc>>,
    pub service_ended_at: Option<DateTime<Utc>>,
    pub day: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl WaitingQueueEntry {
    /// Still holds a position in the queue.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Waiting,
    Called,
    InService,
    Done,
    Skipped,
}

impl QueueEntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueEntryStatus::Done | QueueEntryStatus::Skipped)
    }

    /// One-directional lifecycle. A called patient is not skippable; only
    /// waiting patients leave the queue without service.
    pub fn can_transition_to(&self, new_status: &QueueEntryStatus) -> bool {
        use QueueEntryStatus::*;
        matches!(
            (self, new_status),
            (Waiting, Called) | (Waiting, Skipped) | (Called, InService) | (InService, Done)
        )
    }
}

impl fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueueEntryStatus::Waiting => "waiting",
            QueueEntryStatus::Called => "called",
            QueueEntryStatus::InService => "in_service",
            QueueEntryStatus::Done => "done",
            QueueEntryStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

// ===== Requests =====

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueQuery {
    pub clinic_id: Uuid,
    #[serde(default)]
    pub day: Option<NaiveDate>,
}
