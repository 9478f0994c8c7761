// libs/scheduling-cell/src/services/conflict.rs
//
// Validates a proposed appointment interval against existing bookings and
// blocked time. Read-only: accept/reject is the whole job, persistence
// belongs to the caller.

use chrono::NaiveTime;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::TenantId;

use crate::models::{ConflictInterval, DateRange, SchedulingError, TimeRange};
use crate::services::{calendar, recurrence};
use crate::store::{AppointmentStore, BlockedSlotStore};

/// A create or reschedule under validation. For a reschedule,
/// `exclude_appointment_id` removes the appointment's own prior state from
/// the conflict set.
#[derive(Debug, Clone)]
pub struct ProposedBooking {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub date: chrono::NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub exclude_appointment_id: Option<Uuid>,
}

impl ProposedBooking {
    fn time_range(&self) -> Result<TimeRange, SchedulingError> {
        TimeRange::new(self.start_time, self.end_time)
    }
}

pub struct ConflictResolverService {
    appointments: Arc<dyn AppointmentStore>,
    blocked_slots: Arc<dyn BlockedSlotStore>,
}

impl ConflictResolverService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        blocked_slots: Arc<dyn BlockedSlotStore>,
    ) -> Self {
        Self {
            appointments,
            blocked_slots,
        }
    }

    /// Accept or reject the proposal. Ties always break against the incoming
    /// request: an existing booking is never displaced.
    pub async fn check(
        &self,
        tenant: TenantId,
        proposal: &ProposedBooking,
    ) -> Result<(), SchedulingError> {
        match self.find_conflict(tenant, proposal).await? {
            None => Ok(()),
            Some(interval) => {
                warn!(
                    "Conflict for clinic {} on {}: {}-{} collides with {}-{}",
                    proposal.clinic_id,
                    proposal.date,
                    proposal.start_time,
                    proposal.end_time,
                    interval.start,
                    interval.end
                );
                Err(SchedulingError::Conflict { interval })
            }
        }
    }

    /// The first conflicting interval, if any. Blocked time is checked first
    /// because it always wins over appointments.
    pub async fn find_conflict(
        &self,
        tenant: TenantId,
        proposal: &ProposedBooking,
    ) -> Result<Option<ConflictInterval>, SchedulingError> {
        let proposed = proposal.time_range()?;
        debug!(
            "Conflict check: clinic {} doctor {:?} on {} {}",
            proposal.clinic_id, proposal.doctor_id, proposal.date, proposed
        );

        let range = DateRange::single(proposal.date);

        let blocks = self
            .blocked_slots
            .find(tenant, proposal.clinic_id, range, proposal.doctor_id)
            .await?;
        for block in &blocks {
            if !block.covers_doctor(proposal.doctor_id) {
                continue;
            }
            if !recurrence::block_covers_date(block, proposal.date) {
                continue;
            }
            if calendar::overlaps(&proposed, &block.time_range()) {
                return Ok(Some(ConflictInterval {
                    date: proposal.date,
                    start: block.start_time,
                    end: block.end_time,
                    blocked: true,
                }));
            }
        }

        let existing = self
            .appointments
            .find(tenant, proposal.clinic_id, range, proposal.doctor_id)
            .await?;
        for appointment in &existing {
            if Some(appointment.id) == proposal.exclude_appointment_id {
                continue;
            }
            if !appointment.occupies_slot() {
                continue;
            }
            if !Self::contends(appointment.doctor_id, proposal.doctor_id) {
                continue;
            }
            if calendar::overlaps(&proposed, &appointment.time_range()) {
                return Ok(Some(ConflictInterval {
                    date: proposal.date,
                    start: appointment.start_time,
                    end: appointment.end_time(),
                    blocked: false,
                }));
            }
        }

        Ok(None)
    }

    /// Two bookings contend for the same resource when they share a doctor,
    /// or when either occupies the clinic-wide resource (no doctor).
    fn contends(existing_doctor: Option<Uuid>, proposed_doctor: Option<Uuid>) -> bool {
        match (existing_doctor, proposed_doctor) {
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => a == b,
        }
    }
}
