// libs/scheduling-cell/src/services/availability.rs
//
// Computes the bookable slot grid for a clinic day. Pure read path: working
// hours come in as an immutable snapshot, appointments and blocked time from
// the stores, and the result is a flagged slot list.

use chrono::{Datelike, Utc};
use std::sync::Arc;
use tracing::debug;

use shared_models::TenantId;

use crate::models::{AvailabilityQuery, DateRange, SchedulingError, TimeSlot};
use crate::services::{calendar, recurrence};
use crate::store::{AppointmentStore, BlockedSlotStore, ClinicDirectory};

pub struct AvailabilityService {
    clinics: Arc<dyn ClinicDirectory>,
    appointments: Arc<dyn AppointmentStore>,
    blocked_slots: Arc<dyn BlockedSlotStore>,
}

impl AvailabilityService {
    pub fn new(
        clinics: Arc<dyn ClinicDirectory>,
        appointments: Arc<dyn AppointmentStore>,
        blocked_slots: Arc<dyn BlockedSlotStore>,
    ) -> Self {
        Self {
            clinics,
            appointments,
            blocked_slots,
        }
    }

    /// Ordered slot grid covering the clinic's working hours on the query
    /// date, each slot flagged available or not.
    ///
    /// Past dates, closed weekdays and durations longer than the working
    /// window all produce an empty grid rather than an error; only malformed
    /// input (duration <= 0) is a validation failure.
    pub async fn get_available_slots(
        &self,
        tenant: TenantId,
        query: &AvailabilityQuery,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        if let Some(duration) = query.duration_minutes {
            if duration <= 0 {
                return Err(SchedulingError::Validation(format!(
                    "appointment duration must be positive, got {}",
                    duration
                )));
            }
        }

        let settings = self.clinics.settings(tenant, query.clinic_id).await?;
        let duration = query
            .duration_minutes
            .unwrap_or(settings.default_duration_minutes);

        if query.date < Utc::now().date_naive() {
            debug!("Availability query for past date {}, empty grid", query.date);
            return Ok(vec![]);
        }

        let windows = settings.working_hours.for_weekday(query.date.weekday());
        if windows.is_empty() {
            debug!(
                "Clinic {} has no working hours on {}, empty grid",
                query.clinic_id, query.date
            );
            return Ok(vec![]);
        }

        // Slots start on the increment grid; the step is the duration rounded
        // up to the next increment so adjacent slots never overlap.
        let increment = settings.slot_increment_minutes.max(1);
        let step = (duration + increment - 1) / increment * increment;

        let mut slots: Vec<TimeSlot> = Vec::new();
        for window in windows {
            slots.extend(calendar::slice_aligned(window, duration, step)?);
        }
        slots.sort_by_key(|s| s.start);

        self.flag_taken_slots(tenant, query, &mut slots).await?;

        debug!(
            "Availability for clinic {} on {}: {}/{} slots free",
            query.clinic_id,
            query.date,
            slots.iter().filter(|s| s.available).count(),
            slots.len()
        );
        Ok(slots)
    }

    async fn flag_taken_slots(
        &self,
        tenant: TenantId,
        query: &AvailabilityQuery,
        slots: &mut [TimeSlot],
    ) -> Result<(), SchedulingError> {
        let range = DateRange::single(query.date);

        let appointments = self
            .appointments
            .find(tenant, query.clinic_id, range, query.doctor_id)
            .await?;
        let blocks = self
            .blocked_slots
            .find(tenant, query.clinic_id, range, query.doctor_id)
            .await?;

        let occupied: Vec<_> = appointments
            .iter()
            .filter(|a| a.occupies_slot())
            .map(|a| a.time_range())
            .collect();
        let blocked: Vec<_> = blocks
            .iter()
            .filter(|b| b.covers_doctor(query.doctor_id))
            .filter(|b| recurrence::block_covers_date(b, query.date))
            .map(|b| b.time_range())
            .collect();

        for slot in slots.iter_mut() {
            let range = slot.range();
            let taken = occupied.iter().any(|r| calendar::overlaps(&range, r))
                || blocked.iter().any(|r| calendar::overlaps(&range, r));
            if taken {
                slot.available = false;
            }
        }

        Ok(())
    }
}
