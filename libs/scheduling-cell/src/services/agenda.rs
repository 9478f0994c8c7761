// libs/scheduling-cell/src/services/agenda.rs
//
// Day-grouped read model for the front desk. Weekly views are capped at
// seven days; longer ranges belong to reporting, not the agenda.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_models::TenantId;
use waiting_queue_cell::store::QueueStore;

use crate::models::{Agenda, AgendaDay, DateRange, SchedulingError};
use crate::services::recurrence;
use crate::store::{AppointmentStore, BlockedSlotStore};

const MAX_AGENDA_DAYS: i64 = 7;

pub struct AgendaService {
    appointments: Arc<dyn AppointmentStore>,
    blocked_slots: Arc<dyn BlockedSlotStore>,
    queue: Arc<dyn QueueStore>,
}

impl AgendaService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        blocked_slots: Arc<dyn BlockedSlotStore>,
        queue: Arc<dyn QueueStore>,
    ) -> Self {
        Self {
            appointments,
            blocked_slots,
            queue,
        }
    }

    pub async fn daily(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        date: chrono::NaiveDate,
    ) -> Result<AgendaDay, SchedulingError> {
        let mut agenda = self
            .build(tenant, clinic_id, DateRange::single(date))
            .await?;
        // Single-day range always yields exactly one day.
        agenda
            .days
            .pop()
            .ok_or_else(|| SchedulingError::Store("empty agenda for single day".to_string()))
    }

    /// Inclusive range of at most seven days. Every day in the range appears
    /// in the result, empty or not.
    pub async fn weekly(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        range: DateRange,
    ) -> Result<Agenda, SchedulingError> {
        if range.num_days() > MAX_AGENDA_DAYS {
            return Err(SchedulingError::Validation(format!(
                "agenda range spans {} days, maximum is {}",
                range.num_days(),
                MAX_AGENDA_DAYS
            )));
        }
        self.build(tenant, clinic_id, range).await
    }

    async fn build(
        &self,
        tenant: TenantId,
        clinic_id: Uuid,
        range: DateRange,
    ) -> Result<Agenda, SchedulingError> {
        let appointments = self
            .appointments
            .find(tenant, clinic_id, range, None)
            .await?;
        let blocks = self.blocked_slots.find(tenant, clinic_id, range, None).await?;

        let mut days = Vec::new();
        for date in range.days() {
            let mut day_appointments: Vec<_> = appointments
                .iter()
                .filter(|a| a.date == date)
                .cloned()
                .collect();
            day_appointments.sort_by_key(|a| a.start_time);

            let day_blocks: Vec<_> = blocks
                .iter()
                .filter(|b| recurrence::block_covers_date(b, date))
                .cloned()
                .collect();

            let waiting_count = self
                .queue
                .find(tenant, clinic_id, date)
                .await
                .map_err(|e| SchedulingError::Store(e.to_string()))?
                .iter()
                .filter(|e| e.is_active())
                .count();

            days.push(AgendaDay {
                date,
                appointments: day_appointments,
                blocked_slots: day_blocks,
                waiting_count,
            });
        }

        debug!(
            "Agenda for clinic {} over {} days: {} appointments",
            clinic_id,
            days.len(),
            appointments.len()
        );
        Ok(Agenda { clinic_id, days })
    }
}
