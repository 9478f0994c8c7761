// libs/scheduling-cell/src/services/recurrence.rs
//
// Expands recurrence rules into concrete occurrence dates and materializes
// them as Appointment rows. Blocked-slot recurrence reuses the same
// expansion.

use chrono::{Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::TenantId;

use crate::models::{
    Appointment, AppointmentStatus, BlockedTimeSlot, Frequency, RecurrenceRule,
    RecurringAppointmentPattern, SchedulingError, SkippedOccurrence, Termination,
};
use crate::services::conflict::{ConflictResolverService, ProposedBooking};
use crate::services::consistency::SlotLockRegistry;
use crate::store::AppointmentStore;

/// Concrete occurrence dates for a rule, starting at `from`, honoring the
/// rule's termination and an optional exclusive cut date (set when the
/// pattern version has been closed by a series split).
pub fn expand_dates(
    rule: &RecurrenceRule,
    from: NaiveDate,
    until_exclusive: Option<NaiveDate>,
) -> Result<Vec<NaiveDate>, SchedulingError> {
    if rule.interval < 1 {
        return Err(SchedulingError::Validation(
            "recurrence interval must be at least 1".to_string(),
        ));
    }
    if rule.duration_minutes <= 0 {
        return Err(SchedulingError::Validation(
            "recurrence duration must be positive".to_string(),
        ));
    }
    if rule.frequency == Frequency::Weekly && rule.weekdays.is_empty() {
        return Err(SchedulingError::Validation(
            "weekly recurrence requires an explicit weekday set".to_string(),
        ));
    }

    let mut dates = Vec::new();
    let mut push = |date: NaiveDate| -> bool {
        if let Some(cut) = until_exclusive {
            if date >= cut {
                return false;
            }
        }
        match rule.termination {
            Termination::Count(n) => {
                if dates.len() as u32 >= n {
                    return false;
                }
            }
            Termination::Until(last) => {
                if date > last {
                    return false;
                }
            }
        }
        dates.push(date);
        true
    };

    match rule.frequency {
        Frequency::Daily => {
            let mut current = from;
            while push(current) {
                current += Duration::days(rule.interval as i64);
            }
        }
        Frequency::Weekly => {
            let mut weekdays: Vec<Weekday> = rule.weekdays.clone();
            weekdays.sort_by_key(|w| w.num_days_from_monday());
            weekdays.dedup();

            let week_anchor =
                from - Duration::days(from.weekday().num_days_from_monday() as i64);
            'weeks: for stride in 0u32.. {
                let week_start =
                    week_anchor + Duration::days((stride * rule.interval * 7) as i64);
                for weekday in &weekdays {
                    let date =
                        week_start + Duration::days(weekday.num_days_from_monday() as i64);
                    if date < from {
                        continue;
                    }
                    if !push(date) {
                        break 'weeks;
                    }
                }
            }
        }
        Frequency::Monthly => {
            // checked_add_months clamps the day of month, so an anchor on the
            // 31st lands on the last day of shorter months.
            for step in 0u32.. {
                let Some(date) = from.checked_add_months(Months::new(step * rule.interval))
                else {
                    break;
                };
                if !push(date) {
                    break;
                }
            }
        }
    }

    Ok(dates)
}

/// Reject rules that would generate nothing (end date before anchor, zero
/// count) at creation time rather than accepting a dead pattern.
pub fn validate_rule(rule: &RecurrenceRule, from: NaiveDate) -> Result<(), SchedulingError> {
    let dates = expand_dates(rule, from, None)?;
    if dates.is_empty() {
        return Err(SchedulingError::Validation(
            "recurrence rule generates no occurrences".to_string(),
        ));
    }
    Ok(())
}

/// Whether a blocked slot covers the given date, expanding its recurrence
/// rule when it has one.
pub fn block_covers_date(block: &BlockedTimeSlot, date: NaiveDate) -> bool {
    match &block.recurrence {
        None => block.start_date <= date && date <= block.end_date,
        Some(rule) => {
            if date < block.start_date {
                return false;
            }
            expand_dates(rule, block.start_date, None)
                .map(|dates| dates.contains(&date))
                .unwrap_or(false)
        }
    }
}

/// Result of materializing a pattern. Conflicting occurrences are returned
/// to the caller, never silently dropped.
#[derive(Debug)]
pub struct ExpansionOutcome {
    pub created: Vec<Appointment>,
    pub skipped: Vec<SkippedOccurrence>,
}

pub struct RecurrenceExpansionService {
    appointments: Arc<dyn AppointmentStore>,
    conflicts: Arc<ConflictResolverService>,
    locks: Arc<SlotLockRegistry>,
}

impl RecurrenceExpansionService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        conflicts: Arc<ConflictResolverService>,
        locks: Arc<SlotLockRegistry>,
    ) -> Self {
        Self {
            appointments,
            conflicts,
            locks,
        }
    }

    /// Materialize the pattern's occurrences as Appointment rows. Idempotent:
    /// occurrence indices that already have a row are left untouched, so
    /// re-running generation never duplicates occurrences.
    pub async fn materialize(
        &self,
        tenant: TenantId,
        pattern: &RecurringAppointmentPattern,
    ) -> Result<ExpansionOutcome, SchedulingError> {
        let dates = expand_dates(
            &pattern.rule,
            pattern.state.from_date(),
            pattern.state.until_exclusive(),
        )?;
        debug!(
            "Materializing pattern {}: {} occurrence dates",
            pattern.id,
            dates.len()
        );

        let existing = self.appointments.find_by_series(tenant, pattern.id).await?;
        let existing_indices: Vec<u32> = existing
            .iter()
            .filter_map(|a| a.series.map(|s| s.occurrence_index))
            .collect();

        let start_time = pattern.rule.start_time;
        let end_time = start_time + Duration::minutes(pattern.rule.duration_minutes as i64);

        let mut created = Vec::new();
        let mut skipped = Vec::new();

        for (index, date) in dates.into_iter().enumerate() {
            let index = index as u32;
            if existing_indices.contains(&index) {
                continue;
            }

            let proposal = ProposedBooking {
                clinic_id: pattern.clinic_id,
                doctor_id: pattern.doctor_id,
                date,
                start_time,
                end_time,
                exclude_appointment_id: None,
            };

            // Check-then-write for each occurrence slot is exclusive against
            // other writers targeting the same resource and date.
            let _guard = self
                .locks
                .acquire_slot(pattern.clinic_id, pattern.doctor_id, date)
                .await;

            match self.conflicts.find_conflict(tenant, &proposal).await? {
                Some(conflict) => {
                    skipped.push(SkippedOccurrence {
                        occurrence_index: index,
                        date,
                        start_time,
                        end_time,
                        conflict,
                    });
                }
                None => {
                    let now = Utc::now();
                    let appointment = Appointment {
                        id: Uuid::new_v4(),
                        tenant_id: tenant,
                        patient_id: pattern.patient_id,
                        clinic_id: pattern.clinic_id,
                        doctor_id: pattern.doctor_id,
                        date,
                        start_time,
                        duration_minutes: pattern.rule.duration_minutes,
                        status: AppointmentStatus::Scheduled,
                        series: Some(crate::models::SeriesRef {
                            pattern_id: pattern.id,
                            occurrence_index: index,
                        }),
                        cancellation_reason: None,
                        created_at: now,
                        updated_at: now,
                    };
                    created.push(self.appointments.save(appointment).await?);
                }
            }
        }

        info!(
            "Pattern {} materialized: {} created, {} skipped",
            pattern.id,
            created.len(),
            skipped.len()
        );
        Ok(ExpansionOutcome { created, skipped })
    }
}
