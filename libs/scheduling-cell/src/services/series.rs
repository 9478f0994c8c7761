// libs/scheduling-cell/src/services/series.rs
//
// Scoped mutation handler for recurring series. A per-request decision
// procedure over {ThisOccurrence, ThisAndFuture, AllInSeries}; nothing here
// is long-lived state.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::TenantId;

use crate::models::{
    Appointment, AppointmentStatus, CancelAppointmentRequest, MutationOutcome, MutationScope,
    PatternState, RecurringAppointmentPattern, RescheduleAppointmentRequest, SchedulingError,
    SkippedOccurrence, TimeRange,
};
use crate::services::conflict::{ConflictResolverService, ProposedBooking};
use crate::services::consistency::{self, SlotLockRegistry};
use crate::services::recurrence::{self, RecurrenceExpansionService};
use crate::store::{AppointmentStore, PatternStore};

const SUPERSEDED_REASON: &str = "Superseded by series reschedule";

pub struct SeriesMutationService {
    appointments: Arc<dyn AppointmentStore>,
    patterns: Arc<dyn PatternStore>,
    conflicts: Arc<ConflictResolverService>,
    expander: Arc<RecurrenceExpansionService>,
    locks: Arc<SlotLockRegistry>,
}

impl SeriesMutationService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        patterns: Arc<dyn PatternStore>,
        conflicts: Arc<ConflictResolverService>,
        expander: Arc<RecurrenceExpansionService>,
        locks: Arc<SlotLockRegistry>,
    ) -> Self {
        Self {
            appointments,
            patterns,
            conflicts,
            expander,
            locks,
        }
    }

    // ==========================================================================
    // RESCHEDULE
    // ==========================================================================

    pub async fn reschedule(
        &self,
        tenant: TenantId,
        appointment_id: Uuid,
        request: &RescheduleAppointmentRequest,
    ) -> Result<MutationOutcome, SchedulingError> {
        let target = self.appointments.find_by_id(tenant, appointment_id).await?;

        match request.scope {
            MutationScope::ThisOccurrence => {
                self.reschedule_single(tenant, target, request).await
            }
            MutationScope::ThisAndFuture => {
                self.reschedule_this_and_future(tenant, target, request).await
            }
            MutationScope::AllInSeries => {
                self.reschedule_all_in_series(tenant, target, request).await
            }
        }
    }

    async fn reschedule_single(
        &self,
        tenant: TenantId,
        mut target: Appointment,
        request: &RescheduleAppointmentRequest,
    ) -> Result<MutationOutcome, SchedulingError> {
        if target.status != AppointmentStatus::Scheduled {
            return Err(SchedulingError::State {
                current: target.status,
            });
        }

        let new_date = request.new_date.unwrap_or(target.date);
        if new_date < Utc::now().date_naive() {
            return Err(SchedulingError::Validation(
                "appointments cannot be rescheduled into the past".to_string(),
            ));
        }
        let new_start = request.new_start_time.unwrap_or(target.start_time);
        let new_duration = request.new_duration_minutes.unwrap_or(target.duration_minutes);
        let new_range = proposed_range(new_start, new_duration)?;

        let _guard = self
            .locks
            .acquire_slot(target.clinic_id, target.doctor_id, new_date)
            .await;

        self.conflicts
            .check(
                tenant,
                &ProposedBooking {
                    clinic_id: target.clinic_id,
                    doctor_id: target.doctor_id,
                    date: new_date,
                    start_time: new_range.start,
                    end_time: new_range.end,
                    exclude_appointment_id: Some(target.id),
                },
            )
            .await?;

        target.date = new_date;
        target.start_time = new_start;
        target.duration_minutes = new_duration;
        self.appointments.save(target).await?;

        Ok(MutationOutcome {
            affected: 1,
            skipped_completed: 0,
            skipped_conflicts: vec![],
            new_pattern_id: None,
        })
    }

    /// Close the open pattern version immediately before the target
    /// occurrence, clone a successor with the new values anchored at the
    /// target date, supersede the old future rows and re-materialize.
    async fn reschedule_this_and_future(
        &self,
        tenant: TenantId,
        target: Appointment,
        request: &RescheduleAppointmentRequest,
    ) -> Result<MutationOutcome, SchedulingError> {
        if request.new_date.is_some() {
            return Err(SchedulingError::Validation(
                "this-and-future reschedules change time or duration; moving dates is a \
                 recurrence-rule change"
                    .to_string(),
            ));
        }

        let series = target.series.ok_or_else(|| {
            SchedulingError::Validation(
                "appointment does not belong to a recurring series".to_string(),
            )
        })?;

        let _series_guard = self
            .locks
            .acquire(consistency::series_key(series.pattern_id))
            .await;

        let pattern = self.patterns.find_by_id(tenant, series.pattern_id).await?;
        if pattern.state.is_closed() {
            return Err(SchedulingError::Validation(
                "occurrence belongs to a closed series segment; edit the open segment instead"
                    .to_string(),
            ));
        }

        let cut = target.date;
        let mut new_rule = pattern.rule.clone();
        if let Some(start) = request.new_start_time {
            new_rule.start_time = start;
        }
        if let Some(duration) = request.new_duration_minutes {
            new_rule.duration_minutes = duration;
        }
        // A count-terminated successor inherits only the occurrences the
        // closed segment has not consumed; the split must not grow the series.
        if let crate::models::Termination::Count(total) = pattern.rule.termination {
            let consumed =
                recurrence::expand_dates(&pattern.rule, pattern.state.from_date(), Some(cut))?
                    .len() as u32;
            new_rule.termination =
                crate::models::Termination::Count(total.saturating_sub(consumed));
        }
        proposed_range(new_rule.start_time, new_rule.duration_minutes)?;
        recurrence::validate_rule(&new_rule, cut)?;

        let closed = RecurringAppointmentPattern {
            state: PatternState::Closed {
                from: pattern.state.from_date(),
                until: cut,
            },
            ..pattern.clone()
        };
        let successor = RecurringAppointmentPattern {
            id: Uuid::new_v4(),
            rule: new_rule,
            state: PatternState::Open { from: cut },
            predecessor_id: Some(pattern.id),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..pattern.clone()
        };
        let successor_id = successor.id;

        // Close and clone land together or not at all.
        self.patterns.save_pair(closed, successor.clone()).await?;
        info!(
            "Series {} split at {}: successor pattern {}",
            pattern.id, cut, successor_id
        );

        // Old rows from the cut date forward are superseded before the new
        // pattern re-materializes into their slots.
        let (superseded, skipped_completed) = self
            .cancel_series_rows(tenant, pattern.id, cut, SUPERSEDED_REASON)
            .await?;
        debug!(
            "Superseded {} occurrences of pattern {} ({} completed kept)",
            superseded, pattern.id, skipped_completed
        );

        let expansion = self.expander.materialize(tenant, &successor).await?;

        Ok(MutationOutcome {
            affected: expansion.created.len(),
            skipped_completed,
            skipped_conflicts: expansion.skipped,
            new_pattern_id: Some(successor_id),
        })
    }

    async fn reschedule_all_in_series(
        &self,
        tenant: TenantId,
        target: Appointment,
        request: &RescheduleAppointmentRequest,
    ) -> Result<MutationOutcome, SchedulingError> {
        if request.new_date.is_some() {
            return Err(SchedulingError::Validation(
                "all-in-series reschedules change time or duration; moving dates is a \
                 recurrence-rule change"
                    .to_string(),
            ));
        }

        let series = target.series.ok_or_else(|| {
            SchedulingError::Validation(
                "appointment does not belong to a recurring series".to_string(),
            )
        })?;

        let _series_guard = self
            .locks
            .acquire(consistency::series_key(series.pattern_id))
            .await;

        let mut pattern = self.patterns.find_by_id(tenant, series.pattern_id).await?;
        let today = Utc::now().date_naive();

        let occurrences = self
            .appointments
            .find_by_series(tenant, series.pattern_id)
            .await?;

        let mut affected = 0;
        let mut skipped_completed = 0;
        let mut skipped_conflicts: Vec<SkippedOccurrence> = Vec::new();

        for mut occurrence in occurrences {
            if occurrence.date < today {
                continue;
            }
            match occurrence.status {
                AppointmentStatus::Completed => {
                    skipped_completed += 1;
                    continue;
                }
                AppointmentStatus::Cancelled | AppointmentStatus::NoShow => continue,
                _ => {}
            }

            let new_start = request.new_start_time.unwrap_or(occurrence.start_time);
            let new_duration = request
                .new_duration_minutes
                .unwrap_or(occurrence.duration_minutes);
            let new_range = proposed_range(new_start, new_duration)?;

            let _guard = self
                .locks
                .acquire_slot(occurrence.clinic_id, occurrence.doctor_id, occurrence.date)
                .await;

            let proposal = ProposedBooking {
                clinic_id: occurrence.clinic_id,
                doctor_id: occurrence.doctor_id,
                date: occurrence.date,
                start_time: new_range.start,
                end_time: new_range.end,
                exclude_appointment_id: Some(occurrence.id),
            };
            match self.conflicts.find_conflict(tenant, &proposal).await? {
                Some(conflict) => {
                    skipped_conflicts.push(SkippedOccurrence {
                        occurrence_index: occurrence
                            .series
                            .map(|s| s.occurrence_index)
                            .unwrap_or_default(),
                        date: occurrence.date,
                        start_time: new_range.start,
                        end_time: new_range.end,
                        conflict,
                    });
                }
                None => {
                    occurrence.start_time = new_start;
                    occurrence.duration_minutes = new_duration;
                    self.appointments.save(occurrence).await?;
                    affected += 1;
                }
            }
        }

        // Time and duration are recurrence-level values; the open pattern's
        // canonical rule follows the edit.
        if !pattern.state.is_closed() {
            if let Some(start) = request.new_start_time {
                pattern.rule.start_time = start;
            }
            if let Some(duration) = request.new_duration_minutes {
                pattern.rule.duration_minutes = duration;
            }
            self.patterns.save(pattern).await?;
        }

        Ok(MutationOutcome {
            affected,
            skipped_completed,
            skipped_conflicts,
            new_pattern_id: None,
        })
    }

    // ==========================================================================
    // CANCEL
    // ==========================================================================

    pub async fn cancel(
        &self,
        tenant: TenantId,
        appointment_id: Uuid,
        request: &CancelAppointmentRequest,
    ) -> Result<MutationOutcome, SchedulingError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(SchedulingError::Validation(
                "cancellation reason is required".to_string(),
            ));
        }

        let target = self.appointments.find_by_id(tenant, appointment_id).await?;

        match request.scope {
            MutationScope::ThisOccurrence => self.cancel_single(target, reason).await,
            MutationScope::ThisAndFuture => {
                let cut = target.date;
                self.cancel_from(tenant, target, cut, reason).await
            }
            MutationScope::AllInSeries => {
                // Everything still in the future, from today.
                let today = Utc::now().date_naive();
                self.cancel_from(tenant, target, today, reason).await
            }
        }
    }

    async fn cancel_single(
        &self,
        mut target: Appointment,
        reason: &str,
    ) -> Result<MutationOutcome, SchedulingError> {
        if !target
            .status
            .can_transition_to(&AppointmentStatus::Cancelled)
        {
            return Err(SchedulingError::State {
                current: target.status,
            });
        }
        target.status = AppointmentStatus::Cancelled;
        target.cancellation_reason = Some(reason.to_string());
        self.appointments.save(target).await?;
        Ok(MutationOutcome {
            affected: 1,
            skipped_completed: 0,
            skipped_conflicts: vec![],
            new_pattern_id: None,
        })
    }

    async fn cancel_from(
        &self,
        tenant: TenantId,
        target: Appointment,
        cut: NaiveDate,
        reason: &str,
    ) -> Result<MutationOutcome, SchedulingError> {
        let series = target.series.ok_or_else(|| {
            SchedulingError::Validation(
                "appointment does not belong to a recurring series".to_string(),
            )
        })?;

        let _series_guard = self
            .locks
            .acquire(consistency::series_key(series.pattern_id))
            .await;

        let pattern = self.patterns.find_by_id(tenant, series.pattern_id).await?;

        // Stop the pattern from generating past the cut. Closing the open
        // version is the one legal state change; closed versions stay as-is.
        if !pattern.state.is_closed() {
            let from = pattern.state.from_date();
            let closed = RecurringAppointmentPattern {
                state: PatternState::Closed {
                    from,
                    until: cut.max(from),
                },
                ..pattern
            };
            self.patterns.save(closed).await?;
        }

        let (affected, skipped_completed) = self
            .cancel_series_rows(tenant, series.pattern_id, cut, reason)
            .await?;
        info!(
            "Cancelled {} occurrences of series {} from {} ({} completed kept)",
            affected, series.pattern_id, cut, skipped_completed
        );

        Ok(MutationOutcome {
            affected,
            skipped_completed,
            skipped_conflicts: vec![],
            new_pattern_id: None,
        })
    }

    /// Cancel every non-terminal occurrence of the pattern on or after the
    /// cut date, attaching the audit reason to each affected row. Completed
    /// rows are excluded and counted rather than failing the batch.
    async fn cancel_series_rows(
        &self,
        tenant: TenantId,
        pattern_id: Uuid,
        cut: NaiveDate,
        reason: &str,
    ) -> Result<(usize, usize), SchedulingError> {
        let occurrences = self.appointments.find_by_series(tenant, pattern_id).await?;

        let mut affected = 0;
        let mut skipped_completed = 0;
        for mut occurrence in occurrences {
            if occurrence.date < cut {
                continue;
            }
            match occurrence.status {
                AppointmentStatus::Completed => {
                    skipped_completed += 1;
                }
                AppointmentStatus::Cancelled | AppointmentStatus::NoShow => {}
                _ => {
                    occurrence.status = AppointmentStatus::Cancelled;
                    occurrence.cancellation_reason = Some(reason.to_string());
                    self.appointments.save(occurrence).await?;
                    affected += 1;
                }
            }
        }
        Ok((affected, skipped_completed))
    }
}

fn proposed_range(
    start: chrono::NaiveTime,
    duration_minutes: i32,
) -> Result<TimeRange, SchedulingError> {
    if duration_minutes <= 0 {
        return Err(SchedulingError::Validation(format!(
            "appointment duration must be positive, got {}",
            duration_minutes
        )));
    }
    TimeRange::new(
        start,
        start + chrono::Duration::minutes(duration_minutes as i64),
    )
}
