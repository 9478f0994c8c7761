// libs/scheduling-cell/src/services/booking.rs
//
// Write-path orchestration: single and recurring booking, reschedule and
// cancel entry points, notification dispatch. The conflict check and the
// save for one slot run under the slot's exclusive section; bookings for
// other doctors or dates proceed in parallel.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::TenantId;

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, BookingOutcome,
    CancelAppointmentRequest, MutationOutcome, PatternState, RecurrenceRule,
    RecurringAppointmentPattern, RescheduleAppointmentRequest, SchedulingError,
    SchedulingNotification, TimeRange,
};
use crate::services::conflict::{ConflictResolverService, ProposedBooking};
use crate::services::consistency::SlotLockRegistry;
use crate::services::recurrence::{self, RecurrenceExpansionService};
use crate::services::series::SeriesMutationService;
use crate::store::{
    AppointmentStore, ClinicDirectory, NotificationSender, PatternStore,
};

pub struct BookingService {
    appointments: Arc<dyn AppointmentStore>,
    patterns: Arc<dyn PatternStore>,
    clinics: Arc<dyn ClinicDirectory>,
    conflicts: Arc<ConflictResolverService>,
    expander: Arc<RecurrenceExpansionService>,
    series: Arc<SeriesMutationService>,
    locks: Arc<SlotLockRegistry>,
    notifier: Arc<dyn NotificationSender>,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        patterns: Arc<dyn PatternStore>,
        clinics: Arc<dyn ClinicDirectory>,
        conflicts: Arc<ConflictResolverService>,
        expander: Arc<RecurrenceExpansionService>,
        series: Arc<SeriesMutationService>,
        locks: Arc<SlotLockRegistry>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            appointments,
            patterns,
            clinics,
            conflicts,
            expander,
            series,
            locks,
            notifier,
        }
    }

    pub async fn get_appointment(
        &self,
        tenant: TenantId,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        self.appointments.find_by_id(tenant, appointment_id).await
    }

    /// Book a single appointment or, when the request carries recurrence
    /// parameters, a whole series anchored at the requested date.
    pub async fn book(
        &self,
        tenant: TenantId,
        request: &BookAppointmentRequest,
    ) -> Result<BookingOutcome, SchedulingError> {
        let settings = self.clinics.settings(tenant, request.clinic_id).await?;
        let duration = request
            .duration_minutes
            .unwrap_or(settings.default_duration_minutes);
        if duration <= 0 {
            return Err(SchedulingError::Validation(format!(
                "appointment duration must be positive, got {}",
                duration
            )));
        }
        if request.date < Utc::now().date_naive() {
            return Err(SchedulingError::Validation(
                "appointments cannot be booked in the past".to_string(),
            ));
        }

        match &request.recurrence {
            None => self.book_single(tenant, request, duration).await,
            Some(params) => {
                let rule = RecurrenceRule {
                    frequency: params.frequency,
                    interval: params.interval,
                    weekdays: params.weekdays.clone(),
                    start_time: request.start_time,
                    duration_minutes: duration,
                    termination: params.termination,
                };
                self.book_series(tenant, request, rule).await
            }
        }
    }

    async fn book_single(
        &self,
        tenant: TenantId,
        request: &BookAppointmentRequest,
        duration: i32,
    ) -> Result<BookingOutcome, SchedulingError> {
        let range = TimeRange::new(
            request.start_time,
            request.start_time + Duration::minutes(duration as i64),
        )?;

        let _guard = self
            .locks
            .acquire_slot(request.clinic_id, request.doctor_id, request.date)
            .await;

        self.conflicts
            .check(
                tenant,
                &ProposedBooking {
                    clinic_id: request.clinic_id,
                    doctor_id: request.doctor_id,
                    date: request.date,
                    start_time: range.start,
                    end_time: range.end,
                    exclude_appointment_id: None,
                },
            )
            .await?;

        let now = Utc::now();
        let appointment = self
            .appointments
            .save(Appointment {
                id: Uuid::new_v4(),
                tenant_id: tenant,
                patient_id: request.patient_id,
                clinic_id: request.clinic_id,
                doctor_id: request.doctor_id,
                date: request.date,
                start_time: request.start_time,
                duration_minutes: duration,
                status: AppointmentStatus::Scheduled,
                series: None,
                cancellation_reason: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(
            "Booked appointment {} for patient {} on {} at {}",
            appointment.id, appointment.patient_id, appointment.date, appointment.start_time
        );
        self.dispatch(SchedulingNotification::Booked {
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            date: appointment.date,
            start_time: appointment.start_time,
        });

        Ok(BookingOutcome {
            appointments: vec![appointment],
            pattern_id: None,
            skipped: vec![],
        })
    }

    async fn book_series(
        &self,
        tenant: TenantId,
        request: &BookAppointmentRequest,
        rule: RecurrenceRule,
    ) -> Result<BookingOutcome, SchedulingError> {
        // A rule that would generate nothing is rejected up front.
        recurrence::validate_rule(&rule, request.date)?;

        let now = Utc::now();
        let pattern = self
            .patterns
            .save(RecurringAppointmentPattern {
                id: Uuid::new_v4(),
                tenant_id: tenant,
                clinic_id: request.clinic_id,
                doctor_id: request.doctor_id,
                patient_id: request.patient_id,
                rule,
                state: PatternState::Open { from: request.date },
                predecessor_id: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let expansion = self.expander.materialize(tenant, &pattern).await?;
        debug!(
            "Series {} booked: {} occurrences, {} skipped",
            pattern.id,
            expansion.created.len(),
            expansion.skipped.len()
        );

        for appointment in &expansion.created {
            self.dispatch(SchedulingNotification::Booked {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
                date: appointment.date,
                start_time: appointment.start_time,
            });
        }

        Ok(BookingOutcome {
            appointments: expansion.created,
            pattern_id: Some(pattern.id),
            skipped: expansion.skipped,
        })
    }

    pub async fn reschedule(
        &self,
        tenant: TenantId,
        appointment_id: Uuid,
        request: &RescheduleAppointmentRequest,
    ) -> Result<MutationOutcome, SchedulingError> {
        let outcome = self.series.reschedule(tenant, appointment_id, request).await?;

        if let Ok(appointment) = self.appointments.find_by_id(tenant, appointment_id).await {
            self.dispatch(SchedulingNotification::Rescheduled {
                appointment_id,
                patient_id: appointment.patient_id,
                date: appointment.date,
                start_time: appointment.start_time,
            });
        }
        Ok(outcome)
    }

    pub async fn cancel(
        &self,
        tenant: TenantId,
        appointment_id: Uuid,
        request: &CancelAppointmentRequest,
    ) -> Result<MutationOutcome, SchedulingError> {
        let outcome = self.series.cancel(tenant, appointment_id, request).await?;

        if let Ok(appointment) = self.appointments.find_by_id(tenant, appointment_id).await {
            self.dispatch(SchedulingNotification::Cancelled {
                appointment_id,
                patient_id: appointment.patient_id,
                reason: request.reason.clone(),
            });
        }
        Ok(outcome)
    }

    /// Status transition entry point for the non-queue lifecycle operations
    /// (check-in and completion happen via the waiting queue cell, which
    /// calls back through this).
    pub async fn transition(
        &self,
        tenant: TenantId,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.appointments.find_by_id(tenant, appointment_id).await?;
        if !appointment.status.can_transition_to(&new_status) {
            return Err(SchedulingError::State {
                current: appointment.status,
            });
        }
        appointment.status = new_status;
        appointment.updated_at = Utc::now();
        self.appointments.save(appointment).await
    }

    /// Fire-and-forget: delivery failure is logged and never rolls back the
    /// scheduling write that triggered it.
    fn dispatch(&self, notification: SchedulingNotification) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(notification).await {
                warn!("Notification dispatch failed: {}", e);
            }
        });
    }
}
