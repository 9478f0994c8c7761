use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use scheduling_cell::models::{AppointmentStatus, SchedulingError};
use scheduling_cell::services::booking::BookingService;
use shared_models::TenantId;
use waiting_queue_cell::store::{AppointmentLifecycle, LifecycleEvent};
use waiting_queue_cell::QueueError;

/// Bridges queue transitions onto the appointment status machine. An entry
/// with no backing appointment never reaches this.
pub struct SchedulingLifecycle {
    booking: Arc<BookingService>,
}

impl SchedulingLifecycle {
    pub fn new(booking: Arc<BookingService>) -> Self {
        Self { booking }
    }
}

#[async_trait]
impl AppointmentLifecycle for SchedulingLifecycle {
    async fn apply(
        &self,
        tenant: TenantId,
        appointment_id: Uuid,
        event: LifecycleEvent,
    ) -> Result<(), QueueError> {
        let target = match event {
            LifecycleEvent::CheckedIn => AppointmentStatus::CheckedIn,
            LifecycleEvent::ServiceStarted => AppointmentStatus::InProgress,
            LifecycleEvent::Completed => AppointmentStatus::Completed,
        };

        self.booking
            .transition(tenant, appointment_id, target)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                SchedulingError::NotFound => QueueError::NotFound,
                SchedulingError::State { current } => QueueError::Validation(format!(
                    "appointment {} is {} and cannot become {}",
                    appointment_id, current, target
                )),
                other => QueueError::Store(other.to_string()),
            })
    }
}
