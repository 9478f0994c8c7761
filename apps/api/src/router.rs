use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use tracing::info;

use scheduling_cell::handlers::SchedulingState;
use scheduling_cell::models::{BlockedTimeSlot, ClinicSettings};
use scheduling_cell::services::agenda::AgendaService;
use scheduling_cell::services::availability::AvailabilityService;
use scheduling_cell::services::booking::BookingService;
use scheduling_cell::services::conflict::ConflictResolverService;
use scheduling_cell::services::consistency::SlotLockRegistry;
use scheduling_cell::services::recurrence::RecurrenceExpansionService;
use scheduling_cell::services::series::SeriesMutationService;
use scheduling_cell::store::{InMemoryStore, LoggingNotifier};
use shared_config::AppConfig;
use shared_models::{AppError, TenantId};
use waiting_queue_cell::handlers::QueueState;
use waiting_queue_cell::services::WaitingQueueService;
use waiting_queue_cell::store::InMemoryQueueStore;

use crate::lifecycle::SchedulingLifecycle;

/// Administrative surface kept on the binary: clinic registration and blocked
/// time live here because they write through the concrete store, not the
/// scheduling engine's seams.
struct AdminState {
    config: Arc<AppConfig>,
    store: Arc<InMemoryStore>,
}

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let store = InMemoryStore::new();
    let queue_store = Arc::new(InMemoryQueueStore::new());
    let locks = SlotLockRegistry::new();

    let conflicts = Arc::new(ConflictResolverService::new(store.clone(), store.clone()));
    let expander = Arc::new(RecurrenceExpansionService::new(
        store.clone(),
        conflicts.clone(),
        locks.clone(),
    ));
    let series = Arc::new(SeriesMutationService::new(
        store.clone(),
        store.clone(),
        conflicts.clone(),
        expander.clone(),
        locks.clone(),
    ));
    let booking = Arc::new(BookingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        conflicts.clone(),
        expander,
        series,
        locks,
        Arc::new(LoggingNotifier),
    ));
    let availability = Arc::new(AvailabilityService::new(
        store.clone(),
        store.clone(),
        store.clone(),
    ));
    let agenda = Arc::new(AgendaService::new(
        store.clone(),
        store.clone(),
        queue_store.clone(),
    ));

    let queue_service = Arc::new(WaitingQueueService::new(
        queue_store,
        Arc::new(SchedulingLifecycle::new(booking.clone())),
    ));

    let scheduling_state = Arc::new(SchedulingState {
        config: config.clone(),
        booking,
        availability,
        agenda,
    });
    let queue_state = Arc::new(QueueState {
        config: config.clone(),
        service: queue_service,
    });
    let admin_state = Arc::new(AdminState {
        config: config.clone(),
        store,
    });

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest(
            "/appointments",
            scheduling_cell::create_scheduling_router(scheduling_state),
        )
        .nest(
            "/queue",
            waiting_queue_cell::create_waiting_queue_router(queue_state),
        )
        .merge(admin_routes(admin_state))
}

fn admin_routes(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/clinics", post(register_clinic))
        .route("/blocked-slots", post(create_blocked_slot))
        .layer(axum::middleware::from_fn_with_state(
            state.config.clone(),
            shared_utils::extractor::tenant_middleware,
        ))
        .with_state(state)
}

async fn register_clinic(
    State(state): State<Arc<AdminState>>,
    Extension(tenant): Extension<TenantId>,
    Json(settings): Json<ClinicSettings>,
) -> Result<Json<Value>, AppError> {
    info!("Registering clinic {} for tenant {}", settings.clinic_id, tenant);
    let clinic_id = settings.clinic_id;
    state.store.register_clinic(tenant, settings).await;

    Ok(Json(json!({
        "success": true,
        "clinic_id": clinic_id
    })))
}

async fn create_blocked_slot(
    State(state): State<Arc<AdminState>>,
    Extension(tenant): Extension<TenantId>,
    Json(mut slot): Json<BlockedTimeSlot>,
) -> Result<Json<Value>, AppError> {
    use scheduling_cell::store::BlockedSlotStore;

    slot.tenant_id = tenant;
    let slot = state
        .store
        .save(slot)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(
        "Blocked slot {} created for clinic {} ({} to {})",
        slot.id, slot.clinic_id, slot.start_date, slot.end_date
    );
    Ok(Json(json!({
        "success": true,
        "blocked_slot": slot
    })))
}
