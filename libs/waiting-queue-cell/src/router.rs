use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use shared_utils::extractor::tenant_middleware;

use crate::handlers::{
    call_entry, call_next, check_in, complete_service, get_queue, skip_entry, start_service,
    QueueState,
};

pub fn create_waiting_queue_router(state: Arc<QueueState>) -> Router {
    let routes = Router::new()
        .route("/", get(get_queue))
        .route("/check-in", post(check_in))
        .route("/clinics/{clinic_id}/call-next", post(call_next))
        .route("/entries/{entry_id}/call", post(call_entry))
        .route("/entries/{entry_id}/start", post(start_service))
        .route("/entries/{entry_id}/complete", post(complete_service))
        .route("/entries/{entry_id}/skip", post(skip_entry))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            tenant_middleware,
        ));

    Router::new().merge(routes).with_state(state)
}
