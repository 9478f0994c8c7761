use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use shared_utils::extractor::tenant_middleware;

use crate::handlers::{
    book_appointment, cancel_appointment, get_appointment, get_availability, get_daily_agenda,
    get_weekly_agenda, reschedule_appointment, SchedulingState,
};

pub fn create_scheduling_router(state: Arc<SchedulingState>) -> Router {
    let routes = Router::new()
        .route("/availability", get(get_availability))
        .route("/", post(book_appointment))
        .route("/{appointment_id}", get(get_appointment))
        .route("/{appointment_id}/reschedule", patch(reschedule_appointment))
        .route("/{appointment_id}/cancel", post(cancel_appointment))
        .route("/agenda/daily", get(get_daily_agenda))
        .route("/agenda/weekly", get(get_weekly_agenda))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            tenant_middleware,
        ));

    Router::new().merge(routes).with_state(state)
}
