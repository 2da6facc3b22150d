// libs/slot-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn slot_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/doctor/{doctor_id}", get(handlers::list_open_slots));

    let protected_routes = Router::new()
        .route("/doctor/{doctor_id}", post(handlers::create_slot))
        .route("/doctor/{doctor_id}/bulk", post(handlers::bulk_generate_slots))
        .route("/{slot_id}/block", patch(handlers::block_slot))
        .route("/{slot_id}", delete(handlers::delete_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
