use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod metrics;
pub mod queues;
pub mod xml;

/// Application routes. `/metrics` is mounted separately because it carries
/// its own state.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/xml/jdf/run/{job_id}/{item_num}/{genxml_func}", get(xml::run_jdf))
        .route("/xml/jdf/gen/{job_id}/{item_num}/{genxml_func}", get(xml::gen_jdf))
        .route("/xml/jmf/run/{job_id}/{item_num}/{genxml_func}", get(xml::run_jmf))
        .route("/xml/echo", get(xml::echo).post(xml::echo))
        .route("/api/v1/queues/{kind}", post(queues::enqueue))
        .route("/api/v1/queues/{kind}/pending", get(queues::pending))
}
