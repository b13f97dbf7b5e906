//! Route table.
//!
//! Keys may contain `/`, so each operation gets its own literal prefix
//! ahead of the wildcard: `key` for object CRUD, `copy` for server-side
//! copies, `size` for prefix aggregation.

use crate::handlers::files;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(files::status))
        .route(
            "/bucket/{bucket}/key/{*key}",
            get(files::get_file)
                .post(files::insert_file)
                .delete(files::delete_file),
        )
        .route("/bucket/{bucket}/copy/{*key}", post(files::copy_file))
        .route("/bucket/{bucket}/size/{*prefix}", get(files::directory_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
