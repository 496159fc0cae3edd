mod api;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(api::profile))
        .route("/{id}/referrals", get(api::referrals))
}
