use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde::Serialize;

use crate::{AppResult, AppState, service::ReferralService};

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    users: usize,
    referrals: usize,
}

#[debug_handler(state = AppState)]
pub(crate) async fn health(
    State(service): State<Arc<ReferralService>>,
) -> AppResult<Json<HealthResponse>> {
    let counts = service.counts()?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        users: counts.users,
        referrals: counts.referrals,
    }))
}
