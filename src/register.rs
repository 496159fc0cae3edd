use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    AppError, AppResult, AppState,
    registry::{InternalHandle, PublicId},
    service::ReferralService,
    session::{INTERNAL_HANDLE, PUBLIC_ID},
};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RegisterRequest {
    #[serde(default, alias = "telegram_id")]
    internal_handle: Option<InternalHandle>,
    #[serde(default, alias = "referrer_public_id")]
    referrer: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterResponse {
    public_id: PublicId,
    join_url: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(service): State<Arc<ReferralService>>,
    session: Session,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<RegisterResponse>> {
    let Json(RegisterRequest { internal_handle, referrer }) =
        body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let internal_handle = match internal_handle {
        Some(handle) => Some(handle),
        None => session.get::<InternalHandle>(INTERNAL_HANDLE).await?,
    };

    let registration =
        service.request_registration(internal_handle.clone(), referrer.as_deref())?;

    if let Some(handle) = internal_handle {
        session.insert(INTERNAL_HANDLE, handle).await?;
    }
    session.insert(PUBLIC_ID, registration.public_id).await?;

    Ok(Json(RegisterResponse {
        public_id: registration.public_id,
        join_url: registration.join_url,
    }))
}
