use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State, rejection::QueryRejection},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppResult, AppState,
    service::{JoinOutcome, ReferralService},
};

impl IntoResponse for JoinOutcome {
    fn into_response(self) -> Response {
        match self {
            JoinOutcome::Redirect(target) => Redirect::to(&target).into_response(),
            JoinOutcome::Display(text) => text.into_response(),
        }
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn join(
    State(service): State<Arc<ReferralService>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> AppResult<JoinOutcome> {
    // Repeated `r` keeps the first; an unparsable query counts as no referrer.
    let r = match &query {
        Ok(Query(pairs)) => pairs
            .iter()
            .find(|(key, _)| key == "r")
            .map(|(_, value)| value.as_str()),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable join query");
            None
        }
    };
    service.resolve_join(r)
}
