pub mod appresult;
pub mod config;
pub mod health;
pub mod join;
pub mod profiles;
pub mod register;
pub mod registry;
pub mod service;
pub mod session;

use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
use config::Config;
use registry::Registry;
use service::ReferralService;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub service: Arc<ReferralService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(registry: Arc<dyn Registry>, config: Config) -> AppState {
        AppState {
            service: Arc::new(ReferralService::new(registry, &config)),
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let session_layer = session::layer(state.config.session_idle_minutes);

    Router::new()
        .route("/health", get(health::health))
        .route("/register", post(register::register))
        .route("/join", get(join::join))
        .nest("/api/profile", profiles::router())
        .with_state(state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
