use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AccountService, SeaOrmAccountService, TokenService};

pub mod accounts;
mod error;
mod throttle;

pub use error::ApiError;
pub use throttle::RegisterThrottle;

pub struct AppState {
    pub store: Store,

    pub account_service: Arc<dyn AccountService>,

    pub token_service: TokenService,

    pub register_throttle: RegisterThrottle,

    pub config: Config,
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    create_app_state(store, config)
}

pub fn create_app_state(store: Store, config: Config) -> anyhow::Result<Arc<AppState>> {
    config.validate()?;

    let account_service = Arc::new(SeaOrmAccountService::new(store.clone(), config.clone()));
    let token_service = TokenService::new(&config.auth);
    let register_throttle = RegisterThrottle::new(&config.security.register_throttle);

    Ok(Arc::new(AppState {
        store,
        account_service,
        token_service,
        register_throttle,
        config,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let protected_routes = Router::new()
        .route("/v1/profile/", get(accounts::profile))
        .route("/v1/profile/avatar", put(accounts::update_avatar))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            accounts::auth_middleware,
        ));

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .merge(protected_routes)
        .route("/v1/register/", post(accounts::register))
        .route("/v1/login/", post(accounts::login))
        .with_state(state)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
