//! # relgate HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET|POST /releases` - List (filter + paging) or create releases
//! - `GET|PUT|DELETE /releases/{id}` - Release detail, update, soft delete
//! - `POST /releases/{id}/criteria` - Add a criterion
//! - `PUT|DELETE /releases/{id}/criteria/{cid}` - Update or delete a criterion
//! - `GET|POST /releases/{id}/stakeholders` - List or assign stakeholders
//! - `DELETE /releases/{id}/stakeholders/{uid}` - Remove a stakeholder
//! - `GET /releases/{id}/sign-offs` - Sign-off history, newest first
//! - `GET /releases/{id}/sign-off-matrix` - Criteria x stakeholders matrix
//! - `POST|DELETE /criteria/{cid}/sign-off` - Sign off or revoke
//! - `GET /dashboard/my-pending` - Pending criteria owned by the caller
//! - `GET /dashboard/releases-summary` - Release counts by status
//!
//! The caller is identified by the `X-User-Id` header. Security settings
//! (API key, rate limit, CORS origins) come from [`ServerConfig`].

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{ActingUser, USER_HEADER};
pub use handlers::ApiError;
pub use middleware::create_rate_limiter;
pub use types::{
    AssignStakeholdersRequest, AssignStakeholdersResponse, CreateCriterionRequest,
    CreateReleaseRequest, CriterionChange, ErrorResponse, HealthResponse, ListQuery,
    ReleaseListResponse, RevokeResponse, SignOffBody, SignOffResponse,
};

use crate::config::ServerConfig;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use relgate_core::{RelgateError, Tracker};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the release tracker.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<RwLock<Tracker>>,
}

impl AppState {
    #[must_use]
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker: Arc::new(RwLock::new(tracker)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

fn cors_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(USER_HEADER),
    ]
}

/// Build the CORS layer from the configured origins.
///
/// - `["*"]`: allows all origins (development only)
/// - empty: localhost only
/// - otherwise: the listed origins; invalid entries are skipped
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }
    if origins.is_empty() {
        tracing::info!("CORS: No origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }

    let allowed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(hv)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }
    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(CORS_METHODS)
        .allow_headers(cors_headers())
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers(cors_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - if `rate_limit > 0`
/// 5. Authentication - if `api_key` is set
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/releases",
            get(handlers::list_releases_handler).post(handlers::create_release_handler),
        )
        .route(
            "/releases/{id}",
            get(handlers::get_release_handler)
                .put(handlers::update_release_handler)
                .delete(handlers::delete_release_handler),
        )
        .route(
            "/releases/{id}/criteria",
            post(handlers::add_criterion_handler),
        )
        .route(
            "/releases/{id}/criteria/{cid}",
            put(handlers::update_criterion_handler).delete(handlers::delete_criterion_handler),
        )
        .route(
            "/releases/{id}/stakeholders",
            get(handlers::list_stakeholders_handler).post(handlers::assign_stakeholders_handler),
        )
        .route(
            "/releases/{id}/stakeholders/{uid}",
            delete(handlers::remove_stakeholder_handler),
        )
        .route(
            "/releases/{id}/sign-offs",
            get(handlers::release_signoffs_handler),
        )
        .route(
            "/releases/{id}/sign-off-matrix",
            get(handlers::signoff_matrix_handler),
        )
        .route(
            "/criteria/{cid}/sign-off",
            post(handlers::sign_off_handler).delete(handlers::revoke_handler),
        )
        .route("/dashboard/my-pending", get(handlers::my_pending_handler))
        .route(
            "/dashboard/releases-summary",
            get(handlers::releases_summary_handler),
        );

    // Authentication is innermost: it runs last on the request path.
    match config.api_key.as_deref() {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                Arc::<str>::from(key),
                auth::api_key_auth_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - all endpoints are publicly accessible! \
                 Set api_key or RELGATE_API_KEY to enable authentication."
            );
        }
    }

    if config.rate_limit > 0 {
        tracing::info!(
            "Rate limiting enabled: {} requests/second",
            config.rate_limit
        );
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(config.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(&config.cors_origins))
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and serve until ctrl-c.
pub async fn run_server(tracker: Tracker, config: &ServerConfig) -> Result<(), RelgateError> {
    let addr = config.addr();
    let router = create_router(AppState::new(tracker), config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelgateError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("relgate HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelgateError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
