use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{AuthError, AuthProvider, LocalAuthProvider};
use crate::config::{AppConfig, Environment};
use crate::database::{MemoryStore, Store};
use crate::handlers::{protected, public};
use crate::middleware::resolve_viewer_middleware;
use crate::services::{ArticleService, ProfileService};

/// Everything a handler may reach. No ambient "current user" lives here;
/// the viewer is resolved per request into a `ViewContext`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub auth: Arc<dyn AuthProvider>,
    pub articles: ArticleService,
    pub profiles: ProfileService,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn Store>,
        auth: Arc<dyn AuthProvider>,
        shutdown: CancellationToken,
    ) -> Self {
        let articles = ArticleService::new(store.clone(), config.clone());
        let profiles = ProfileService::new(store.clone(), articles.clone());
        Self {
            config,
            store,
            auth,
            articles,
            profiles,
            shutdown,
        }
    }

    /// Memory-backed state with the local auth provider.
    pub fn in_memory(config: AppConfig) -> Result<Self, AuthError> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let auth = Arc::new(LocalAuthProvider::new(store.clone(), &config.security)?);
        Ok(Self::new(Arc::new(config), store, auth, CancellationToken::new()))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let request_logging = state.config.server.enable_request_logging;

    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .merge(article_routes())
        .merge(profile_routes())
        // Protected
        .merge(auth_routes())
        .route("/api/dashboard", get(protected::dashboard::show))
        .route("/api/preview", post(protected::articles::preview))
        // Global middleware
        .layer(middleware::from_fn_with_state(state.clone(), resolve_viewer_middleware))
        .layer(cors)
        .with_state(state);

    if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/confirm", post(auth::confirm))
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/auth/signout", post(auth::signout))
}

fn article_routes() -> Router<AppState> {
    Router::new()
        // Listing is public, creating needs a session
        .route(
            "/api/articles",
            get(public::articles::list).post(protected::articles::create),
        )
        .route(
            "/api/articles/:id",
            get(public::articles::show).put(protected::articles::update),
        )
        .route("/api/articles/:id/edit", get(protected::articles::edit_form))
}

fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profiles/:username", get(public::profiles::show))
        .route("/api/profile", patch(protected::profile::update))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.environment == Environment::Development || config.security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Zenn Clone API",
            "version": version,
            "description": "Markdown article publishing: drafts, published articles and author profiles",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/signup, /auth/signin, /auth/confirm (public)",
                "articles": "GET /api/articles, GET /api/articles/:id (public)",
                "profiles": "GET /api/profiles/:username (public)",
                "write": "POST /api/articles, GET /api/articles/:id/edit, PUT /api/articles/:id, POST /api/preview (session)",
                "dashboard": "/api/dashboard (session)",
                "auth": "/api/auth/whoami, /api/auth/signout (session)",
                "profile": "PATCH /api/profile (session)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                    "backend": backend
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": {
                        "code": "SERVICE_UNAVAILABLE",
                        "message": "database unavailable"
                    },
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "backend": backend
                    }
                })),
            )
        }
    }
}
