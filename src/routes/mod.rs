use axum::{
    extract::State,
    http::{StatusCode, Uri},
    middleware::{self as axum_middleware},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::adapter::XeroAdapter;
use crate::auth::TokenStore;
use crate::error::{ApiError, XeroError};
use crate::middleware;
use crate::models::{AccountSummary, JournalFailure, JournalRequest};

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application state shared across handlers
///
/// The adapter sits behind a mutex so refreshes and data calls never
/// interleave on its token and tenant state.
#[derive(Clone)]
pub struct AppState {
    pub proxy_api_key: String,
    pub adapter: Arc<Mutex<XeroAdapter>>,
    pub token_store: Arc<TokenStore>,
}

/// Full application: routes plus CORS and request tracing
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(oauth_routes(state.clone()))
        .merge(accounting_routes(state))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Health check routes (no authentication required)
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// Consent flow routes; /callback is hit by the user's browser
pub fn oauth_routes(state: AppState) -> Router {
    Router::new()
        .route("/connect", get(connect_handler))
        .route("/callback", get(callback_handler))
        .with_state(state)
}

/// Accounting routes (require authentication)
pub fn accounting_routes(state: AppState) -> Router {
    Router::new()
        .route("/journals", post(create_journal_handler))
        .route("/accounts", get(get_accounts_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .with_state(state)
}

/// GET / - Simple health check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Xero Gateway is running",
        "version": VERSION
    }))
}

/// GET /health - Detailed health check
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// GET /connect - Redirect the browser to the Xero consent screen
async fn connect_handler(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let adapter = state.adapter.lock().await;
    let url = adapter.consent_url()?;

    tracing::info!("Redirecting to Xero consent screen");
    Ok(Redirect::to(&url))
}

/// GET /callback - Finish the consent flow and persist the new token pair
async fn callback_handler(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Json<Value>, ApiError> {
    tracing::info!("Request to /callback");

    let mut adapter = state.adapter.lock().await;
    let token = adapter.process_callback(&uri.to_string()).await?;
    state.token_store.save(&token)?;

    let tenants: Vec<Value> = adapter
        .tenants()
        .iter()
        .map(|t| json!({ "tenantId": t.tenant_id, "tenantName": t.tenant_name }))
        .collect();

    tracing::info!("Connected to Xero with {} tenant(s)", tenants.len());

    Ok(Json(json!({
        "status": "connected",
        "tenants": tenants,
        "expiresAt": token.expires_at,
    })))
}

/// POST /journals - Create a manual journal
///
/// Replies with `{statusCode, message}` using the same HTTP status.
async fn create_journal_handler(
    State(state): State<AppState>,
    Json(request): Json<JournalRequest>,
) -> Result<Response, ApiError> {
    tracing::info!(
        "Request to /journals: lines={}, status={:?}",
        request.journal_lines.len(),
        request.status
    );

    let mut adapter = state.adapter.lock().await;

    let outcome = match refresh_and_persist(&state, &mut adapter).await {
        Ok(()) => adapter.create_journal(&request).await,
        Err(RefreshError::Xero(e)) => {
            tracing::warn!("Token refresh before journal submission failed: {}", e);
            Err(JournalFailure::from(e))
        }
        Err(RefreshError::Api(e)) => return Err(e),
    };

    let response = match outcome {
        Ok(success) => (StatusCode::OK, Json(success)).into_response(),
        Err(failure) => {
            let status = StatusCode::from_u16(failure.status_code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(failure)).into_response()
        }
    };

    Ok(response)
}

/// GET /accounts - Chart of accounts of the first tenant
async fn get_accounts_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountSummary>>, ApiError> {
    tracing::info!("Request to /accounts");

    let mut adapter = state.adapter.lock().await;
    refresh_and_persist(&state, &mut adapter).await?;

    let accounts = adapter.get_accounts().await?;
    tracing::debug!("Returning {} account(s)", accounts.len());

    Ok(Json(accounts))
}

/// Failure of [`refresh_and_persist`]: the Xero call or the local store
enum RefreshError {
    Xero(XeroError),
    Api(ApiError),
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Xero(e) => e.into(),
            RefreshError::Api(e) => e,
        }
    }
}

/// Refresh the held token and store it again when it changed
///
/// A rotated token is stored even when the refresh itself reports an error
/// afterwards (e.g. tenant resolution failed).
async fn refresh_and_persist(
    state: &AppState,
    adapter: &mut XeroAdapter,
) -> Result<(), RefreshError> {
    let before = adapter.token_set().cloned();
    let refreshed = adapter.refresh_token().await;

    if let Some(token) = adapter.token_set() {
        if before.as_ref() != Some(token) {
            state
                .token_store
                .save(token)
                .map_err(|e| RefreshError::Api(e.into()))?;
        }
    }

    refreshed.map_err(RefreshError::Xero)
}
