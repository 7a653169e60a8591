use crate::errors::AppError;
use crate::identity::{resolve_actor, IdentityProvider, SignInRequest, SignUpRequest};
use crate::lifecycle::LifecycleController;
use crate::models::{OperationInput, OperationStats, OperationView};
use crate::paste_parser;
use crate::store::{ProfileDirectory, RoleResolver};
use crate::visibility::{dashboard_views, default_view, Actor, ViewSelector};
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How long a resolved actor is reused for the same bearer token.
pub const ACTOR_CACHE_TTL: Duration = Duration::from_secs(60);

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: LifecycleController,
    /// Auth service that issues and verifies access tokens.
    pub identity: Arc<dyn IdentityProvider>,
    pub roles: Arc<dyn RoleResolver>,
    pub profiles: Arc<dyn ProfileDirectory>,
    /// Access token -> resolved actor.
    pub actor_cache: Cache<String, Actor>,
}

impl AppState {
    pub fn new(
        controller: LifecycleController,
        identity: Arc<dyn IdentityProvider>,
        roles: Arc<dyn RoleResolver>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        let actor_cache = Cache::builder()
            .time_to_live(ACTOR_CACHE_TTL)
            .max_capacity(10_000)
            .build();

        Self {
            controller,
            identity,
            roles,
            profiles,
            actor_cache,
        }
    }
}

/// Routes of the service, without the per-IP rate limiter.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/sign-in", post(sign_in))
        .route("/api/v1/auth/sign-up", post(sign_up))
        .route("/api/v1/me", get(me))
        .route(
            "/api/v1/operations",
            get(list_operations).post(create_operation),
        )
        .route("/api/v1/operations/stats", get(operation_stats))
        .route("/api/v1/operations/paste", post(parse_paste))
        .route(
            "/api/v1/operations/:id",
            put(update_operation).delete(delete_operation),
        )
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "ccb-ops",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".to_string()))
}

/// Resolves the request actor, reusing a recent resolution for the token.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Actor, AppError> {
    let token = bearer_token(headers)?;

    if let Some(actor) = state.actor_cache.get(token).await {
        return Ok(actor);
    }

    let identity = state.identity.current_user(token).await?;
    let actor = resolve_actor(identity, state.roles.as_ref(), state.profiles.as_ref()).await;
    tracing::debug!(
        "Resolved actor {} (admin: {}, PA: {:?})",
        actor.id,
        actor.is_admin,
        actor.branch_code
    );

    state
        .actor_cache
        .insert(token.to_string(), actor.clone())
        .await;
    Ok(actor)
}

/// POST /api/v1/auth/sign-in
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    payload.validate()?;

    let session = state
        .identity
        .sign_in(payload.email.trim(), &payload.password)
        .await?;

    Ok(Json(json!({
        "message": "Login realizado com sucesso.",
        "session": session,
    })))
}

/// POST /api/v1/auth/sign-up
///
/// Registers the user with the auth service; the branch (PA) travels as
/// profile metadata.
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    payload.validate()?;

    let user = state
        .identity
        .sign_up(
            payload.email.trim(),
            &payload.password,
            payload.full_name.trim(),
            payload.pa.trim(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Cadastro realizado com sucesso.",
            "user": user,
        })),
    ))
}

/// GET /api/v1/me
///
/// The resolved actor and the dashboard tabs offered to them.
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = authenticate(&state, &headers).await?;
    let views = dashboard_views(&actor);
    let default = default_view(&actor).key();

    Ok(Json(json!({
        "actor": actor,
        "views": views,
        "default_view": default,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub view: Option<String>,
}

/// GET /api/v1/operations?view=<tab>
pub async fn list_operations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OperationView>>, AppError> {
    let actor = authenticate(&state, &headers).await?;

    let view = match params.view.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key
            .parse::<ViewSelector>()
            .map_err(AppError::BadRequest)?,
        _ => default_view(&actor),
    };
    tracing::info!("GET /operations - view: {}, actor: {}", view.key(), actor.id);

    let records = state
        .controller
        .list(&actor, view)
        .await
        .map_err(|e| AppError::store(e, "Erro ao carregar operações. Tente novamente."))?;

    Ok(Json(records.into_iter().map(OperationView::from).collect()))
}

/// GET /api/v1/operations/stats
pub async fn operation_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OperationStats>, AppError> {
    let actor = authenticate(&state, &headers).await?;

    let stats = state
        .controller
        .stats(&actor)
        .await
        .map_err(|e| AppError::store(e, "Erro ao carregar estatísticas. Tente novamente."))?;

    Ok(Json(stats))
}

/// POST /api/v1/operations
pub async fn create_operation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<OperationInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let actor = authenticate(&state, &headers).await?;

    let record = state
        .controller
        .create(actor.id, &input)
        .await
        .map_err(|e| AppError::lifecycle(e, "Erro ao cadastrar operação. Tente novamente."))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Operação CCB cadastrada com sucesso.",
            "operation": OperationView::from(record),
        })),
    ))
}

/// PUT /api/v1/operations/:id
pub async fn update_operation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<OperationInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    authenticate(&state, &headers).await?;

    let record = state
        .controller
        .update(id, &input)
        .await
        .map_err(|e| AppError::lifecycle(e, "Erro ao atualizar operação. Tente novamente."))?;

    Ok(Json(json!({
        "message": "Operação CCB atualizada com sucesso.",
        "operation": OperationView::from(record),
    })))
}

/// DELETE /api/v1/operations/:id
pub async fn delete_operation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    authenticate(&state, &headers).await?;

    state
        .controller
        .delete(id)
        .await
        .map_err(|e| AppError::store(e, "Erro ao excluir operação. Tente novamente."))?;

    Ok(Json(json!({
        "message": "Operação CCB excluída com sucesso.",
    })))
}

#[derive(Debug, Deserialize)]
pub struct PasteRequest {
    #[serde(default)]
    pub text: String,
    /// Draft the paste is merged into; an empty form when absent.
    #[serde(default)]
    pub form: Option<OperationInput>,
}

/// POST /api/v1/operations/paste
///
/// Parses spreadsheet cells and returns the draft form with them merged in.
/// Nothing is stored.
pub async fn parse_paste(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<PasteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    authenticate(&state, &headers).await?;

    if payload.text.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Cole os dados do Excel na caixa de texto.".to_string(),
        ));
    }

    let parsed = paste_parser::parse(&payload.text);
    if parsed.is_empty() {
        return Err(AppError::Unprocessable("Formato não reconhecido".to_string()));
    }

    let form = parsed.apply_to(&payload.form.unwrap_or_default());
    Ok(Json(json!({
        "message": format!("{} campos preenchidos automaticamente.", parsed.len()),
        "recognized": parsed.len(),
        "fields": parsed.to_map(),
        "form": form,
    })))
}
