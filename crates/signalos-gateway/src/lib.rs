use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::{get, post},
};
use chrono::Utc;
use signalos_core::{
    CommitmentStore, CommitmentView, NewReminder, Notifier, Reminder, ReminderStore,
};
use signalos_platform::{
    CloseCommitmentRequest, CommitmentQuery, CreateReminderRequest, HealthResponse,
    OpenCommitmentRequest, UpdateCommitmentRequest,
};
use signalos_services::{CommitmentService, DispatchReport, ReminderService, ReminderSettings};
use uuid::Uuid;

pub mod auth;
pub mod error;
pub mod extract;

pub use error::ApiError;
pub use extract::ApiJson;

#[derive(Clone)]
pub struct AppState {
    pub commitments: CommitmentService,
    pub reminders: ReminderService,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        commitments: Arc<dyn CommitmentStore>,
        reminders: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        settings: ReminderSettings,
        api_key: &str,
    ) -> Self {
        Self {
            commitments: CommitmentService::new(commitments.clone()),
            reminders: ReminderService::new(commitments, reminders, notifier, settings),
            api_key: Arc::from(api_key),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/commitments/open", get(list_open).post(open_commitment))
        .route("/commitments/close", post(close_commitment))
        .route("/commitments/update", post(update_commitment))
        .route("/commitments/query", get(query_commitments))
        .route("/commitments/{id}", get(get_commitment))
        .route("/commitments/{id}/reminders", get(list_commitment_reminders))
        .route("/reminders/create", post(create_reminder))
        .route("/reminders/due", get(list_due))
        .route("/reminders/dispatch_due", post(dispatch_due))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn open_commitment(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<OpenCommitmentRequest>,
) -> Result<Json<CommitmentView>, ApiError> {
    Ok(Json(state.commitments.open(request, Utc::now()).await?))
}

async fn close_commitment(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CloseCommitmentRequest>,
) -> Result<Json<CommitmentView>, ApiError> {
    Ok(Json(state.commitments.close(request.into(), Utc::now()).await?))
}

async fn update_commitment(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UpdateCommitmentRequest>,
) -> Result<Json<CommitmentView>, ApiError> {
    let view = state
        .commitments
        .update(request.commitment_id, request.patch, Utc::now())
        .await?;
    Ok(Json(view))
}

async fn list_open(State(state): State<AppState>) -> Result<Json<Vec<CommitmentView>>, ApiError> {
    Ok(Json(state.commitments.list_open(Utc::now()).await?))
}

async fn query_commitments(
    State(state): State<AppState>,
    Query(query): Query<CommitmentQuery>,
) -> Result<Json<Vec<CommitmentView>>, ApiError> {
    let filter = query.into_filter()?;
    Ok(Json(state.commitments.query(filter, Utc::now()).await?))
}

async fn get_commitment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommitmentView>, ApiError> {
    Ok(Json(state.commitments.get(id, Utc::now()).await?))
}

async fn list_commitment_reminders(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    Ok(Json(state.reminders.list_for_commitment(id).await?))
}

async fn create_reminder(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateReminderRequest>,
) -> Result<Json<Reminder>, ApiError> {
    let request = NewReminder::try_from(request)?;
    Ok(Json(state.reminders.create(request).await?))
}

async fn list_due(State(state): State<AppState>) -> Result<Json<Vec<Reminder>>, ApiError> {
    Ok(Json(state.reminders.list_due(Utc::now()).await?))
}

async fn dispatch_due(State(state): State<AppState>) -> Result<Json<DispatchReport>, ApiError> {
    Ok(Json(state.reminders.dispatch_due(Utc::now()).await?))
}
