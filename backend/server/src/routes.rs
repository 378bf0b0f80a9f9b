use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use store::{
    Board, Equipment, EquipmentHealth, MaintenanceError, MaintenanceRequest, NewEquipment,
    NewRequest, RequestStore, Snapshot, board, status,
};

use crate::{error::AppError, state::AppState};

#[derive(Serialize, Deserialize)]
pub struct BoardResponse {
    pub board: Board,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    /// Last version the caller saw; omit for last-write-wins.
    pub version: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub subject: String,
    pub description: Option<String>,
    pub request_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub equipment_id: Option<i64>,
    pub scheduled_date: Option<NaiveDate>,
    pub duration_hours: Option<f64>,
}

impl TryFrom<CreateRequest> for NewRequest {
    type Error = AppError;

    fn try_from(payload: CreateRequest) -> Result<Self, Self::Error> {
        let subject = payload.subject.trim();
        if subject.is_empty() {
            return Err(AppError::MalformedPayload("subject is required".to_string()));
        }

        let mut request = NewRequest::new(subject);
        request.description = payload.description;
        request.equipment_id = payload.equipment_id;
        request.scheduled_date = payload.scheduled_date;
        request.duration_hours = payload.duration_hours;

        if let Some(raw) = payload.request_type {
            request.request_type = raw.parse()?;
        }
        if let Some(raw) = payload.status {
            request.status = raw.parse()?;
        }
        if let Some(raw) = payload.priority {
            request.priority = Some(raw.parse()?);
        }

        Ok(request)
    }
}

#[derive(Deserialize)]
pub struct CreateEquipment {
    pub name: String,
    pub location: Option<String>,
    pub health_score: Option<f64>,
    pub is_functional: Option<bool>,
}

impl TryFrom<CreateEquipment> for NewEquipment {
    type Error = AppError;

    fn try_from(payload: CreateEquipment) -> Result<Self, Self::Error> {
        let name = payload.name.trim();
        if name.is_empty() {
            return Err(AppError::MalformedPayload("name is required".to_string()));
        }

        let health_score = payload.health_score.unwrap_or(100.0);
        if !(0.0..=100.0).contains(&health_score) {
            return Err(AppError::MalformedPayload(
                "health_score must be between 0 and 100".to_string(),
            ));
        }

        Ok(NewEquipment {
            name: name.to_string(),
            location: payload.location,
            health_score,
            is_functional: payload.is_functional.unwrap_or(true),
        })
    }
}

pub async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": "GearGuard backend is live" }))
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

pub async fn kanban_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BoardResponse>, AppError> {
    let board = board::board(state.store.as_ref()).await?;

    Ok(Json(BoardResponse { board }))
}

pub async fn live_handler(State(state): State<Arc<AppState>>) -> Result<Json<Snapshot>, AppError> {
    Ok(Json(board::snapshot(state.store.as_ref()).await?))
}

/// Full request, including the `version` a client passes back on status updates.
pub async fn get_request_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MaintenanceRequest>, AppError> {
    let Path(request_id) = path?;

    let request = state
        .store
        .get_request(request_id)
        .await?
        .ok_or(MaintenanceError::NotFound(request_id))?;

    Ok(Json(request))
}

pub async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(request_id) = path?;
    let Json(payload) = payload?;

    status::update_status(
        state.store.as_ref(),
        request_id,
        &payload.status,
        payload.version,
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn create_request_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let request = NewRequest::try_from(payload)?;

    let id = state.store.insert_request(&request).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn equipment_health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EquipmentHealth>>, AppError> {
    Ok(Json(state.store.equipment_health().await?))
}

pub async fn list_equipment_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Equipment>>, AppError> {
    Ok(Json(state.store.list_equipment().await?))
}

pub async fn get_equipment_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Equipment>, AppError> {
    let Path(equipment_id) = path?;

    let equipment = state
        .store
        .get_equipment(equipment_id)
        .await?
        .ok_or(MaintenanceError::EquipmentNotFound(equipment_id))?;

    Ok(Json(equipment))
}

pub async fn create_equipment_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateEquipment>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let equipment = NewEquipment::try_from(payload)?;

    let id = state.store.insert_equipment(&equipment).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}
