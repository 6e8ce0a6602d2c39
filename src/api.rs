//! HTTP/JSON surface consumed by the admin UI.
//!
//! Every response carries `success`. Failures render as
//! `{success: false, message, error_code}` plus the offending size/color when
//! the error names one.

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;

use crate::domain::events::VariantEvent;
use crate::domain::value_objects::Sku;
use crate::engine::{MigrationRequest, VariantEngine};
use crate::VariantError;

#[derive(Clone)]
pub struct AppState { pub engine: VariantEngine, pub nats: Option<async_nats::Client> }

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "variant-engine"})) }))
        .route("/api/v1/variants/analyze_current_structure", get(analyze_current_structure))
        .route("/api/v1/variants/propose_new_structure", get(propose_new_structure))
        .route("/api/v1/variants/check_if_backwards", get(check_if_backwards))
        .route("/api/v1/variants/get_restructured_view", get(get_restructured_view))
        .route("/api/v1/variants/migrate_to_new_structure", post(migrate_to_new_structure))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

impl IntoResponse for VariantError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) | Self::EmptyStructure { .. } | Self::DuplicateCombination { .. } | Self::InvalidStock { .. } => StatusCode::BAD_REQUEST,
            Self::ConcurrentModification => StatusCode::CONFLICT,
            Self::PersistenceFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut body = json!({"success": false, "message": self.to_string(), "error_code": self.error_code(), "retryable": self.is_retryable()});
        let (size_code, color_name) = self.offending_pair();
        if let Some(size_code) = size_code { body["size_code"] = json!(size_code); }
        if let Some(color_name) = color_name { body["color_name"] = json!(color_name); }
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SkuQuery {
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub item_sku: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MigrateBody {
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub item_sku: String,
    #[serde(flatten)]
    pub request: MigrationRequest,
}

fn parse_sku(raw: &str) -> Result<Sku, VariantError> {
    Sku::new(raw).map_err(|e| VariantError::InvalidRequest(e.to_string()))
}

fn sku_from_query(query: Result<Query<SkuQuery>, QueryRejection>) -> Result<Sku, VariantError> {
    let Query(query) = query.map_err(|e| VariantError::InvalidRequest(e.body_text()))?;
    query.validate().map_err(|_| VariantError::InvalidRequest("Item SKU is required".to_string()))?;
    parse_sku(&query.item_sku)
}

async fn analyze_current_structure(State(s): State<AppState>, query: Result<Query<SkuQuery>, QueryRejection>) -> Result<Json<Value>, VariantError> {
    let sku = sku_from_query(query)?;
    let analysis = s.engine.analyze(&sku).await?;
    Ok(Json(json!({"success": true, "analysis": analysis})))
}

async fn propose_new_structure(State(s): State<AppState>, query: Result<Query<SkuQuery>, QueryRejection>) -> Result<Json<Value>, VariantError> {
    let sku = sku_from_query(query)?;
    let proposal = s.engine.propose(&sku).await?;
    let mut body = json!(proposal);
    body["success"] = json!(true);
    body["structure"] = json!("sizes_with_colors");
    Ok(Json(body))
}

async fn check_if_backwards(State(s): State<AppState>, query: Result<Query<SkuQuery>, QueryRejection>) -> Result<Json<Value>, VariantError> {
    let sku = sku_from_query(query)?;
    let is_backwards = s.engine.check_if_backwards(&sku).await?;
    Ok(Json(json!({"success": true, "is_backwards": is_backwards})))
}

async fn get_restructured_view(State(s): State<AppState>, query: Result<Query<SkuQuery>, QueryRejection>) -> Result<Json<Value>, VariantError> {
    let sku = sku_from_query(query)?;
    let view = s.engine.restructured_view(&sku).await?;
    Ok(Json(json!({
        "success": true, "item_sku": view.item_sku, "structure": view.structure, "total_combinations": view.total_combinations
    })))
}

async fn migrate_to_new_structure(State(s): State<AppState>, body: Result<Json<MigrateBody>, JsonRejection>) -> Result<Json<Value>, VariantError> {
    let Json(body) = body.map_err(|e| VariantError::InvalidRequest(e.body_text()))?;
    body.validate().map_err(|_| VariantError::InvalidRequest("Item SKU is required".to_string()))?;
    let sku = parse_sku(&body.item_sku)?;
    let result = s.engine.migrate(&sku, &body.request).await?;

    if !result.dry_run {
        if let Some(nats) = &s.nats {
            publish(nats, &VariantEvent::migrated(sku.clone(), result.created_combinations, result.new_total_stock)).await;
        }
    }

    let message = if result.dry_run { "Dry run completed (no changes committed)" } else { "Item structure migrated successfully" };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "dry_run": result.dry_run,
        "structure_created": format!("{} sizes with {} combinations", result.created_sizes, result.created_combinations),
        "created_combinations": result.created_combinations,
        "previous_total_stock": result.previous_total_stock,
        "new_total_stock": result.new_total_stock,
        "errors": result.errors
    })))
}

/// Best effort: a failed publish is logged and never fails the request.
async fn publish(nats: &async_nats::Client, event: &VariantEvent) {
    let payload = match serde_json::to_vec(event) {
        Ok(payload) => payload,
        Err(e) => { tracing::error!(error = %e, "failed to encode event"); return; }
    };
    if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
        tracing::warn!(error = %e, subject = event.subject(), "failed to publish event");
    }
}
