use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::resolve_template;
use crate::auth::AdminIdentity;
use crate::error::AppError;
use crate::export::{responses_workbook, XLSX_CONTENT_TYPE};
use crate::form::validate_submission;
use crate::layout::lay_out;
use crate::pdf::render_certificate;
use crate::state::AppState;

fn attachment(content_type: &str, file_name: &str, bytes: Vec<u8>) -> Result<Response, AppError> {
    Response::builder()
        .header(CONTENT_TYPE, content_type)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::Render(e.to_string()))
}

/// Check a submission without recording anything.
pub async fn validate_form(
    State(state): State<Arc<AppState>>,
    Path(lookup): Path<String>,
    Json(raw): Json<IndexMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let template = resolve_template(&state, &lookup).await?;
    let fields = state.store.list_fields(template.id).await?;
    let values = validate_submission(&fields, &raw)?;
    Ok(Json(json!({ "success": true, "values": values })))
}

/// Validate, record the submission, then return the rendered certificate.
pub async fn generate_certificate(
    State(state): State<Arc<AppState>>,
    Path(lookup): Path<String>,
    Json(raw): Json<IndexMap<String, String>>,
) -> Result<Response, AppError> {
    let template = resolve_template(&state, &lookup).await?;
    let fields = state.store.list_fields(template.id).await?;
    let values = validate_submission(&fields, &raw)?;

    let submission = state.store.insert_submission(template.id, values).await?;
    tracing::info!(
        template = %template.id,
        submission = %submission.id,
        "Certificate submission recorded"
    );

    let background = state.storage.fetch(&template.background_url).await?;
    let layout = lay_out(&template.background_url, &fields, &submission.values);
    let font_dir = state.config.font_dir.clone();

    let pdf = tokio::task::spawn_blocking(move || {
        render_certificate(&layout, Some(background.as_slice()), font_dir.as_deref())
    })
    .await
    .map_err(|e| AppError::Render(format!("Rendering task failed: {}", e)))??;

    attachment(
        "application/pdf",
        &template.download_name("Certificate.pdf"),
        pdf,
    )
}

#[derive(Serialize)]
pub struct TemplateSummary {
    id: Uuid,
    name: String,
    slug: Option<String>,
    background_url: String,
    created_by: String,
    created_at: String,
    public_path: String,
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<Vec<TemplateSummary>>, AppError> {
    let templates = state.store.list_templates().await?;
    Ok(Json(
        templates
            .into_iter()
            .map(|t| TemplateSummary {
                public_path: t.public_path(),
                created_at: t.created_at.to_rfc3339(),
                id: t.id,
                name: t.name,
                slug: t.slug,
                background_url: t.background_url,
                created_by: t.created_by,
            })
            .collect(),
    ))
}

pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    admin: AdminIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.delete_template(id).await? {
        return Err(AppError::template_not_found());
    }
    tracing::info!(template = %id, admin = %admin.name, "Template deleted");
    Ok(Json(json!({ "success": true })))
}

pub async fn export_responses(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let template = state
        .store
        .get_template(id)
        .await?
        .ok_or_else(AppError::template_not_found)?;
    let labels: Vec<String> = state
        .store
        .list_fields(id)
        .await?
        .into_iter()
        .map(|f| f.label)
        .collect();
    let submissions = state.store.list_submissions(id).await?;

    let workbook = responses_workbook(&labels, &submissions)?;
    attachment(
        XLSX_CONTENT_TYPE,
        &template.download_name("Responses.xlsx"),
        workbook,
    )
}
