//! JSON API behind the template editor page. Each session wraps one
//! [`TemplateEditor`]; the browser only sends pointer positions and
//! attribute updates.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AdminIdentity;
use crate::coords::{map_pointer, NaturalSize, RenderedRect, ScreenPoint};
use crate::editor::session::SharedEditor;
use crate::editor::{save_editor, BackgroundAsset, EditorState, TemplateEditor};
use crate::error::AppError;
use crate::schema::{Field, FieldId, FieldUpdate};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BackgroundView {
    pub url: String,
    pub pending: bool,
    pub natural: Option<NaturalSize>,
}

#[derive(Debug, Serialize)]
pub struct EditorView {
    pub session: Uuid,
    pub state: EditorState,
    pub template_id: Option<Uuid>,
    pub name: String,
    pub slug: Option<String>,
    pub background: Option<BackgroundView>,
    pub fields: Vec<Field>,
}

fn view(session: Uuid, editor: &TemplateEditor) -> EditorView {
    let background = editor.background().map(|asset| match asset {
        BackgroundAsset::Published { url } => BackgroundView {
            url: url.clone(),
            pending: false,
            natural: None,
        },
        BackgroundAsset::Pending { natural, .. } => BackgroundView {
            url: format!("/admin/api/editor/{}/background", session),
            pending: true,
            natural: Some(*natural),
        },
    });
    EditorView {
        session,
        state: editor.state(),
        template_id: editor.template_id(),
        name: editor.name().to_string(),
        slug: editor.slug().map(str::to_string),
        background,
        fields: editor.fields().to_vec(),
    }
}

async fn session(state: &AppState, id: Uuid) -> Result<SharedEditor, AppError> {
    state
        .editors
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Editor session {} not found", id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenSession {
    #[serde(default)]
    pub template_id: Option<Uuid>,
}

/// Start editing: a blank editor, or one loaded from a saved template.
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Json(body): Json<OpenSession>,
) -> Result<Json<EditorView>, AppError> {
    let editor = match body.template_id {
        Some(id) => {
            let template = state
                .store
                .get_template(id)
                .await?
                .ok_or_else(AppError::template_not_found)?;
            let fields = state.store.list_fields(id).await?;
            TemplateEditor::load(&template, fields)
        }
        None => TemplateEditor::new(),
    };

    let (id, shared) = state.editors.open(editor).await;
    let editor = shared.lock().await;
    Ok(Json(view(id, &editor)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<EditorView>, AppError> {
    let shared = session(&state, id).await?;
    let editor = shared.lock().await;
    Ok(Json(view(id, &editor)))
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.editors.close(id).await {
        return Err(AppError::NotFound(format!("Editor session {} not found", id)));
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct MetaUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
}

pub async fn update_meta(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<Uuid>,
    Json(body): Json<MetaUpdate>,
) -> Result<Json<EditorView>, AppError> {
    let shared = session(&state, id).await?;
    let mut editor = shared.lock().await;
    if let Some(name) = &body.name {
        editor.set_name(name)?;
    }
    if let Some(slug) = &body.slug {
        editor.set_slug(slug)?;
    }
    Ok(Json(view(id, &editor)))
}

/// Accept a background file. It is decoded once to check it and record its
/// natural size; the upload to storage happens on save.
pub async fn upload_background(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<EditorView>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Input(e.to_string()))?
    {
        if field.name() != Some("background") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("background.png").to_string();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Input(e.to_string()))?;
        upload = Some((file_name, content_type, bytes));
    }

    let (file_name, content_type, bytes) = upload
        .filter(|(_, _, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::Input("Please provide a background image".to_string()))?;
    if !content_type.starts_with("image/") {
        return Err(AppError::Input(format!(
            "Background must be an image, got {}",
            content_type
        )));
    }
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| AppError::Input(format!("Could not read the image: {}", e)))?;
    let natural = NaturalSize {
        width: decoded.width() as f64,
        height: decoded.height() as f64,
    };

    let shared = session(&state, id).await?;
    let mut editor = shared.lock().await;
    editor.set_background(BackgroundAsset::Pending {
        file_name,
        content_type,
        bytes: Arc::from(bytes.as_ref()),
        natural,
    })?;
    tracing::debug!(session = %id, width = natural.width, height = natural.height, "Background staged");
    Ok(Json(view(id, &editor)))
}

/// The session's background for the preview.
pub async fn get_background(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let shared = session(&state, id).await?;
    let editor = shared.lock().await;
    match editor.background() {
        Some(BackgroundAsset::Published { url }) => Ok(Redirect::to(url).into_response()),
        Some(BackgroundAsset::Pending {
            content_type,
            bytes,
            ..
        }) => Response::builder()
            .header(CONTENT_TYPE, content_type.as_str())
            .body(Body::from(bytes.to_vec()))
            .map_err(|e| AppError::Render(e.to_string())),
        None => Err(AppError::NotFound("No background chosen yet".to_string())),
    }
}

/// A click on the preview: where it happened and how the image was drawn.
#[derive(Debug, Deserialize)]
pub struct PlaceField {
    pub pointer: ScreenPoint,
    pub rendered: RenderedRect,
    pub natural: NaturalSize,
}

pub async fn add_field(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<Uuid>,
    Json(body): Json<PlaceField>,
) -> Result<Json<EditorView>, AppError> {
    let at = map_pointer(body.pointer, body.rendered, body.natural)?;
    let shared = session(&state, id).await?;
    let mut editor = shared.lock().await;
    editor.add_field_at(at)?;
    Ok(Json(view(id, &editor)))
}

pub async fn update_field(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path((id, field)): Path<(Uuid, FieldId)>,
    Json(updates): Json<Vec<FieldUpdate>>,
) -> Result<Json<EditorView>, AppError> {
    let shared = session(&state, id).await?;
    let mut editor = shared.lock().await;
    editor.update_field(field, updates)?;
    Ok(Json(view(id, &editor)))
}

pub async fn remove_field(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path((id, field)): Path<(Uuid, FieldId)>,
) -> Result<Json<EditorView>, AppError> {
    let shared = session(&state, id).await?;
    let mut editor = shared.lock().await;
    editor.remove_field(field)?;
    Ok(Json(view(id, &editor)))
}

pub async fn save(
    State(state): State<Arc<AppState>>,
    admin: AdminIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = session(&state, id).await?;
    let saved = save_editor(
        &shared,
        &admin.name,
        state.store.as_ref(),
        state.storage.as_ref(),
    )
    .await?;

    let editor = shared.lock().await;
    let body = json!({
        "success": true,
        "public_path": saved.template.public_path(),
        "editor": view(id, &editor),
    });
    // A saved new template is final, so the session has nothing left to do.
    if editor.state() == EditorState::Saved {
        drop(editor);
        state.editors.close(id).await;
    }
    Ok(Json(body))
}
