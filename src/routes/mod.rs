pub mod api;
pub mod editor;
pub mod pages;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use std::sync::Arc;
use tera::Context;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::UPLOADS_PREFIX;
use crate::error::AppError;
use crate::schema::{Template, TemplateLookup};
use crate::state::AppState;

/// Background uploads are the largest bodies the service accepts.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let uploads = ServeDir::new(&state.config.upload_folder);

    Router::new()
        // Public
        .route("/", get(pages::index))
        .route("/view", get(pages::view))
        .route("/api/forms/:lookup/validate", post(api::validate_form))
        .route("/api/certificates/:lookup", post(api::generate_certificate))
        // Admin pages
        .route("/admin/login", get(pages::login_page).post(pages::login))
        .route("/admin/logout", post(pages::logout))
        .route("/admin", get(pages::dashboard))
        .route("/admin/editor", get(pages::editor_page))
        .route("/admin/responses", get(pages::responses_page))
        .route("/admin/responses/:id/export", get(api::export_responses))
        // Admin API
        .route("/admin/api/templates", get(api::list_templates))
        .route("/admin/api/templates/:id", delete(api::delete_template))
        .route("/admin/api/editor", post(editor::open_session))
        .route(
            "/admin/api/editor/:session",
            get(editor::get_session).delete(editor::close_session),
        )
        .route("/admin/api/editor/:session/meta", put(editor::update_meta))
        .route(
            "/admin/api/editor/:session/background",
            get(editor::get_background).put(editor::upload_background),
        )
        .route("/admin/api/editor/:session/fields", post(editor::add_field))
        .route(
            "/admin/api/editor/:session/fields/:field",
            patch(editor::update_field).delete(editor::remove_field),
        )
        .route("/admin/api/editor/:session/save", post(editor::save))
        .nest_service(UPLOADS_PREFIX, uploads)
        .nest_service("/static", ServeDir::new(static_dir()))
        .fallback(pages::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn static_dir() -> std::path::PathBuf {
    let bundled = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("static");
    if bundled.exists() {
        bundled
    } else {
        std::path::PathBuf::from("static")
    }
}

/// Find a template by UUID or alias.
pub(crate) async fn resolve_template(state: &AppState, raw: &str) -> Result<Template, AppError> {
    let lookup = TemplateLookup::parse(raw)
        .ok_or_else(|| AppError::Input("Missing template id or alias".to_string()))?;
    let found = match lookup {
        TemplateLookup::Id(id) => state.store.get_template(id).await?,
        TemplateLookup::Slug(slug) => state.store.find_template_by_slug(&slug).await?,
    };
    found.ok_or_else(AppError::template_not_found)
}

pub(crate) fn render_template(name: &str, ctx: &Context) -> Response {
    render_with_status(StatusCode::OK, name, ctx)
}

pub(crate) fn render_with_status(status: StatusCode, name: &str, ctx: &Context) -> Response {
    let tera = crate::templates::get_tera();
    match tera.render(name, ctx) {
        Ok(rendered) => (status, Html(rendered)).into_response(),
        Err(e) => {
            tracing::error!("Template error in {}: {:?}", name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Template error: {}", name)),
            )
                .into_response()
        }
    }
}
