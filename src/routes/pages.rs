use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tera::Context;
use uuid::Uuid;

use super::{render_template, render_with_status, resolve_template};
use crate::auth::{self, AdminIdentity};
use crate::error::AppError;
use crate::export::response_rows;
use crate::form;
use crate::state::AppState;

pub async fn index() -> Response {
    render_template("index.html", &Context::new())
}

#[derive(Deserialize)]
pub struct ViewQuery {
    id: Option<String>,
    slug: Option<String>,
}

/// Public certificate form.
pub async fn view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let raw = query.id.or(query.slug).unwrap_or_default();
    let template = match resolve_template(&state, &raw).await {
        Ok(t) => t,
        Err(e) => return not_found_page(&e),
    };
    let fields = match state.store.list_fields(template.id).await {
        Ok(f) => f,
        Err(e) => return not_found_page(&AppError::from(e)),
    };

    let mut ctx = Context::new();
    ctx.insert("template", &template);
    ctx.insert("controls", &form::controls(&fields));
    ctx.insert("submit_url", &format!("/api/certificates/{}", template.id));
    ctx.insert("validate_url", &format!("/api/forms/{}/validate", template.id));
    render_template("view.html", &ctx)
}

fn not_found_page(err: &AppError) -> Response {
    let status = match err {
        AppError::Input(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
        other => other.status(),
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "Could not load template page");
    }
    let mut ctx = Context::new();
    ctx.insert("message", &err.to_string());
    render_with_status(status, "not_found.html", &ctx)
}

pub async fn not_found() -> Response {
    not_found_page(&AppError::NotFound(
        "The page you are looking for does not exist.".to_string(),
    ))
}

pub async fn login_page(State(state): State<Arc<AppState>>) -> Response {
    let mut ctx = Context::new();
    ctx.insert("configured", &state.config.admin_token.is_some());
    ctx.insert("error", &Option::<String>::None);
    render_template("login.html", &ctx)
}

#[derive(Deserialize)]
pub struct LoginForm {
    token: String,
}

pub async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    let expected = state.config.admin_token.as_deref();
    let accepted = expected.is_some_and(|expected| auth::token_matches(expected, form.token.trim()));

    if accepted {
        tracing::info!("Admin signed in");
        let mut headers = HeaderMap::new();
        if let Ok(cookie) = auth::login_cookie(form.token.trim()).parse() {
            headers.insert(SET_COOKIE, cookie);
        }
        return (headers, Redirect::to("/admin")).into_response();
    }

    tracing::warn!("Rejected admin sign-in");
    let mut ctx = Context::new();
    ctx.insert("configured", &expected.is_some());
    ctx.insert("error", &Some("Invalid admin token"));
    render_with_status(StatusCode::UNAUTHORIZED, "login.html", &ctx)
}

pub async fn logout() -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = auth::logout_cookie().parse() {
        headers.insert(SET_COOKIE, cookie);
    }
    (headers, Redirect::to("/")).into_response()
}

pub async fn dashboard(State(state): State<Arc<AppState>>, admin: AdminIdentity) -> Response {
    let templates = match state.store.list_templates().await {
        Ok(t) => t,
        Err(e) => return AppError::from(e).into_response(),
    };

    let rows: Vec<_> = templates
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "slug": t.slug,
                "background_url": t.background_url,
                "created_at": t.created_at.format("%Y-%m-%d").to_string(),
                "public_path": t.public_path(),
            })
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("admin", &admin.name);
    ctx.insert("templates", &rows);
    render_template("dashboard.html", &ctx)
}

#[derive(Deserialize)]
pub struct EditorQuery {
    id: Option<Uuid>,
}

pub async fn editor_page(_admin: AdminIdentity, Query(query): Query<EditorQuery>) -> Response {
    let mut ctx = Context::new();
    ctx.insert("template_id", &query.id);
    render_template("editor.html", &ctx)
}

#[derive(Deserialize)]
pub struct ResponsesQuery {
    id: Option<Uuid>,
}

pub async fn responses_page(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Query(query): Query<ResponsesQuery>,
) -> Response {
    let Some(id) = query.id else {
        return Redirect::to("/admin").into_response();
    };
    let template = match state.store.get_template(id).await {
        Ok(Some(t)) => t,
        Ok(None) => return not_found_page(&AppError::template_not_found()),
        Err(e) => return AppError::from(e).into_response(),
    };
    let loaded = async {
        let fields = state.store.list_fields(id).await?;
        let submissions = state.store.list_submissions(id).await?;
        Ok::<_, crate::db::StoreError>((fields, submissions))
    }
    .await;
    let (fields, submissions) = match loaded {
        Ok(pair) => pair,
        Err(e) => return AppError::from(e).into_response(),
    };

    let labels: Vec<String> = fields.into_iter().map(|f| f.label).collect();
    let mut rows = response_rows(&labels, &submissions);
    let header = rows.remove(0);

    let mut ctx = Context::new();
    ctx.insert("template", &template);
    ctx.insert("header", &header);
    ctx.insert("rows", &rows);
    ctx.insert("export_url", &format!("/admin/responses/{}/export", id));
    render_template("responses.html", &ctx)
}
