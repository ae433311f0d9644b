//! Admin gate: a bearer token or the `admin_token` cookie set at login.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "admin_token";
pub const LOGIN_PATH: &str = "/admin/login";

/// The signed-in administrator. Stamped on templates as `created_by`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub name: String,
}

/// Refused admin request: API calls get a 401, pages go to the login form.
#[derive(Debug)]
pub enum AdminRejection {
    Api,
    Page,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match self {
            AdminRejection::Api => AppError::Unauthorized.into_response(),
            AdminRejection::Page => Redirect::to(LOGIN_PATH).into_response(),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

pub fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == TOKEN_COOKIE).then_some(value)
        })
}

/// Compare without bailing out at the first differing byte.
pub fn token_matches(expected: &str, given: &str) -> bool {
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Resolve the caller's identity. With no configured token nobody is admin.
pub fn identify(headers: &HeaderMap, expected: Option<&str>) -> Option<AdminIdentity> {
    let expected = expected?;
    let given = bearer_token(headers).or_else(|| cookie_token(headers))?;
    token_matches(expected, given).then(|| AdminIdentity {
        name: "admin".to_string(),
    })
}

pub fn login_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/admin; HttpOnly; SameSite=Lax",
        TOKEN_COOKIE, token
    )
}

pub fn logout_cookie() -> String {
    format!("{}=; Path=/admin; HttpOnly; SameSite=Lax; Max-Age=0", TOKEN_COOKIE)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminIdentity {
    type Rejection = AdminRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match identify(&parts.headers, state.config.admin_token.as_deref()) {
            Some(identity) => Ok(identity),
            None => {
                tracing::debug!(path = %parts.uri.path(), "Admin access denied");
                if parts.uri.path().starts_with("/admin/api") {
                    Err(AdminRejection::Api)
                } else {
                    Err(AdminRejection::Page)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(axum::http::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_bearer_and_cookie() {
        let bearer = headers(&[(AUTHORIZATION, "Bearer s3cret")]);
        assert!(identify(&bearer, Some("s3cret")).is_some());

        let cookie = headers(&[(COOKIE, "theme=dark; admin_token=s3cret")]);
        assert!(identify(&cookie, Some("s3cret")).is_some());

        let wrong = headers(&[(AUTHORIZATION, "Bearer nope")]);
        assert!(identify(&wrong, Some("s3cret")).is_none());
    }

    #[test]
    fn test_no_configured_token_denies_everyone() {
        let bearer = headers(&[(AUTHORIZATION, "Bearer anything")]);
        assert!(identify(&bearer, None).is_none());
        assert!(identify(&HeaderMap::new(), Some("s3cret")).is_none());
    }

    #[test]
    fn test_token_compare() {
        assert!(token_matches("abc", "abc"));
        assert!(!token_matches("abc", "abd"));
        assert!(!token_matches("abc", "abcd"));
    }
}
