use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use meritx_core::{MeritxError, UserId};

use crate::error::ApiError;
use crate::routes::AppState;

pub const AUTH_COOKIE: &str = "access_token";

// Cookie lifetime is fixed at 24 h regardless of the token TTL flag.
const COOKIE_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Build the `Set-Cookie` value delivering a freshly minted token.
pub fn auth_cookie(token: &str) -> String {
    format!("{AUTH_COOKIE}={token}; Path=/; Max-Age={COOKIE_MAX_AGE_SECS}; HttpOnly; SameSite=Lax")
}

/// The authenticated user id, inserted into request extensions by
/// [`require_user`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

/// Middleware guarding every route except `register` and `login`: resolves
/// the `access_token` cookie to a user id or answers 401.
pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = token_from_headers(req.headers()) else {
        return ApiError(MeritxError::Unauthorized).into_response();
    };
    match state.tokens.verify(&token) {
        Ok(user_id) => {
            req.extensions_mut().insert(CurrentUser(user_id));
            next.run(req).await
        }
        Err(_) => ApiError(MeritxError::Unauthorized).into_response(),
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == AUTH_COOKIE).then(|| value.to_string())
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_value_carries_the_required_attributes() {
        let cookie = auth_cookie("abc.def.ghi");
        assert!(cookie.starts_with("access_token=abc.def.ghi;"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));
    }

    #[test]
    fn token_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=tok123; lang=en"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn missing_or_misnamed_cookie_yields_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("refresh_token=tok123"),
        );
        assert_eq!(token_from_headers(&headers), None);
    }
}
