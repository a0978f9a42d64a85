use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use tower_cookies::Cookies;

use crate::{errors::AppError, http_server::AppState, services::session_service::SESSION_COOKIE};

/// Requires a live session cookie and attaches its `SessionUser`.
pub async fn session_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let user = cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.read(cookie.value()))
        .ok_or(AppError::Authentication("not_logged_in"))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::session::{SessionPayload, SessionUser},
        utils::test_app_state::{body_json, create_test_app_state, session_cookie_header, test_user},
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;
    use tower_cookies::CookieManagerLayer;

    async fn protected_handler(Extension(user): Extension<SessionUser>) -> impl IntoResponse {
        user.sub
    }

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/protected", get(protected_handler))
            .layer(from_fn_with_state(state.clone(), session_auth))
            .layer(CookieManagerLayer::new())
            .with_state(state)
    }

    fn request(cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/protected");
        if let Some(value) = cookie {
            builder = builder.header(header::COOKIE, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn live_session_passes_user_through() {
        let state = create_test_app_state();
        let cookie = session_cookie_header(&state, &test_user());

        let response = router(state).oneshot(request(Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), test_user().sub);
    }

    #[tokio::test]
    async fn missing_session_is_not_logged_in() {
        let state = create_test_app_state();

        let response = router(state).oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "not_logged_in");
    }

    #[tokio::test]
    async fn expired_or_forged_session_is_not_logged_in() {
        let state = create_test_app_state();
        let expired = state
            .sessions
            .seal(&SessionPayload {
                exp: chrono::Utc::now().timestamp() - 10,
                user: test_user(),
            })
            .unwrap();

        for value in [format!("session={}", expired), "session=forged.value".to_string()] {
            let response = router(state.clone()).oneshot(request(Some(&value))).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
