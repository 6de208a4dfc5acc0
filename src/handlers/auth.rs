use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde_json::{Value, json};

use crate::{
    AppState,
    error::AppResult,
    middleware::{AuthUser, JsonBody, SESSION_COOKIE},
    models::{AuthResponse, LoginInput, ProfileResponse, RegisterInput},
};

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(input): JsonBody<RegisterInput>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let response = state.auth_service.register(input).await?;
    let jar = jar.add(session_cookie(
        response.token.clone(),
        state.auth_service.secure_cookies(),
    ));

    Ok((StatusCode::CREATED, jar, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(input): JsonBody<LoginInput>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let response = state.auth_service.login(input).await?;
    let jar = jar.add(session_cookie(
        response.token.clone(),
        state.auth_service.secure_cookies(),
    ));

    Ok((jar, Json(response)))
}

pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ProfileResponse>> {
    let user = state.auth_service.get_user(user_id).await?;

    Ok(Json(ProfileResponse::from(&user)))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));

    (jar, Json(json!({ "message": "Logged out successfully" })))
}
