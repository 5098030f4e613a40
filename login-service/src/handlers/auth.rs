//! HTTP handlers for the four identity operations. Each one validates input,
//! calls the engine, and maps the result to a status code; no decision logic
//! lives here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::auth::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
    UpdatePasswordRequest, VerifyResponse,
};
use crate::models::Credential;
use crate::services::ServiceError;
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let granted = state.auth.authenticate(&req.username, &req.password).await?;

    if !granted {
        return Err(ServiceError::InvalidCredentials.into());
    }

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            message: "Login successful".to_string(),
        }),
    ))
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let credential = Credential::new(req.username, req.password, req.email);

    state.auth.register(&credential).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            username: credential.username,
            message: "Registration successful".to_string(),
        }),
    ))
}

pub async fn verify(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let exists = state.auth.verify(&username).await?;

    Ok((StatusCode::OK, Json(VerifyResponse { username, exists })))
}

pub async fn update_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.update_password(&req.username, &req.new_password).await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password updated".to_string(),
        }),
    ))
}
