//! User and follow endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::dto::{CreateUserRequest, FollowRequest};
use crate::AppState;
use crate::data::User;
use crate::error::AppError;
use crate::metrics::USERS_TOTAL;

const MAX_USERNAME_CHARS: usize = 50;

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AppError::Validation(format!(
            "username must be at most {MAX_USERNAME_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AppError::Validation(
            "email must be a valid address".to_string(),
        ));
    }
    Ok(())
}

/// POST /v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    validate_username(&req.username)?;
    validate_email(&req.email)?;

    let user = state.db.create_user(&req.username, &req.email).await?;
    USERS_TOTAL.inc();

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, AppError> {
    let user = state.db.get_user(id).await?;

    Ok(Json(user))
}

/// PUT /v1/users/:id/follow
///
/// The acting user (`user_id` in the body) starts following the user in
/// the path. Following an already-followed user is a conflict.
pub async fn follow_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FollowRequest>,
) -> Result<StatusCode, AppError> {
    let followed = state.db.get_user(id).await?;

    if req.user_id == followed.id {
        return Err(AppError::Validation(
            "cannot follow yourself".to_string(),
        ));
    }

    state.db.follow(req.user_id, followed.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/users/:id/unfollow
///
/// Removing a relation that does not exist still succeeds.
pub async fn unfollow_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FollowRequest>,
) -> Result<StatusCode, AppError> {
    let followed = state.db.get_user(id).await?;

    state.db.unfollow(req.user_id, followed.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
