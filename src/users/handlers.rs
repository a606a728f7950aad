use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use super::dto::UserDto;
use crate::{
    auth::extractors::{AdminUser, AuthUser, MaybeAuthUser},
    error::{ApiError, ApiResult},
    response::{ApiResponse, PageData},
    state::AppState,
    store::{Page, StoreError},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list_users).delete(delete_self))
        .route("/user/:uid", get(get_user))
        .route("/user/admin/:uid", delete(delete_by_admin))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[instrument(skip_all, fields(admin = admin.uid))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<PageData<UserDto>>> {
    let Query(query) = query.map_err(|e| {
        warn!(reason = %e.body_text(), "bad page query");
        ApiError::RequestParam
    })?;
    let page = Page::new(query.page.unwrap_or(1), state.config.page_size);

    let (users, count) = state.store.list_users(page).await?;
    let prefix = &state.config.image_url_prefix;
    Ok(ApiResponse::ok(PageData {
        count,
        page: page.number,
        data: users
            .iter()
            .map(|u| UserDto::from_user(u, prefix, true))
            .collect(),
    }))
}

#[instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    uid: Result<Path<i64>, PathRejection>,
) -> ApiResult<ApiResponse<UserDto>> {
    let Path(uid) = uid.map_err(|e| {
        warn!(reason = %e.body_text(), "bad uid");
        ApiError::RequestParam
    })?;

    let user = state
        .store
        .find_user_by_id(uid)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let show_private = viewer
        .as_ref()
        .map(|v| v.uid == user.uid || v.is_admin())
        .unwrap_or(false);
    Ok(ApiResponse::ok(UserDto::from_user(
        &user,
        &state.config.image_url_prefix,
        show_private,
    )))
}

async fn remove_user(state: &AppState, uid: i64) -> ApiResult<ApiResponse<()>> {
    match state.store.delete_user(uid).await {
        Ok(()) => {
            info!(uid, "user deleted");
            Ok(ApiResponse::success())
        }
        Err(StoreError::NotFound) => Err(ApiError::UserNotFound),
        Err(e) => {
            error!(error = %e, uid, "delete_user failed");
            Err(ApiError::DeleteFailed(e.into()))
        }
    }
}

#[instrument(skip_all, fields(uid = user.uid))]
pub async fn delete_self(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<ApiResponse<()>> {
    remove_user(&state, user.uid).await
}

#[instrument(skip_all, fields(admin = admin.uid))]
pub async fn delete_by_admin(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    uid: Result<Path<i64>, PathRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Path(uid) = uid.map_err(|e| {
        warn!(reason = %e.body_text(), "bad uid");
        ApiError::RequestParam
    })?;
    remove_user(&state, uid).await
}
