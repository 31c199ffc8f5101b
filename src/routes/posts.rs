use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::AppError;
use crate::hub::{EventKind, Hub, WebSocketMessage};
use crate::middleware::auth::AuthUser;
use crate::models::post::{Post, PostCreated, PostRef, UpsertPost};
use crate::models::MessageResponse;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<String>,
}

/// Publish an event for a mutation that has already been committed. Failure
/// to publish is logged and never fails the request.
async fn publish<T: Serialize>(hub: &Hub, kind: EventKind, payload: &T) {
    let result = match WebSocketMessage::new(kind, payload) {
        Ok(message) => hub.broadcast(&message, None).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(kind = kind.as_str(), "failed to publish event: {e}");
    }
}

pub async fn insert_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpsertPost>,
) -> Result<Json<PostCreated>, AppError> {
    let post = db::posts::insert_post(&state.db, &auth.user_id, &input.post_content).await?;

    publish(&state.hub, EventKind::PostCreated, &post).await;

    Ok(Json(PostCreated {
        id: post.id,
        post_content: post.post_content,
    }))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, AppError> {
    let post = db::posts::get_post(&state.db, &post_id).await?;
    Ok(Json(post))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    auth: AuthUser,
    Json(input): Json<UpsertPost>,
) -> Result<Json<MessageResponse>, AppError> {
    let post = db::posts::update_post(&state.db, &post_id, &auth.user_id, &input.post_content)
        .await?
        .ok_or_else(|| ownership_error(&post_id))?;

    publish(&state.hub, EventKind::PostUpdated, &post).await;

    Ok(Json(MessageResponse::new("Post Updated")))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    if !db::posts::delete_post(&state.db, &post_id, &auth.user_id).await? {
        return Err(ownership_error(&post_id));
    }

    publish(&state.hub, EventKind::PostDeleted, &PostRef { id: post_id }).await;

    Ok(Json(MessageResponse::new("Post Deleted")))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListPostsQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    let page = match params.page.as_deref() {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| AppError::BadRequest(format!("invalid page: {e}")))?,
    };

    let posts = db::posts::list_posts(&state.db, page).await?;
    Ok(Json(posts))
}

/// A scoped update or delete touched nothing: either the post is gone or it
/// belongs to someone else.
fn ownership_error(post_id: &str) -> AppError {
    tracing::debug!(post_id, "post missing or not owned by caller");
    AppError::NotFound("unknown_post".to_string())
}
