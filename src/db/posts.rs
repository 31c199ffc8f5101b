use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::post::Post;

/// Posts returned per page of `list_posts`.
pub const PAGE_SIZE: i64 = 2;

fn row_to_post(row: sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        post_content: row.get("post_content"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

const SELECT_POSTS: &str = "SELECT id, post_content, user_id, created_at FROM posts";

pub async fn get_post(pool: &SqlitePool, post_id: &str) -> Result<Post, AppError> {
    let row = sqlx::query(&format!("{SELECT_POSTS} WHERE id = ?"))
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_post".to_string()))?;

    Ok(row_to_post(row))
}

pub async fn insert_post(
    pool: &SqlitePool,
    user_id: &str,
    post_content: &str,
) -> Result<Post, AppError> {
    let id = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO posts (id, post_content, user_id) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(post_content)
        .bind(user_id)
        .execute(pool)
        .await?;

    get_post(pool, &id).await
}

/// Update a post owned by `user_id`. Returns `None` when no row matched.
pub async fn update_post(
    pool: &SqlitePool,
    post_id: &str,
    user_id: &str,
    post_content: &str,
) -> Result<Option<Post>, AppError> {
    let result = sqlx::query("UPDATE posts SET post_content = ? WHERE id = ? AND user_id = ?")
        .bind(post_content)
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_post(pool, post_id).await.map(Some)
}

/// Delete a post owned by `user_id`. Returns whether a row was removed.
pub async fn delete_post(pool: &SqlitePool, post_id: &str, user_id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ? AND user_id = ?")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Newest first, `PAGE_SIZE` per page, pages counted from zero.
pub async fn list_posts(pool: &SqlitePool, page: u64) -> Result<Vec<Post>, AppError> {
    let offset = i64::try_from(page)
        .ok()
        .and_then(|p| p.checked_mul(PAGE_SIZE))
        .ok_or_else(|| AppError::BadRequest("page out of range".to_string()))?;

    let rows = sqlx::query(&format!(
        "{SELECT_POSTS} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
    ))
    .bind(PAGE_SIZE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_post).collect())
}
