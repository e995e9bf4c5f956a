// src/handlers/posts.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::post::{CreatePostRequest, PostListParams, UpdatePostRequest},
    repo::posts::PostRepository,
};

/// List posts with optional filters and pagination.
pub async fn list_posts(
    State(repo): State<PostRepository>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = repo.list(&params).await?;
    Ok(Json(page))
}

/// Fetch a single post by id or slug.
/// Reading a published post bumps its view counter.
pub async fn get_post(
    State(repo): State<PostRepository>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = repo.get(&identifier).await?;
    Ok(Json(post))
}

/// Create a new post.
pub async fn create_post(
    State(repo): State<PostRepository>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let post = repo.create(payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// Apply a merge-patch to an existing post.
pub async fn update_post(
    State(repo): State<PostRepository>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let post = repo.update(&id, payload).await?;
    Ok(Json(post))
}

/// Hard-delete a post.
pub async fn delete_post(
    State(repo): State<PostRepository>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    repo.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Distinct categories across all posts.
pub async fn list_categories(
    State(repo): State<PostRepository>,
) -> Result<impl IntoResponse, AppError> {
    let categories = repo.categories().await?;
    Ok(Json(categories))
}

/// Aggregate post counters.
pub async fn get_stats(State(repo): State<PostRepository>) -> Result<impl IntoResponse, AppError> {
    let stats = repo.stats().await?;
    Ok(Json(stats))
}
