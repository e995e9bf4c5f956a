// src/models/post.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use url::Url;
use validator::Validate;

/// Publication state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    /// UUID, generated at creation. Immutable.
    pub id: String,

    pub title: String,

    /// URL-friendly identifier derived from the title. Globally unique.
    pub slug: String,

    pub content: String,
    pub excerpt: Option<String>,

    pub author: String,
    pub category: String,

    /// Ordered tag list.
    /// Stored as a JSON array in the database.
    /// `sqlx::types::Json` handles automatic serialization/deserialization.
    pub tags: Json<Vec<String>>,

    pub featured_image: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,

    pub status: PostStatus,

    /// Read counter. Only incremented when a published post is fetched.
    pub views: i64,

    /// Estimated reading time in minutes, recomputed when content changes.
    pub reading_time: i64,

    /// Stamped at the first transition into 'published', then frozen.
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new post.
///
/// Title and content are required but modeled as `Option` so that a missing
/// field surfaces as a 400 from our own validation instead of a body
/// deserialization failure.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 chars"))]
    pub title: Option<String>,

    pub content: Option<String>,

    pub excerpt: Option<String>,

    #[validate(length(max = 100, message = "Author must be at most 100 chars"))]
    pub author: Option<String>,

    #[validate(length(max = 50, message = "Category must be at most 50 chars"))]
    pub category: Option<String>,

    pub tags: Option<Vec<String>>,

    #[validate(
        length(max = 500, message = "Featured image URL must be at most 500 chars"),
        custom(function = validate_url_string)
    )]
    pub featured_image: Option<String>,

    #[validate(length(max = 160, message = "Meta description must be at most 160 chars"))]
    pub meta_description: Option<String>,

    #[validate(length(max = 255, message = "Meta keywords must be at most 255 chars"))]
    pub meta_keywords: Option<String>,

    pub status: Option<PostStatus>,
}

/// Merge-patch DTO for updating a post: only fields present in the payload
/// are applied, absent fields keep their stored values.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 chars"))]
    pub title: Option<String>,

    pub content: Option<String>,
    pub excerpt: Option<String>,

    #[validate(length(max = 100, message = "Author must be at most 100 chars"))]
    pub author: Option<String>,

    #[validate(length(max = 50, message = "Category must be at most 50 chars"))]
    pub category: Option<String>,

    pub tags: Option<Vec<String>>,

    #[validate(
        length(max = 500, message = "Featured image URL must be at most 500 chars"),
        custom(function = validate_url_string)
    )]
    pub featured_image: Option<String>,

    #[validate(length(max = 160, message = "Meta description must be at most 160 chars"))]
    pub meta_description: Option<String>,

    #[validate(length(max = 255, message = "Meta keywords must be at most 255 chars"))]
    pub meta_keywords: Option<String>,

    pub status: Option<PostStatus>,
}

/// Query parameters for listing posts.
#[derive(Debug, Default, Deserialize)]
pub struct PostListParams {
    /// 1-indexed page number (default: 1).
    pub page: Option<i64>,

    /// Page size (default: 10, max: 100).
    pub per_page: Option<i64>,

    /// Exact status filter.
    pub status: Option<PostStatus>,

    /// Exact category filter.
    pub category: Option<String>,

    /// Substring search over title, content and excerpt.
    pub search: Option<String>,
}

/// Pagination metadata returned alongside a page of posts.
#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of posts plus its metadata.
#[derive(Debug, Serialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

/// Aggregate counters over all posts.
#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct BlogStats {
    pub total_posts: i64,
    pub published_posts: i64,
    pub draft_posts: i64,
    pub total_views: i64,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}
