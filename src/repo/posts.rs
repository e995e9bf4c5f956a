// src/repo/posts.rs

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::post::{
        BlogStats, CreatePostRequest, Pagination, Post, PostListParams, PostPage, PostStatus,
        UpdatePostRequest,
    },
    utils::text::{reading_time, slugify},
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, author, category, tags, \
     featured_image, meta_description, meta_keywords, status, views, reading_time, \
     published_at, created_at, updated_at";

/// Defaults applied to posts created without an author or category.
#[derive(Debug, Clone)]
pub struct PostDefaults {
    pub author: String,
    pub category: String,
}

/// Post repository and lifecycle engine.
///
/// Owns all access to the 'posts' table: slug derivation and uniqueness,
/// reading-time computation, status transitions, view accounting and the
/// filtered/paginated queries. Holds the pool handle explicitly; no ambient
/// connection state.
#[derive(Clone)]
pub struct PostRepository {
    pool: SqlitePool,
    defaults: PostDefaults,
}

impl PostRepository {
    pub fn new(pool: SqlitePool, defaults: PostDefaults) -> Self {
        Self { pool, defaults }
    }

    /// Creates a new post.
    ///
    /// Title and content are mandatory and must be non-empty. The slug is
    /// derived from the title and disambiguated against existing posts; the
    /// UNIQUE constraint on the column backs the check, and a constraint
    /// violation on insert is retried with a fresh suffix before failing.
    pub async fn create(&self, req: CreatePostRequest) -> Result<Post, AppError> {
        let title = req
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Title and content are required".to_string()))?;
        let content = req
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Title and content are required".to_string()))?;

        let base = slug_base(&title);
        let mut slug = base.clone();
        if self.slug_in_use(&slug, None).await? {
            slug = disambiguate(&base);
        }

        let now = Utc::now();
        let status = req.status.unwrap_or(PostStatus::Draft);

        let mut post = Post {
            id: Uuid::new_v4().to_string(),
            slug,
            reading_time: reading_time(&content),
            title,
            content,
            excerpt: req.excerpt,
            author: req.author.unwrap_or_else(|| self.defaults.author.clone()),
            category: req
                .category
                .unwrap_or_else(|| self.defaults.category.clone()),
            tags: Json(req.tags.unwrap_or_default()),
            featured_image: req.featured_image,
            meta_description: req.meta_description,
            meta_keywords: req.meta_keywords,
            status,
            views: 0,
            published_at: (status == PostStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        // The pre-check above is a check-then-act race under concurrent
        // writers; the UNIQUE index is the hard backstop. Retry once with a
        // fresh suffix before surfacing the conflict.
        for _ in 0..2 {
            match self.insert(&post).await {
                Ok(()) => return Ok(post),
                Err(e) if is_unique_violation(&e) => {
                    tracing::warn!("Slug '{}' already taken, retrying", post.slug);
                    post.slug = disambiguate(&base);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(format!(
            "Could not allocate a unique slug for '{}'",
            post.title
        )))
    }

    /// Fetches a single post by id or slug.
    ///
    /// Published posts have their view counter bumped with an atomic
    /// `views = views + 1`; the returned post carries the post-increment
    /// value. Draft and archived posts are returned untouched.
    pub async fn get(&self, identifier: &str) -> Result<Post, AppError> {
        let mut post = self
            .fetch_by_identifier(identifier)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if post.status == PostStatus::Published {
            sqlx::query("UPDATE posts SET views = views + 1 WHERE id = ?")
                .bind(&post.id)
                .execute(&self.pool)
                .await?;
            post.views += 1;
        }

        Ok(post)
    }

    /// Lists posts with optional status/category filters and substring
    /// search, newest published first (unpublished sort last, then by
    /// creation time). Out-of-range pages yield an empty item list.
    pub async fn list(&self, params: &PostListParams) -> Result<PostPage, AppError> {
        let page = params.page.unwrap_or(1).max(1);
        let per_page = params
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
        apply_filters(&mut count_query, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {POST_COLUMNS} FROM posts"));
        apply_filters(&mut query, params);
        query.push(" ORDER BY published_at IS NULL, published_at DESC, created_at DESC");
        query
            .push(" LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind((page - 1) * per_page);

        let posts: Vec<Post> = query.build_query_as().fetch_all(&self.pool).await?;

        let pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };

        Ok(PostPage {
            posts,
            pagination: Pagination {
                page,
                per_page,
                total,
                pages,
                has_next: page < pages,
                has_prev: page > 1,
            },
        })
    }

    /// Applies a merge-patch to the post with the given id.
    ///
    /// A changed title re-derives the slug (collision check excludes the
    /// post's own row); changed content recomputes the reading time; the
    /// first transition into 'published' stamps `published_at`, which is
    /// never modified afterwards. `updated_at` is always refreshed.
    pub async fn update(&self, id: &str, req: UpdatePostRequest) -> Result<Post, AppError> {
        let mut post = self
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        let mut slug_base_changed = None;

        if let Some(title) = req.title {
            if title.trim().is_empty() {
                return Err(AppError::BadRequest("Title cannot be empty".to_string()));
            }
            let base = slug_base(&title);
            post.title = title;
            if base != post.slug {
                post.slug = if self.slug_in_use(&base, Some(&post.id)).await? {
                    disambiguate(&base)
                } else {
                    base.clone()
                };
                slug_base_changed = Some(base);
            }
        }

        if let Some(content) = req.content {
            if content.trim().is_empty() {
                return Err(AppError::BadRequest("Content cannot be empty".to_string()));
            }
            post.reading_time = reading_time(&content);
            post.content = content;
        }

        if let Some(excerpt) = req.excerpt {
            post.excerpt = Some(excerpt);
        }
        if let Some(author) = req.author {
            post.author = author;
        }
        if let Some(category) = req.category {
            post.category = category;
        }
        if let Some(tags) = req.tags {
            post.tags = Json(tags);
        }
        if let Some(featured_image) = req.featured_image {
            post.featured_image = Some(featured_image);
        }
        if let Some(meta_description) = req.meta_description {
            post.meta_description = Some(meta_description);
        }
        if let Some(meta_keywords) = req.meta_keywords {
            post.meta_keywords = Some(meta_keywords);
        }

        if let Some(status) = req.status {
            if status == PostStatus::Published
                && post.status != PostStatus::Published
                && post.published_at.is_none()
            {
                post.published_at = Some(Utc::now());
            }
            post.status = status;
        }

        post.updated_at = Utc::now();

        for _ in 0..2 {
            match self.save(&post).await {
                Ok(()) => return Ok(post),
                Err(e) if is_unique_violation(&e) => match &slug_base_changed {
                    Some(base) => {
                        tracing::warn!("Slug '{}' already taken, retrying", post.slug);
                        post.slug = disambiguate(base);
                    }
                    None => return Err(e.into()),
                },
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(format!(
            "Could not allocate a unique slug for '{}'",
            post.title
        )))
    }

    /// Hard-deletes a post by id.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Ok(())
    }

    /// Distinct non-empty categories, sorted for deterministic output.
    pub async fn categories(&self) -> Result<Vec<String>, AppError> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM posts WHERE category <> '' ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Aggregate counters over all posts. Total views sums every status.
    pub async fn stats(&self) -> Result<BlogStats, AppError> {
        let stats = sqlx::query_as::<_, BlogStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM posts) AS total_posts,
                (SELECT COUNT(*) FROM posts WHERE status = 'published') AS published_posts,
                (SELECT COUNT(*) FROM posts WHERE status = 'draft') AS draft_posts,
                (SELECT COALESCE(SUM(views), 0) FROM posts) AS total_views
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn fetch_by_identifier(&self, identifier: &str) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = ? OR slug = ?"
        ))
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Whether a slug is already taken, optionally excluding one post
    /// (used when renaming, so a post never collides with itself).
    async fn slug_in_use(&self, slug: &str, exclude_id: Option<&str>) -> Result<bool, AppError> {
        // Ids are UUIDs, so the empty string never matches a row.
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ? AND id <> ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(""))
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    async fn insert(&self, post: &Post) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, title, slug, content, excerpt, author, category, tags,
                featured_image, meta_description, meta_keywords, status,
                views, reading_time, published_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.author)
        .bind(&post.category)
        .bind(&post.tags)
        .bind(&post.featured_image)
        .bind(&post.meta_description)
        .bind(&post.meta_keywords)
        .bind(post.status)
        .bind(post.views)
        .bind(post.reading_time)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save(&self, post: &Post) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE posts SET
                title = ?, slug = ?, content = ?, excerpt = ?, author = ?,
                category = ?, tags = ?, featured_image = ?, meta_description = ?,
                meta_keywords = ?, status = ?, reading_time = ?, published_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.author)
        .bind(&post.category)
        .bind(&post.tags)
        .bind(&post.featured_image)
        .bind(&post.meta_description)
        .bind(&post.meta_keywords)
        .bind(post.status)
        .bind(post.reading_time)
        .bind(post.published_at)
        .bind(post.updated_at)
        .bind(&post.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Slug base for a title. An all-punctuation title slugifies to the empty
/// string; fall back to a fixed base so disambiguation still produces a
/// usable, non-empty slug.
fn slug_base(title: &str) -> String {
    let base = slugify(title);
    if base.is_empty() { "post".to_string() } else { base }
}

/// Appends a clock-derived suffix to restore uniqueness. Microsecond
/// resolution keeps back-to-back retries distinct.
fn disambiguate(base: &str) -> String {
    format!("{}-{}", base, Utc::now().timestamp_micros())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

/// Pushes the shared WHERE clause for list/count queries. Status and
/// category are exact matches combined with AND; the search term is a
/// substring match ORed across title, content and excerpt.
fn apply_filters(query: &mut QueryBuilder<'_, Sqlite>, params: &PostListParams) {
    query.push(" WHERE 1 = 1");

    if let Some(status) = params.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(category) = &params.category {
        query.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(search) = &params.search {
        let pattern = format!("%{}%", search);
        query
            .push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR content LIKE ")
            .push_bind(pattern.clone())
            .push(" OR excerpt LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
