// tests/blog_api_tests.rs

use blog_backend::{config::Config, routes, state::AppState};
use sqlx::sqlite::SqlitePoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// Each app gets its own in-memory SQLite database, so tests are fully
/// isolated and need no external services.
async fn spawn_app() -> String {
    // 1. Create a single-connection pool (one connection == one in-memory DB)
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite for testing");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        default_author: "The Editors".to_string(),
        default_category: "General".to_string(),
        admin_email: None,
        admin_password: None,
    };

    let state = AppState { pool, config };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn create_post(
    client: &reqwest::Client,
    address: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/blog/posts", address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.expect("Invalid JSON body")
}

#[tokio::test]
async fn create_post_returns_201_with_derived_fields() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(
        &client,
        &address,
        serde_json::json!({
            "title": "Hello, World!  Foo",
            "content": "a short body",
            "tags": ["intro", "meta"]
        }),
    )
    .await;

    assert_eq!(post["slug"], "hello-world-foo");
    assert_eq!(post["status"], "draft");
    assert_eq!(post["author"], "The Editors");
    assert_eq!(post["category"], "General");
    assert_eq!(post["views"], 0);
    assert_eq!(post["reading_time"], 1);
    assert_eq!(post["tags"], serde_json::json!(["intro", "meta"]));
    assert!(post["published_at"].is_null());
}

#[tokio::test]
async fn create_post_without_title_or_content_is_400() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for body in [
        serde_json::json!({}),
        serde_json::json!({"title": "No content"}),
        serde_json::json!({"content": "No title"}),
        serde_json::json!({"title": "   ", "content": "blank title"}),
    ] {
        let response = client
            .post(format!("{}/api/blog/posts", address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(response.status().as_u16(), 400);
        let error: serde_json::Value = response.json().await.unwrap();
        assert_eq!(error["code"], "validation_error");
    }
}

#[tokio::test]
async fn create_post_with_invalid_featured_image_is_400() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/blog/posts", address))
        .json(&serde_json::json!({
            "title": "Bad image",
            "content": "body",
            "featured_image": "not a url"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_titles_get_disambiguated_slugs() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let first = create_post(
        &client,
        &address,
        serde_json::json!({"title": "Same Title", "content": "one"}),
    )
    .await;
    let second = create_post(
        &client,
        &address,
        serde_json::json!({"title": "Same Title", "content": "two"}),
    )
    .await;

    assert_eq!(first["slug"], "same-title");
    let second_slug = second["slug"].as_str().unwrap();
    assert_ne!(second_slug, "same-title");
    assert!(second_slug.starts_with("same-title-"));
}

#[tokio::test]
async fn get_post_resolves_id_and_slug_and_counts_views() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(
        &client,
        &address,
        serde_json::json!({
            "title": "Published Piece",
            "content": "body",
            "status": "published"
        }),
    )
    .await;
    let id = post["id"].as_str().unwrap();

    // Fetch by slug, then twice by id: each read of a published post
    // increments the view counter.
    let by_slug: serde_json::Value = client
        .get(format!("{}/api/blog/posts/published-piece", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_slug["id"], id);
    assert_eq!(by_slug["views"], 1);

    for expected in [2, 3] {
        let by_id: serde_json::Value = client
            .get(format!("{}/api/blog/posts/{}", address, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(by_id["views"], expected);
    }
}

#[tokio::test]
async fn get_draft_post_does_not_count_views() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(
        &client,
        &address,
        serde_json::json!({"title": "Quiet Draft", "content": "body"}),
    )
    .await;
    let id = post["id"].as_str().unwrap();

    for _ in 0..2 {
        let fetched: serde_json::Value = client
            .get(format!("{}/api/blog/posts/{}", address, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["views"], 0);
    }
}

#[tokio::test]
async fn get_unknown_post_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/blog/posts/no-such-post", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
    let error: serde_json::Value = response.json().await.unwrap();
    assert_eq!(error["code"], "not_found");
}

#[tokio::test]
async fn list_paginates_with_metadata() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for i in 0..25 {
        create_post(
            &client,
            &address,
            serde_json::json!({"title": format!("Post {}", i), "content": "body"}),
        )
        .await;
    }

    let page1: serde_json::Value = client
        .get(format!("{}/api/blog/posts?per_page=10", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page1["posts"].as_array().unwrap().len(), 10);
    assert_eq!(page1["pagination"]["total"], 25);
    assert_eq!(page1["pagination"]["pages"], 3);
    assert_eq!(page1["pagination"]["has_next"], true);
    assert_eq!(page1["pagination"]["has_prev"], false);

    let page3: serde_json::Value = client
        .get(format!("{}/api/blog/posts?per_page=10&page=3", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page3["posts"].as_array().unwrap().len(), 5);
    assert_eq!(page3["pagination"]["has_next"], false);
    assert_eq!(page3["pagination"]["has_prev"], true);

    // Out-of-range pages are empty, not an error.
    let page9: serde_json::Value = client
        .get(format!("{}/api/blog/posts?per_page=10&page=9", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page9["posts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn list_applies_filters_and_search() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    create_post(
        &client,
        &address,
        serde_json::json!({
            "title": "Rust tricks",
            "content": "all about foo",
            "category": "Rust",
            "status": "published"
        }),
    )
    .await;
    create_post(
        &client,
        &address,
        serde_json::json!({
            "title": "Draft notes",
            "content": "nothing here",
            "category": "Rust"
        }),
    )
    .await;
    create_post(
        &client,
        &address,
        serde_json::json!({
            "title": "Other",
            "content": "body",
            "excerpt": "summary with foo inside",
            "category": "Misc"
        }),
    )
    .await;

    let drafts: serde_json::Value = client
        .get(format!("{}/api/blog/posts?status=draft", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(drafts["pagination"]["total"], 2);
    for post in drafts["posts"].as_array().unwrap() {
        assert_eq!(post["status"], "draft");
    }

    let rust_published: serde_json::Value = client
        .get(format!(
            "{}/api/blog/posts?status=published&category=Rust",
            address
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rust_published["pagination"]["total"], 1);
    assert_eq!(rust_published["posts"][0]["title"], "Rust tricks");

    // Search spans title, content and excerpt.
    let found: serde_json::Value = client
        .get(format!("{}/api/blog/posts?search=foo", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found["pagination"]["total"], 2);
    for post in found["posts"].as_array().unwrap() {
        assert_ne!(post["title"], "Draft notes");
    }
}

#[tokio::test]
async fn update_applies_partial_patch_only() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(
        &client,
        &address,
        serde_json::json!({"title": "Keep Me", "content": "original"}),
    )
    .await;
    let id = post["id"].as_str().unwrap();

    let response = client
        .put(format!("{}/api/blog/posts/{}", address, id))
        .json(&serde_json::json!({"category": "SEO"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let updated: serde_json::Value = response.json().await.unwrap();
    assert_eq!(updated["category"], "SEO");
    assert_eq!(updated["title"], post["title"]);
    assert_eq!(updated["slug"], post["slug"]);
    assert_eq!(updated["content"], post["content"]);
    assert_eq!(updated["status"], post["status"]);
    assert_ne!(updated["updated_at"], post["updated_at"]);
}

#[tokio::test]
async fn update_rejects_empty_title_and_missing_post() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(
        &client,
        &address,
        serde_json::json!({"title": "Target", "content": "body"}),
    )
    .await;
    let id = post["id"].as_str().unwrap();

    let bad = client
        .put(format!("{}/api/blog/posts/{}", address, id))
        .json(&serde_json::json!({"title": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 400);

    let missing = client
        .put(format!("{}/api/blog/posts/does-not-exist", address))
        .json(&serde_json::json!({"category": "SEO"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn publishing_stamps_published_at_once() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(
        &client,
        &address,
        serde_json::json!({"title": "Lifecycle", "content": "body"}),
    )
    .await;
    let id = post["id"].as_str().unwrap();

    let published: serde_json::Value = client
        .put(format!("{}/api/blog/posts/{}", address, id))
        .json(&serde_json::json!({"status": "published"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let published_at = published["published_at"].clone();
    assert!(published_at.is_string());

    let archived: serde_json::Value = client
        .put(format!("{}/api/blog/posts/{}", address, id))
        .json(&serde_json::json!({"status": "archived"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(archived["status"], "archived");
    assert_eq!(archived["published_at"], published_at);
}

#[tokio::test]
async fn delete_then_get_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(
        &client,
        &address,
        serde_json::json!({"title": "Doomed", "content": "body"}),
    )
    .await;
    let id = post["id"].as_str().unwrap();

    let deleted = client
        .delete(format!("{}/api/blog/posts/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    let fetched = client
        .get(format!("{}/api/blog/posts/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status().as_u16(), 404);

    let deleted_again = client
        .delete(format!("{}/api/blog/posts/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted_again.status().as_u16(), 404);
}

#[tokio::test]
async fn categories_are_distinct_and_sorted() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for category in ["Zeta", "Alpha", "Zeta"] {
        create_post(
            &client,
            &address,
            serde_json::json!({
                "title": format!("In {}", category),
                "content": "body",
                "category": category
            }),
        )
        .await;
    }

    let categories: serde_json::Value = client
        .get(format!("{}/api/blog/categories", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(categories, serde_json::json!(["Alpha", "Zeta"]));
}

#[tokio::test]
async fn stats_reports_counts_and_views() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let published = create_post(
        &client,
        &address,
        serde_json::json!({"title": "Seen", "content": "body", "status": "published"}),
    )
    .await;
    create_post(
        &client,
        &address,
        serde_json::json!({"title": "Draft", "content": "body"}),
    )
    .await;

    // Two reads of the published post.
    for _ in 0..2 {
        client
            .get(format!(
                "{}/api/blog/posts/{}",
                address,
                published["id"].as_str().unwrap()
            ))
            .send()
            .await
            .unwrap();
    }

    let stats: serde_json::Value = client
        .get(format!("{}/api/blog/stats", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(stats["total_posts"], 2);
    assert_eq!(stats["published_posts"], 1);
    assert_eq!(stats["draft_posts"], 1);
    assert_eq!(stats["total_views"], 2);
}
