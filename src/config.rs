// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,

    /// Author assigned to posts created without one.
    pub default_author: String,
    /// Category assigned to posts created without one.
    pub default_category: String,

    /// Optional admin account seeded at startup.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let default_author =
            env::var("BLOG_DEFAULT_AUTHOR").unwrap_or_else(|_| "Admin".to_string());

        let default_category =
            env::var("BLOG_DEFAULT_CATEGORY").unwrap_or_else(|_| "General".to_string());

        let admin_email = env::var("ADMIN_EMAIL").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            default_author,
            default_category,
            admin_email,
            admin_password,
        }
    }
}
