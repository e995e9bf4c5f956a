use crate::config::Config;
use crate::repo::posts::{PostDefaults, PostRepository};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for PostRepository {
    fn from_ref(state: &AppState) -> Self {
        PostRepository::new(
            state.pool.clone(),
            PostDefaults {
                author: state.config.default_author.clone(),
                category: state.config.default_category.clone(),
            },
        )
    }
}
