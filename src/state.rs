use sqlx::SqlitePool;
use std::sync::Arc;

use crate::hub::Hub;
use crate::middleware::auth::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub hub: Hub,
    pub jwt: Arc<JwtKeys>,
    pub token_ttl: chrono::Duration,
}
