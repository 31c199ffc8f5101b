mod auth;
mod health;
pub mod posts;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::home))
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/ws", get(crate::hub::upgrade::ws_upgrade))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::me))
        .route("/posts", post(posts::insert_post))
        .route(
            "/posts/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
}
