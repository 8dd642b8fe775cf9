pub mod comments;
pub mod follows;
pub mod groups;
pub mod posts;

use crate::AppState;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(post_routes())
        .merge(comment_routes())
        .merge(group_routes())
        .merge(follow_routes())
}

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts/", get(posts::list_posts).post(posts::create_post))
        .route(
            "/posts/{post_id}/",
            get(posts::get_post)
                .put(posts::update_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
}

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/{post_id}/comments/",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/posts/{post_id}/comments/{id}/",
            get(comments::get_comment)
                .put(comments::update_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        )
}

pub fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/groups/", get(groups::list_groups))
        .route("/groups/{id}/", get(groups::get_group))
}

pub fn follow_routes() -> Router<AppState> {
    Router::new().route("/follow/", get(follows::list_follows).post(follows::create_follow))
}

async fn health_check() -> &'static str {
    "OK"
}
