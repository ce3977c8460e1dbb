pub mod auth;
pub mod dto;
pub mod duty_task;
pub mod messaging;
pub mod middleware;
pub mod profile;
pub mod protocol;
pub mod reply;
pub mod rest;
pub mod state;
pub mod subscription_task;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds the API router: public auth routes plus every route behind the
/// session middleware.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/me",
            get(profile::get_me_handler).put(profile::update_me_handler),
        )
        .route("/users/{id}/activation", post(profile::set_activation_handler))
        .route("/duty/start", post(rest::start_shift_handler))
        .route("/duty/check-in", post(rest::check_in_handler))
        .route("/duty/end", post(rest::end_shift_handler))
        .route("/duty/rescue-request", post(rest::request_rescue_handler))
        .route("/roster", get(rest::roster_handler))
        .route("/roster/off-duty", post(rest::bulk_off_duty_handler))
        .route(
            "/rescues",
            get(rest::list_rescues_handler).post(rest::dispatch_rescue_handler),
        )
        .route("/drivers/{id}/rts", post(rest::confirm_rts_handler))
        .route(
            "/returns",
            get(rest::list_returns_handler).post(rest::log_returns_handler),
        )
        .route("/returns/{id}/notified", post(rest::mark_notified_handler))
        .route(
            "/chats",
            get(messaging::list_chats_handler).post(messaging::create_chat_handler),
        )
        .route(
            "/chats/{id}/messages",
            get(messaging::list_messages_handler).post(messaging::post_message_handler),
        )
        .route(
            "/notices",
            get(messaging::list_notices_handler).post(messaging::create_notice_handler),
        )
        .route(
            "/posts",
            get(messaging::list_posts_handler).post(messaging::create_post_handler),
        )
        .route(
            "/feedback",
            get(messaging::list_feedback_handler).post(messaging::send_feedback_handler),
        )
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
