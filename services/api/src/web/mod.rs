pub mod admin;
pub mod assistant;
pub mod auth;
pub mod middleware;
pub mod offline;
pub mod protocol;
pub mod records;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use ewaste_core::authz::AdminRole;
use std::sync::Arc;

pub use middleware::{require_auth, require_role};
pub use rest::ApiDoc;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds every API route over `app_state`. CORS, body limits and Swagger UI
/// are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    let moderator_routes = Router::new()
        .route(
            "/admin/collection-requests/{id}/status",
            post(admin::set_collection_status_handler),
        )
        .route(
            "/admin/dumping-reports/{id}/status",
            post(admin::set_report_status_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            (app_state.clone(), AdminRole::Moderator),
            require_role,
        ));

    let admin_routes = Router::new()
        .route(
            "/admin/users",
            get(admin::list_admin_users_handler).post(admin::grant_admin_handler),
        )
        .route("/admin/analytics", get(admin::analytics_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            (app_state.clone(), AdminRole::Admin),
            require_role,
        ));

    // Protected routes (auth required). `require_auth` is added last so it
    // runs before the role gates above.
    let protected_routes = Router::new()
        .route("/me", get(auth::me_handler))
        .route("/offline", get(offline::offline_status_handler))
        .route("/offline/start", post(offline::start_offline_handler))
        .route("/offline/end", post(offline::end_offline_handler))
        .route("/offline/capabilities", get(offline::capabilities_handler))
        .route(
            "/collection-requests",
            get(records::list_collection_requests_handler)
                .post(records::create_collection_request_handler),
        )
        .route(
            "/collection-requests/{id}/cancel",
            post(records::cancel_collection_request_handler),
        )
        .route(
            "/dumping-reports",
            get(records::list_dumping_reports_handler).post(records::create_dumping_report_handler),
        )
        .route(
            "/marketplace/listings",
            get(records::list_listings_handler).post(records::create_listing_handler),
        )
        .route(
            "/marketplace/listings/{id}/availability",
            post(records::set_listing_availability_handler),
        )
        .route(
            "/items",
            get(records::list_items_handler).post(records::register_item_handler),
        )
        .route("/wallet", get(records::wallet_handler))
        .route("/admin/me", get(admin::admin_me_handler))
        .route("/admin/initialize", post(admin::initialize_admin_handler))
        .route("/assistant/chat", post(assistant::chat_handler))
        .route(
            "/assistant/conversations",
            get(assistant::list_conversations_handler),
        )
        .route(
            "/assistant/conversations/{id}",
            delete(assistant::delete_conversation_handler),
        )
        .route(
            "/assistant/conversations/{id}/messages",
            get(assistant::conversation_messages_handler),
        )
        .route("/ws", get(ws_handler))
        .merge(moderator_routes)
        .merge(admin_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
