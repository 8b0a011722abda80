//! API service routes

use axum::{
    Router,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{
    error::ApiError,
    handlers::{account, admin, dashboard, health, public, settings},
    middleware::require_session,
    state::AppState,
};

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// Replace the router's own bodiless rejections (unknown path, method not
/// allowed on a known path) with the not-found envelope
async fn envelope_router_rejections(response: Response) -> Response {
    let bare_not_found =
        response.status() == StatusCode::NOT_FOUND && !response.headers().contains_key(CONTENT_TYPE);

    if bare_not_found || response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return route_not_found().await.into_response();
    }
    response
}

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/dashboard", get(dashboard::summary))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/settings/:section", put(settings::update_section))
        .route("/:resource", get(admin::list).post(admin::create))
        .route("/:resource/bulk", post(admin::bulk))
        .route(
            "/:resource/:id",
            get(admin::read).put(admin::update).delete(admin::remove),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let public_routes = Router::new()
        .route("/settings", get(public::settings))
        .route("/contact", post(public::submit_contact))
        .route("/bookings", post(public::submit_booking))
        .route("/:resource", get(public::list))
        .route("/:resource/:key", get(public::read));

    let account_routes = Router::new()
        .route(
            "/me",
            get(account::me).route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_session,
            )),
        )
        .route("/login", post(account::login))
        .route("/logout", post(account::logout));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/admin", admin_routes)
        .nest("/api/public", public_routes)
        .nest("/api/auth", account_routes)
        .fallback(route_not_found)
        .layer(middleware::map_response(envelope_router_rejections))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
