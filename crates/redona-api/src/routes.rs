use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{conversations, donations, needs, ongs, shipping};

/// The full HTTP surface. Everything except `/health` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/conversations", get(conversations::list))
        .route("/conversations/{id}", get(conversations::get))
        .route("/conversations/{id}/messages", post(conversations::send_message))
        .route("/conversations/{id}/shipping-cost", get(shipping::get_shipping_cost))
        .route("/conversations/donation/{donation_id}", get(conversations::get_for_donation))
        .route("/conversations/need/{need_id}", get(conversations::get_for_need))
        .route("/conversations/need/{need_id}/open", post(conversations::open_for_need))
        .route("/donations", post(donations::create))
        .route("/donations/{id}/request", post(donations::request))
        .route("/donations/{id}/deliver", post(donations::deliver))
        .route("/donations/{id}/reject", post(donations::reject))
        .route("/needs", post(needs::create))
        .route("/needs/{id}/close", post(needs::close))
        .route("/ongs/me", get(ongs::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
