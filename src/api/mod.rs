//! HTTP API
//!
//! Axum router and shared state. Handlers are thin adapters over the
//! [`HotelStore`], the offer aggregator and the analytics sink.

mod bookings;
mod click;
pub mod error;
mod health;
mod hotels;
mod search;

pub use error::ApiError;

use axum::{
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::analytics::Analytics;
use crate::auth::{identity_from_headers, Identity, TokenVerifier};
use crate::config::AppConfig;
use crate::storage::HotelStore;
use crate::types::ClickRecord;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn HotelStore>,
    pub analytics: Analytics,
    pub verifier: Option<TokenVerifier>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn HotelStore>, analytics: Analytics) -> Self {
        let verifier = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(TokenVerifier::new);
        Self {
            config: Arc::new(config),
            store,
            analytics,
            verifier,
        }
    }

    pub fn identity(&self, headers: &HeaderMap) -> Identity {
        identity_from_headers(headers, self.verifier.as_ref())
    }

    pub fn fallback_url(&self) -> &str {
        &self.config.redirect.fallback_url
    }

    /// Persist a click without blocking the response
    pub fn record_click_detached(&self, click: ClickRecord) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.record_click(&click).await {
                Ok(()) => debug!(hotel_id = %click.hotel_id, ota = %click.ota, "Click recorded"),
                Err(e) => warn!(hotel_id = %click.hotel_id, error = %e, "Failed to record click"),
            }
        });
    }
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Hotels
        .route("/api/hotels", get(hotels::list_hotels))
        .route("/api/hotels/search", get(search::search_hotels))
        .route("/api/hotels/:hotel_id", get(hotels::get_hotel))
        .route("/api/hotels/:hotel_id/offers", get(hotels::get_hotel_offers))
        // Click attribution
        .route("/api/click", post(click::track_click))
        .route(
            "/api/partners/:ota/redirect/:hotel_id",
            get(click::partner_redirect),
        )
        .route("/api/redirect", get(click::direct_redirect))
        // Booking stubs
        .route("/api/bookings/quote", post(bookings::quote))
        .route("/api/bookings/confirm", post(bookings::confirm))
        .route("/api/bookings/:booking_id", get(bookings::get_booking))
        .route("/api/health", get(health::get_health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // CORS for frontend
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// 302 Found to `url`, or to `fallback` when `url` is not a valid header value
pub(crate) fn found(url: &str, fallback: &str) -> Response {
    let location = HeaderValue::from_str(url)
        .or_else(|_| HeaderValue::from_str(fallback))
        .unwrap_or_else(|_| HeaderValue::from_static("/"));
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

/// Client address from proxy headers
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
