//! Booking endpoints
//!
//! Bookings happen on partner sites; these routes only answer 501.

use axum::{extract::Path, http::StatusCode, Json};
use serde::Serialize;

const NOT_AVAILABLE: &str = "Booking functionality is not yet available. This is a metasearch \
     platform that redirects to partner sites for bookings.";

#[derive(Debug, Serialize)]
pub struct NotImplementedBody {
    pub error: &'static str,
    pub message: &'static str,
}

fn not_implemented() -> (StatusCode, Json<NotImplementedBody>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(NotImplementedBody {
            error: "Not Implemented",
            message: NOT_AVAILABLE,
        }),
    )
}

/// GET /api/bookings/:booking_id
pub async fn get_booking(Path(_booking_id): Path<String>) -> (StatusCode, Json<NotImplementedBody>) {
    not_implemented()
}

/// POST /api/bookings/quote
pub async fn quote() -> (StatusCode, Json<NotImplementedBody>) {
    not_implemented()
}

/// POST /api/bookings/confirm
pub async fn confirm() -> (StatusCode, Json<NotImplementedBody>) {
    not_implemented()
}
