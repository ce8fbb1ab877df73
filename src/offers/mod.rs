//! Offers module - Partner offer normalization
//!
//! Reduces raw partner rates into one normalized, ranked offer per partner
//! and exposes the shared price projection used by the listing endpoint.

mod aggregator;

pub use aggregator::{
    aggregate, partner_rate, price_line, AggregateResult, NormalizedOffer, OfferAggregator,
    PriceLine, RedirectMode,
};

use crate::types::RateRow;

/// Label shown for refundable offers
pub const FREE_CANCELLATION: &str = "Free cancellation";
/// Label shown for non-refundable offers
pub const NON_REFUNDABLE: &str = "Non-refundable";

/// Cancellation label for a refundable flag
pub fn cancellation_label(refundable: bool) -> &'static str {
    if refundable {
        FREE_CANCELLATION
    } else {
        NON_REFUNDABLE
    }
}

/// Internal click-tracking route for the rate behind an offer.
/// Room and check-in pin the redirect to that rate.
pub fn tracking_route(row: &RateRow) -> String {
    format!(
        "/api/partners/{}/redirect/{}?room={}&checkin={}",
        row.ota_name,
        row.hotel_id,
        row.room_type_id,
        row.checkin_date.format("%Y-%m-%d")
    )
}
