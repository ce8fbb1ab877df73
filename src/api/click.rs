//! Outbound click attribution and partner redirects
//!
//! None of these paths fail towards the user: anything unresolvable lands on
//! the configured fallback URL.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::{client_ip, found, user_agent, ApiError, AppState};
use crate::analytics::AnalyticsEvent;
use crate::storage::RatePin;
use crate::types::ClickRecord;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRequest {
    pub offer_id: Option<String>,
    pub partner_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickResponse {
    pub redirect_url: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// POST /api/click - Log a click on a stored offer and return its deep link
pub async fn track_click(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<ClickRequest>>,
) -> Result<Json<ClickResponse>, ApiError> {
    let fallback = || {
        Json(ClickResponse {
            redirect_url: state.fallback_url().to_string(),
        })
    };

    let Some(Json(request)) = payload else {
        warn!("Unreadable click payload");
        return Ok(fallback());
    };
    let (Some(offer_id), Some(partner_id)) =
        (non_empty(request.offer_id), non_empty(request.partner_id))
    else {
        return Err(ApiError::validation(
            "MISSING_FIELDS",
            "Missing required fields: offerId and partnerId",
        ));
    };

    let offer = match state.store.fetch_offer(&offer_id).await {
        Ok(Some(offer)) => offer,
        Ok(None) => {
            warn!(offer_id = %offer_id, "Click attempted for non-existent offer");
            return Ok(fallback());
        }
        Err(e) => {
            error!(offer_id = %offer_id, error = %e, "Failed to load clicked offer");
            return Ok(fallback());
        }
    };

    if offer.partner.id != partner_id {
        warn!(
            expected = %offer.partner.id,
            got = %partner_id,
            "Partner mismatch on click"
        );
    }

    let user_id = state.identity(&headers).user_id().map(str::to_string);
    state.record_click_detached(ClickRecord {
        offer_id: Some(offer_id.clone()),
        partner_id: Some(partner_id.clone()),
        user_id: user_id.clone(),
        ip: client_ip(&headers),
        device: Some(user_agent(&headers).unwrap_or_else(|| "unknown".to_string())),
        ..ClickRecord::new(&offer.hotel_id, &offer.partner.slug, &offer.deeplink)
    });
    state.analytics.track(
        AnalyticsEvent::OfferClicked {
            offer_id,
            partner_id,
            hotel_id: offer.hotel_id.clone(),
            price: Some(offer.price),
            currency: Some(offer.currency.clone()),
        },
        user_id,
    );

    Ok(Json(ClickResponse {
        redirect_url: offer.deeplink,
    }))
}

/// Rate pin carried by tracked offer links. Kept as strings so a mangled
/// value drops the pin instead of failing the redirect.
#[derive(Debug, Default, Deserialize)]
pub struct PinParams {
    pub room: Option<String>,
    pub checkin: Option<String>,
}

impl PinParams {
    fn into_pin(self) -> RatePin {
        RatePin {
            room_type_id: self.room.and_then(|v| v.trim().parse().ok()),
            checkin: self
                .checkin
                .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok()),
        }
    }
}

/// GET /api/partners/:ota/redirect/:hotel_id - Tracked redirect used by offer deep links
pub async fn partner_redirect(
    State(state): State<AppState>,
    Path((ota, hotel_id)): Path<(String, String)>,
    pin: Option<Query<PinParams>>,
    headers: HeaderMap,
) -> Response {
    let pin = pin.map(|Query(p)| p).unwrap_or_default().into_pin();
    let link = match state.store.find_booking_link(&hotel_id, &ota, pin).await {
        Ok(link) => link,
        Err(e) => {
            error!(hotel_id = %hotel_id, ota = %ota, error = %e, "Booking link lookup failed");
            None
        }
    };

    let Some(link) = link else {
        warn!(hotel_id = %hotel_id, ota = %ota, "No booking link, using fallback");
        return found(state.fallback_url(), state.fallback_url());
    };

    let user_id = state.identity(&headers).user_id().map(str::to_string);
    state.record_click_detached(ClickRecord {
        user_id,
        ip: client_ip(&headers),
        device: user_agent(&headers),
        ..ClickRecord::new(&hotel_id, &ota, &link)
    });

    found(&link, state.fallback_url())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectParams {
    pub hotel_id: Option<String>,
    pub ota: Option<String>,
    pub url: Option<String>,
}

/// GET /api/redirect - Log a click when attributable, then redirect to `url`
pub async fn direct_redirect(
    State(state): State<AppState>,
    Query(params): Query<RedirectParams>,
    headers: HeaderMap,
) -> Response {
    let Some(url) = non_empty(params.url) else {
        warn!("Redirect without target URL, using fallback");
        return found(state.fallback_url(), state.fallback_url());
    };

    if let (Some(hotel_id), Some(ota)) = (non_empty(params.hotel_id), non_empty(params.ota)) {
        state.record_click_detached(ClickRecord {
            ip: client_ip(&headers),
            device: user_agent(&headers),
            ..ClickRecord::new(hotel_id, ota, &url)
        });
    }

    found(&url, state.fallback_url())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_params_parse() {
        let pin = PinParams {
            room: Some("7".to_string()),
            checkin: Some("2026-11-02".to_string()),
        }
        .into_pin();
        assert_eq!(pin.room_type_id, Some(7));
        assert_eq!(pin.checkin, NaiveDate::from_ymd_opt(2026, 11, 2));
    }

    #[test]
    fn test_mangled_pin_is_dropped() {
        let pin = PinParams {
            room: Some("seven".to_string()),
            checkin: Some("02/11/2026".to_string()),
        }
        .into_pin();
        assert!(pin.is_empty());
        assert!(PinParams::default().into_pin().is_empty());
    }
}
