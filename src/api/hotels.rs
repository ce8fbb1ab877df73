//! Hotel detail, listing and stored-offer endpoints

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::{ApiError, AppState};
use crate::analytics::AnalyticsEvent;
use crate::offers::{aggregate, price_line, NormalizedOffer, PriceLine};
use crate::storage::RateFilter;
use crate::types::{HotelDetails, HotelListing, PartnerDirectory, RoomWithRates, StoredOffer};

/// Image shown when a hotel has none
pub const PLACEHOLDER_IMAGE: &str = "/images/hotel-placeholder.jpg";
/// Rating shown when a hotel has no reviews
pub const DEFAULT_RATING: f64 = 4.0;

/// Hotel ids are hyphenated RFC 4122 UUIDs, versions 1 to 5
pub(crate) fn parse_hotel_id(raw: &str) -> Result<String, ApiError> {
    let invalid = || ApiError::validation("INVALID_HOTEL_ID", "Invalid hotel ID format");
    if raw.len() != 36 {
        return Err(invalid());
    }
    let id = uuid::Uuid::parse_str(raw).map_err(|_| invalid())?;
    if !(1..=5).contains(&id.get_version_num()) || id.get_variant() != uuid::Variant::RFC4122 {
        return Err(invalid());
    }
    Ok(raw.to_string())
}

pub(crate) fn rating(details: &HotelDetails) -> f64 {
    details
        .hotel
        .review_score
        .filter(|s| *s != 0.0)
        .unwrap_or(DEFAULT_RATING)
}

pub(crate) fn primary_image(details: &HotelDetails) -> String {
    details
        .hotel
        .primary_image_url
        .clone()
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageView {
    url: String,
    is_primary: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelDetailResponse {
    hotel_id: String,
    name: String,
    slug: String,
    rating: f64,
    review_count: i64,
    star_rating: i64,
    city: String,
    country: String,
    address: String,
    description: Option<String>,
    property_type: String,
    primary_image: String,
    images: Vec<ImageView>,
    amenities: Vec<String>,
    offers: Vec<NormalizedOffer>,
    #[serde(with = "rust_decimal::serde::float_option")]
    lowest_price: Option<Decimal>,
}

/// GET /api/hotels/:hotel_id - Hotel with aggregated partner offers
pub async fn get_hotel(
    State(state): State<AppState>,
    Path(hotel_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<HotelDetailResponse>, ApiError> {
    let hotel_id = parse_hotel_id(&hotel_id)?;
    let internal = ApiError::storage("INTERNAL_ERROR", "Failed to fetch hotel details");

    let details = match state.store.fetch_hotel(&hotel_id).await {
        Ok(Some(details)) => details,
        Ok(None) => return Err(ApiError::not_found("HOTEL_NOT_FOUND", "Hotel not found")),
        Err(e) => return Err(internal(e)),
    };

    let partners = state.store.fetch_active_partners().await;
    let rates = state
        .store
        .fetch_rates_for_hotel(
            &hotel_id,
            RateFilter::cheapest_per_room(state.config.detail.max_rates_per_room),
        )
        .await;
    let (partners, rates) = match (partners, rates) {
        (Ok(p), Ok(r)) => (p, r),
        (Err(e), _) | (_, Err(e)) => return Err(internal(e)),
    };

    let result = aggregate(&rates, &PartnerDirectory::from_partners(&partners));
    debug!(hotel_id = %hotel_id, rates = rates.len(), offers = result.len(), "Hotel offers aggregated");

    let identity = state.identity(&headers);
    state.analytics.track(
        AnalyticsEvent::HotelViewed {
            hotel_id: hotel_id.clone(),
            hotel_name: details.hotel.canonical_name.clone(),
            city: details.hotel.city.clone(),
        },
        identity.user_id().map(str::to_string),
    );

    let lowest_price = result.lowest_price();
    let rating = rating(&details);
    let primary_image = primary_image(&details);
    let HotelDetails {
        hotel,
        images,
        amenities,
    } = details;

    Ok(Json(HotelDetailResponse {
        hotel_id: hotel.id,
        name: hotel.canonical_name,
        slug: hotel.slug,
        rating,
        review_count: hotel.review_count.unwrap_or(0),
        star_rating: hotel.star_rating,
        city: hotel.city,
        country: hotel.country,
        address: hotel.address,
        description: hotel.description,
        property_type: hotel.property_type,
        primary_image,
        images: images
            .into_iter()
            .map(|img| ImageView {
                url: img.image_url,
                is_primary: img.is_primary,
            })
            .collect(),
        amenities,
        offers: result.into_offers(),
        lowest_price,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomOption {
    id: i64,
    #[serde(rename = "type")]
    room_type: String,
    bed_config: Option<String>,
    size_sqft: Option<i64>,
    max_guests: Option<i64>,
    prices: Vec<PriceLine>,
}

impl From<RoomWithRates> for RoomOption {
    fn from(room: RoomWithRates) -> Self {
        let mut prices: Vec<PriceLine> = room.rates.iter().map(price_line).collect();
        prices.sort_by(|a, b| a.total_price.cmp(&b.total_price));

        RoomOption {
            id: room.room.id,
            room_type: room.room.canonical_name,
            bed_config: room.room.bed_configuration,
            size_sqft: room.room.room_size_sqft,
            max_guests: room.room.max_guests,
            prices,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelSummary {
    id: String,
    canonical_name: String,
    normalized_name: String,
    slug: String,
    address: String,
    city: String,
    country: String,
    star_rating: i64,
    property_type: String,
    description: Option<String>,
    primary_image_url: Option<String>,
    review_score: Option<f64>,
    review_count: Option<i64>,
    quality_score: Option<i64>,
    amenities: Vec<String>,
    room_options: Vec<RoomOption>,
}

impl From<HotelListing> for HotelSummary {
    fn from(listing: HotelListing) -> Self {
        let HotelListing { details, rooms } = listing;
        let hotel = details.hotel;
        HotelSummary {
            id: hotel.id,
            canonical_name: hotel.canonical_name,
            normalized_name: hotel.normalized_name,
            slug: hotel.slug,
            address: hotel.address,
            city: hotel.city,
            country: hotel.country,
            star_rating: hotel.star_rating,
            property_type: hotel.property_type,
            description: hotel.description,
            primary_image_url: hotel.primary_image_url,
            review_score: hotel.review_score,
            review_count: hotel.review_count,
            quality_score: hotel.quality_score,
            amenities: details.amenities,
            room_options: rooms.into_iter().map(RoomOption::from).collect(),
        }
    }
}

/// GET /api/hotels - Every hotel with per-room partner prices
pub async fn list_hotels(
    State(state): State<AppState>,
) -> Result<Json<Vec<HotelSummary>>, ApiError> {
    let listings = state
        .store
        .list_hotels()
        .await
        .map_err(ApiError::storage("INTERNAL_ERROR", "Failed to fetch data"))?;

    Ok(Json(listings.into_iter().map(HotelSummary::from).collect()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OfferView {
    id: String,
    partner_id: String,
    partner_name: String,
    partner_slug: String,
    partner_logo: Option<String>,
    room_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    currency: String,
    refundable: bool,
    cancellation: Option<String>,
    deeplink: String,
    fetched_at: DateTime<Utc>,
}

impl From<StoredOffer> for OfferView {
    fn from(offer: StoredOffer) -> Self {
        OfferView {
            id: offer.id,
            partner_id: offer.partner.id,
            partner_name: offer.partner.name,
            partner_slug: offer.partner.slug,
            partner_logo: offer.partner.logo,
            room_name: offer.room_name,
            price: offer.price,
            currency: offer.currency,
            refundable: offer.refundable,
            cancellation: offer.cancellation,
            deeplink: offer.deeplink,
            fetched_at: offer.fetched_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffersResponse {
    hotel_id: String,
    offers: Vec<OfferView>,
}

/// GET /api/hotels/:hotel_id/offers - Stored offers from active partners
pub async fn get_hotel_offers(
    State(state): State<AppState>,
    Path(hotel_id): Path<String>,
) -> Result<Json<OffersResponse>, ApiError> {
    let hotel_id = parse_hotel_id(&hotel_id)?;
    let offers = state
        .store
        .fetch_hotel_offers(&hotel_id)
        .await
        .map_err(ApiError::storage("INTERNAL_ERROR", "Failed to fetch offers"))?;

    Ok(Json(OffersResponse {
        hotel_id,
        offers: offers.into_iter().map(OfferView::from).collect(),
    }))
}
