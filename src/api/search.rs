//! City search with per-hotel offer aggregation

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::hotels::{primary_image, rating};
use super::{ApiError, AppState};
use crate::analytics::AnalyticsEvent;
use crate::offers::{aggregate, NormalizedOffer};
use crate::storage::RateFilter;
use crate::types::PartnerDirectory;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub city: Option<String>,
    pub checkin: Option<String>,
    pub checkout: Option<String>,
    pub guests: Option<String>,
}

/// Validated search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub city: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub guests: u32,
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::validation("INVALID_DATE", format!("Invalid date: {}", s))),
    }
}

impl SearchQuery {
    /// Validate raw parameters, filling defaults relative to `today`
    pub fn parse(
        params: &SearchParams,
        today: NaiveDate,
        default_nights: i64,
        default_guests: u32,
    ) -> Result<Self, ApiError> {
        let city = params
            .city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::validation("MISSING_CITY", "City parameter is required"))?
            .to_string();

        let checkin = parse_date(params.checkin.as_deref())?.unwrap_or(today);
        let checkout = parse_date(params.checkout.as_deref())?
            .unwrap_or(checkin + Duration::days(default_nights));
        if checkout <= checkin {
            return Err(ApiError::validation(
                "INVALID_DATE_RANGE",
                "Checkout must be after checkin",
            ));
        }

        let guests = match params.guests.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            None => default_guests,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|g| *g > 0)
                .ok_or_else(|| {
                    ApiError::validation("INVALID_GUESTS", "Guests must be a positive integer")
                })?,
        };

        Ok(Self {
            city,
            checkin,
            checkout,
            guests,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowestPrice {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub partner: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHotel {
    hotel_id: String,
    name: String,
    slug: String,
    rating: f64,
    review_count: i64,
    star_rating: i64,
    city: String,
    country: String,
    primary_image: String,
    description: Option<String>,
    property_type: String,
    lowest_price: Option<LowestPrice>,
    offers: Vec<NormalizedOffer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    search_id: String,
    city: String,
    checkin: NaiveDate,
    checkout: NaiveDate,
    guests: u32,
    count: usize,
    hotels: Vec<SearchHotel>,
}

/// Cheapest hotels first; hotels without offers keep their order at the end
fn sort_by_lowest_price(hotels: &mut [SearchHotel]) {
    hotels.sort_by(|a, b| match (&a.lowest_price, &b.lowest_price) {
        (Some(a), Some(b)) => a.amount.cmp(&b.amount),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// GET /api/hotels/search - Hotels in a city with ranked offers
pub async fn search_hotels(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<SearchResponse>, ApiError> {
    let settings = &state.config.search;
    let query = SearchQuery::parse(
        &params,
        Utc::now().date_naive(),
        settings.default_stay_nights,
        settings.default_guests,
    )?;
    let failed = ApiError::storage("SEARCH_ERROR", "Failed to search hotels");

    let partners = match state.store.fetch_active_partners().await {
        Ok(partners) => PartnerDirectory::from_partners(&partners),
        Err(e) => return Err(failed(e)),
    };
    let found = match state
        .store
        .search_hotels(&query.city, settings.max_results)
        .await
    {
        Ok(found) => found,
        Err(e) => return Err(failed(e)),
    };

    let window = RateFilter::checkin_between(
        query.checkin,
        query.checkin + Duration::days(settings.rate_window_days),
    );
    let rates = match try_join_all(
        found
            .iter()
            .map(|d| state.store.fetch_rates_for_hotel(&d.hotel.id, window)),
    )
    .await
    {
        Ok(rates) => rates,
        Err(e) => return Err(failed(e)),
    };

    let mut hotels: Vec<SearchHotel> = found
        .into_iter()
        .zip(rates)
        .map(|(details, rates)| {
            let result = aggregate(&rates, &partners);
            let lowest_price = result.lowest_offer().map(|o| LowestPrice {
                amount: o.total_price,
                currency: o.currency.clone(),
                partner: o.partner_id.clone(),
            });
            let rating = rating(&details);
            let primary_image = primary_image(&details);
            let hotel = details.hotel;

            SearchHotel {
                hotel_id: hotel.id,
                name: hotel.canonical_name,
                slug: hotel.slug,
                rating,
                review_count: hotel.review_count.unwrap_or(0),
                star_rating: hotel.star_rating,
                city: hotel.city,
                country: hotel.country,
                primary_image,
                description: hotel.description,
                property_type: hotel.property_type,
                lowest_price,
                offers: result
                    .into_offers()
                    .into_iter()
                    .map(NormalizedOffer::without_availability)
                    .collect(),
            }
        })
        .collect();
    sort_by_lowest_price(&mut hotels);

    info!(
        city = %query.city,
        checkin = %query.checkin,
        results = hotels.len(),
        "Hotel search"
    );

    let identity = state.identity(&headers);
    state.analytics.track(
        AnalyticsEvent::SearchPerformed {
            city: query.city.clone(),
            checkin: query.checkin.to_string(),
            checkout: query.checkout.to_string(),
            guests: query.guests,
            result_count: hotels.len(),
        },
        identity.user_id().map(str::to_string),
    );

    Ok(Json(SearchResponse {
        search_id: format!("s_{}", Utc::now().timestamp_millis()),
        city: query.city,
        checkin: query.checkin,
        checkout: query.checkout,
        guests: query.guests,
        count: hotels.len(),
        hotels,
    }))
}
