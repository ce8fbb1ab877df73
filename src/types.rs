//! Core types used throughout Stayra
//!
//! Defines the rate, partner, hotel and click structures shared by the
//! storage layer, the offer aggregator and the API handlers.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One partner rate for a room type over a stay date range
#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    pub room_type_id: i64,
    /// Canonical room type name, used as the offer's room label
    pub room_type_name: String,
    pub hotel_id: String,
    /// Partner identifier (slug)
    pub ota_name: String,
    pub base_price: Decimal,
    /// ISO 4217 code
    pub currency: String,
    pub taxes: Option<Decimal>,
    pub refundable: bool,
    pub availability: i64,
    pub checkin_date: NaiveDate,
    pub checkout_date: NaiveDate,
    /// Partner deep link
    pub booking_reference: String,
}

impl RateRow {
    /// Base price plus taxes (missing taxes count as zero)
    pub fn total_price(&self) -> Decimal {
        self.base_price + self.taxes.unwrap_or(Decimal::ZERO)
    }
}

/// How a partner books: redirect to the partner site or a direct API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    Redirect,
    Api,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Redirect => "redirect",
            BookingType::Api => "api",
        }
    }

    /// Parse from the stored column value
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redirect" => Some(BookingType::Redirect),
            "api" => Some(BookingType::Api),
            _ => None,
        }
    }
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partner (OTA) registered with the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub logo: Option<String>,
    pub booking_type: BookingType,
    pub base_url: Option<String>,
    pub is_active: bool,
    pub priority: i64,
}

/// Active partner slug -> display name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartnerDirectory {
    names: HashMap<String, String>,
}

impl PartnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from partners, skipping inactive ones
    pub fn from_partners<'a>(partners: impl IntoIterator<Item = &'a Partner>) -> Self {
        let names = partners
            .into_iter()
            .filter(|p| p.is_active)
            .map(|p| (p.slug.clone(), p.name.clone()))
            .collect();
        Self { names }
    }

    pub fn insert(&mut self, slug: impl Into<String>, name: impl Into<String>) {
        self.names.insert(slug.into(), name.into());
    }

    pub fn get(&self, slug: &str) -> Option<&str> {
        self.names.get(slug).map(String::as_str)
    }

    /// Display name for a partner, falling back to the raw identifier
    pub fn display_name<'a>(&'a self, slug: &'a str) -> &'a str {
        self.get(slug).unwrap_or(slug)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PartnerDirectory {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Canonical hotel record
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Hotel {
    pub id: String,
    pub canonical_name: String,
    pub normalized_name: String,
    pub slug: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub star_rating: i64,
    pub property_type: String,
    pub description: Option<String>,
    pub primary_image_url: Option<String>,
    pub review_score: Option<f64>,
    pub review_count: Option<i64>,
    pub quality_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct HotelImage {
    pub image_url: String,
    pub is_primary: bool,
    pub display_order: i64,
}

/// Hotel with its images and amenity names
#[derive(Debug, Clone, PartialEq)]
pub struct HotelDetails {
    pub hotel: Hotel,
    pub images: Vec<HotelImage>,
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RoomType {
    pub id: i64,
    pub hotel_id: String,
    pub canonical_name: String,
    pub room_class: Option<String>,
    pub max_guests: Option<i64>,
    pub bed_configuration: Option<String>,
    pub room_size_sqft: Option<i64>,
}

/// Room type with every stored rate for it
#[derive(Debug, Clone, PartialEq)]
pub struct RoomWithRates {
    pub room: RoomType,
    pub rates: Vec<RateRow>,
}

/// Hotel with its rooms, as listed by the browse endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct HotelListing {
    pub details: HotelDetails,
    pub rooms: Vec<RoomWithRates>,
}

/// Offer captured from a partner and stored for click attribution
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOffer {
    pub id: String,
    pub hotel_id: String,
    pub partner: Partner,
    pub room_name: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub refundable: bool,
    pub cancellation: Option<String>,
    pub deeplink: String,
    pub fetched_at: DateTime<Utc>,
}

/// Outbound click to a partner site
#[derive(Debug, Clone, PartialEq)]
pub struct ClickRecord {
    pub id: String,
    pub offer_id: Option<String>,
    pub partner_id: Option<String>,
    pub user_id: Option<String>,
    pub hotel_id: String,
    pub ota: String,
    pub affiliate_link: String,
    pub ip: String,
    pub device: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClickRecord {
    pub fn new(hotel_id: impl Into<String>, ota: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            offer_id: None,
            partner_id: None,
            user_id: None,
            hotel_id: hotel_id.into(),
            ota: ota.into(),
            affiliate_link: link.into(),
            ip: "unknown".to_string(),
            device: None,
            created_at: Utc::now(),
        }
    }
}
