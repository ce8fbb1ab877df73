//! Storage Module
//!
//! Read access to the hotel catalogue, partner rates and stored offers, plus
//! click persistence. Handlers only see the [`HotelStore`] trait; the SQLite
//! implementation lives in [`sqlite`].

pub mod seed;
mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{ClickRecord, HotelDetails, HotelListing, Partner, RateRow, StoredOffer};

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("invalid decimal in {column}: {value:?}")]
    InvalidDecimal { column: &'static str, value: String },

    #[error("invalid value in {column}: {value:?}")]
    InvalidValue { column: &'static str, value: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Restricts which rates are returned for a hotel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateFilter {
    /// Earliest check-in date (inclusive)
    pub checkin_from: Option<NaiveDate>,
    /// Latest check-in date (inclusive)
    pub checkin_to: Option<NaiveDate>,
    /// Keep only the N cheapest rates of each room type
    pub per_room_limit: Option<usize>,
}

impl RateFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn checkin_between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            checkin_from: Some(from),
            checkin_to: Some(to),
            per_room_limit: None,
        }
    }

    pub fn cheapest_per_room(limit: usize) -> Self {
        Self {
            per_room_limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Narrows a partner redirect to the rate an offer was built from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatePin {
    pub room_type_id: Option<i64>,
    pub checkin: Option<NaiveDate>,
}

impl RatePin {
    fn matches(&self, rate: &RateRow) -> bool {
        self.room_type_id.map_or(true, |id| id == rate.room_type_id)
            && self.checkin.map_or(true, |d| d == rate.checkin_date)
    }

    pub fn is_empty(&self) -> bool {
        self.room_type_id.is_none() && self.checkin.is_none()
    }
}

/// Storage reader and click sink used by the API handlers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HotelStore: Send + Sync {
    /// Cheap connectivity check
    async fn ping(&self) -> StoreResult<()>;

    /// Partners currently marked active, by priority
    async fn fetch_active_partners(&self) -> StoreResult<Vec<Partner>>;

    /// Hotel with images and amenities
    async fn fetch_hotel(&self, hotel_id: &str) -> StoreResult<Option<HotelDetails>>;

    /// Rates of every room type of a hotel, in room order and cheapest
    /// base price first within a room
    async fn fetch_rates_for_hotel(
        &self,
        hotel_id: &str,
        filter: RateFilter,
    ) -> StoreResult<Vec<RateRow>>;

    /// Hotels whose city contains `city` (case-insensitive)
    async fn search_hotels(&self, city: &str, limit: usize) -> StoreResult<Vec<HotelDetails>>;

    /// Every hotel with its rooms and raw rates
    async fn list_hotels(&self) -> StoreResult<Vec<HotelListing>>;

    /// Stored offer by id
    async fn fetch_offer(&self, offer_id: &str) -> StoreResult<Option<StoredOffer>>;

    /// Stored offers of a hotel from active partners, cheapest first
    async fn fetch_hotel_offers(&self, hotel_id: &str) -> StoreResult<Vec<StoredOffer>>;

    /// Deep link of the rate a partner's offer for a hotel is built from
    async fn find_booking_link(
        &self,
        hotel_id: &str,
        ota: &str,
        pin: RatePin,
    ) -> StoreResult<Option<String>>;

    /// Persist an outbound click
    async fn record_click(&self, click: &ClickRecord) -> StoreResult<()>;
}
