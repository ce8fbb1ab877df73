//! SQLite-backed hotel store
//!
//! Pooled `sqlx` connection; schema comes from the embedded migrations.
//! Amounts are TEXT columns parsed into `Decimal` on the way out.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};

use super::{HotelStore, RateFilter, RatePin, StoreError, StoreResult};
use crate::offers::partner_rate;
use crate::types::{
    BookingType, ClickRecord, Hotel, HotelDetails, HotelImage, HotelListing, Partner, RateRow,
    RoomType, RoomWithRates, StoredOffer,
};

const HOTEL_COLUMNS: &str = "id, canonical_name, normalized_name, slug, address, city, country, \
     star_rating, property_type, description, primary_image_url, review_score, review_count, \
     quality_score";

#[derive(Debug, sqlx::FromRow)]
struct RateRecord {
    room_type_id: i64,
    room_type_name: String,
    hotel_id: String,
    ota_name: String,
    base_price: String,
    currency: String,
    taxes: Option<String>,
    refundable: bool,
    availability: i64,
    checkin: NaiveDate,
    checkout: NaiveDate,
    booking_url: String,
}

impl TryFrom<RateRecord> for RateRow {
    type Error = StoreError;

    fn try_from(r: RateRecord) -> Result<Self, Self::Error> {
        Ok(RateRow {
            room_type_id: r.room_type_id,
            room_type_name: r.room_type_name,
            hotel_id: r.hotel_id,
            base_price: parse_decimal("room_rates.base_price", &r.base_price)?,
            taxes: r
                .taxes
                .as_deref()
                .map(|t| parse_decimal("room_rates.taxes", t))
                .transpose()?,
            ota_name: r.ota_name,
            currency: r.currency,
            refundable: r.refundable,
            availability: r.availability,
            checkin_date: r.checkin,
            checkout_date: r.checkout,
            booking_reference: r.booking_url,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PartnerRecord {
    id: String,
    name: String,
    slug: String,
    logo: Option<String>,
    booking_type: String,
    base_url: Option<String>,
    is_active: bool,
    priority: i64,
}

impl TryFrom<PartnerRecord> for Partner {
    type Error = StoreError;

    fn try_from(r: PartnerRecord) -> Result<Self, Self::Error> {
        let booking_type =
            BookingType::parse(&r.booking_type).ok_or_else(|| StoreError::InvalidValue {
                column: "partners.booking_type",
                value: r.booking_type.clone(),
            })?;
        Ok(Partner {
            id: r.id,
            name: r.name,
            slug: r.slug,
            logo: r.logo,
            booking_type,
            base_url: r.base_url,
            is_active: r.is_active,
            priority: r.priority,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OfferRecord {
    id: String,
    hotel_id: String,
    room_name: Option<String>,
    price: String,
    currency: String,
    refundable: bool,
    cancellation: Option<String>,
    deeplink: String,
    fetched_at: DateTime<Utc>,
    partner_id: String,
    partner_name: String,
    partner_slug: String,
    partner_logo: Option<String>,
    partner_booking_type: String,
    partner_base_url: Option<String>,
    partner_is_active: bool,
    partner_priority: i64,
}

impl TryFrom<OfferRecord> for StoredOffer {
    type Error = StoreError;

    fn try_from(r: OfferRecord) -> Result<Self, Self::Error> {
        let partner = Partner::try_from(PartnerRecord {
            id: r.partner_id,
            name: r.partner_name,
            slug: r.partner_slug,
            logo: r.partner_logo,
            booking_type: r.partner_booking_type,
            base_url: r.partner_base_url,
            is_active: r.partner_is_active,
            priority: r.partner_priority,
        })?;
        Ok(StoredOffer {
            price: parse_decimal("offers.price", &r.price)?,
            id: r.id,
            hotel_id: r.hotel_id,
            partner,
            room_name: r.room_name,
            currency: r.currency,
            refundable: r.refundable,
            cancellation: r.cancellation,
            deeplink: r.deeplink,
            fetched_at: r.fetched_at,
        })
    }
}

const OFFER_SELECT: &str = "SELECT o.id, o.hotel_id, o.room_name, o.price, o.currency, \
     o.refundable, o.cancellation, o.deeplink, o.fetched_at, \
     p.id AS partner_id, p.name AS partner_name, p.slug AS partner_slug, \
     p.logo AS partner_logo, p.booking_type AS partner_booking_type, \
     p.base_url AS partner_base_url, p.is_active AS partner_is_active, \
     p.priority AS partner_priority \
     FROM offers o JOIN partners p ON p.id = o.partner_id";

fn parse_decimal(column: &'static str, value: &str) -> StoreResult<Decimal> {
    Decimal::from_str(value.trim()).map_err(|_| StoreError::InvalidDecimal {
        column,
        value: value.to_string(),
    })
}

/// Order each room's rates by base price, optionally keeping only the
/// `limit` cheapest. Rates must arrive grouped by room type.
fn order_within_rooms(rates: Vec<RateRow>, limit: Option<usize>) -> Vec<RateRow> {
    let mut out = Vec::with_capacity(rates.len());
    let mut group: Vec<RateRow> = Vec::new();

    let flush = |group: &mut Vec<RateRow>, out: &mut Vec<RateRow>| {
        // Stable: equal prices keep insertion order
        group.sort_by(|a, b| a.base_price.cmp(&b.base_price));
        if let Some(limit) = limit {
            group.truncate(limit);
        }
        out.append(group);
    };

    for rate in rates {
        if group
            .last()
            .is_some_and(|last| last.room_type_id != rate.room_type_id)
        {
            flush(&mut group, &mut out);
        }
        group.push(rate);
    }
    flush(&mut group, &mut out);

    out
}

/// Hotel store over a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!(url, max_connections, "Connected to database");
        Ok(Self { pool })
    }

    /// Private in-memory database, migrated and empty
    pub async fn in_memory() -> StoreResult<Self> {
        // Every connection to :memory: is its own database, so pin one
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Schema migrations applied");
        Ok(())
    }

    /// Delete every row, children first
    pub async fn clear(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "clicks",
            "offers",
            "room_rates",
            "room_types",
            "hotel_amenities",
            "amenities",
            "hotel_images",
            "hotels",
            "partners",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_partner(&self, partner: &Partner) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO partners (id, name, slug, logo, booking_type, base_url, is_active, priority)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                slug = excluded.slug,
                logo = excluded.logo,
                booking_type = excluded.booking_type,
                base_url = excluded.base_url,
                is_active = excluded.is_active,
                priority = excluded.priority
            "#,
        )
        .bind(&partner.id)
        .bind(&partner.name)
        .bind(&partner.slug)
        .bind(&partner.logo)
        .bind(partner.booking_type.as_str())
        .bind(&partner.base_url)
        .bind(partner.is_active)
        .bind(partner.priority)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_hotel(&self, hotel: &Hotel) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO hotels (
                id, canonical_name, normalized_name, slug, address, city, country,
                star_rating, property_type, description, primary_image_url,
                review_score, review_count, quality_score
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&hotel.id)
        .bind(&hotel.canonical_name)
        .bind(&hotel.normalized_name)
        .bind(&hotel.slug)
        .bind(&hotel.address)
        .bind(&hotel.city)
        .bind(&hotel.country)
        .bind(hotel.star_rating)
        .bind(&hotel.property_type)
        .bind(&hotel.description)
        .bind(&hotel.primary_image_url)
        .bind(hotel.review_score)
        .bind(hotel.review_count)
        .bind(hotel.quality_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_hotel_image(&self, hotel_id: &str, image: &HotelImage) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO hotel_images (hotel_id, image_url, is_primary, display_order) VALUES (?, ?, ?, ?)",
        )
        .bind(hotel_id)
        .bind(&image.image_url)
        .bind(image.is_primary)
        .bind(image.display_order)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Link an amenity to a hotel, creating the amenity if needed
    pub async fn add_amenity(&self, hotel_id: &str, name: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO amenities (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO hotel_amenities (hotel_id, amenity_id)
            SELECT ?, id FROM amenities WHERE name = ?
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(hotel_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert a room type and return its id (`room.id` is ignored)
    pub async fn insert_room_type(&self, room: &RoomType) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO room_types (
                hotel_id, canonical_name, room_class, max_guests, bed_configuration, room_size_sqft
            )
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&room.hotel_id)
        .bind(&room.canonical_name)
        .bind(&room.room_class)
        .bind(room.max_guests)
        .bind(&room.bed_configuration)
        .bind(room.room_size_sqft)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Insert a rate for `rate.room_type_id`
    pub async fn insert_rate(&self, rate: &RateRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO room_rates (
                room_type_id, ota_name, checkin, checkout, base_price, taxes,
                currency, booking_url, refundable, availability
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rate.room_type_id)
        .bind(&rate.ota_name)
        .bind(rate.checkin_date)
        .bind(rate.checkout_date)
        .bind(rate.base_price.to_string())
        .bind(rate.taxes.map(|t| t.to_string()))
        .bind(&rate.currency)
        .bind(&rate.booking_reference)
        .bind(rate.refundable)
        .bind(rate.availability)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_offer(&self, offer: &StoredOffer) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO offers (
                id, hotel_id, partner_id, room_name, price, currency,
                refundable, cancellation, deeplink, fetched_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&offer.id)
        .bind(&offer.hotel_id)
        .bind(&offer.partner.id)
        .bind(&offer.room_name)
        .bind(offer.price.to_string())
        .bind(&offer.currency)
        .bind(offer.refundable)
        .bind(&offer.cancellation)
        .bind(&offer.deeplink)
        .bind(offer.fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent clicks first
    pub async fn recent_clicks(&self, limit: i64) -> StoreResult<Vec<ClickRecord>> {
        let rows: Vec<(
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            String,
            String,
            String,
            Option<String>,
            DateTime<Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT id, offer_id, partner_id, user_id, hotel_id, ota, affiliate_link, ip, device, created_at
            FROM clicks
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    offer_id,
                    partner_id,
                    user_id,
                    hotel_id,
                    ota,
                    affiliate_link,
                    ip,
                    device,
                    created_at,
                )| ClickRecord {
                    id,
                    offer_id,
                    partner_id,
                    user_id,
                    hotel_id,
                    ota,
                    affiliate_link,
                    ip,
                    device,
                    created_at,
                },
            )
            .collect())
    }

    async fn load_details(&self, hotel: Hotel) -> StoreResult<HotelDetails> {
        let images = sqlx::query_as::<_, HotelImage>(
            r#"
            SELECT image_url, is_primary, display_order
            FROM hotel_images
            WHERE hotel_id = ?
            ORDER BY display_order, id
            "#,
        )
        .bind(&hotel.id)
        .fetch_all(&self.pool)
        .await?;

        let amenities: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT a.name
            FROM hotel_amenities ha
            JOIN amenities a ON a.id = ha.amenity_id
            WHERE ha.hotel_id = ?
            ORDER BY a.id
            "#,
        )
        .bind(&hotel.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(HotelDetails {
            hotel,
            images,
            amenities,
        })
    }
}

#[async_trait]
impl HotelStore for SqliteStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_active_partners(&self) -> StoreResult<Vec<Partner>> {
        let records = sqlx::query_as::<_, PartnerRecord>(
            r#"
            SELECT id, name, slug, logo, booking_type, base_url, is_active, priority
            FROM partners
            WHERE is_active = 1
            ORDER BY priority, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Partner::try_from).collect()
    }

    async fn fetch_hotel(&self, hotel_id: &str) -> StoreResult<Option<HotelDetails>> {
        let hotel = sqlx::query_as::<_, Hotel>(&format!(
            "SELECT {} FROM hotels WHERE id = ?",
            HOTEL_COLUMNS
        ))
        .bind(hotel_id)
        .fetch_optional(&self.pool)
        .await?;

        match hotel {
            Some(hotel) => Ok(Some(self.load_details(hotel).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_rates_for_hotel(
        &self,
        hotel_id: &str,
        filter: RateFilter,
    ) -> StoreResult<Vec<RateRow>> {
        let records = sqlx::query_as::<_, RateRecord>(
            r#"
            SELECT rr.room_type_id, rt.canonical_name AS room_type_name, rt.hotel_id,
                   rr.ota_name, rr.base_price, rr.currency, rr.taxes, rr.refundable,
                   rr.availability, rr.checkin, rr.checkout, rr.booking_url
            FROM room_rates rr
            JOIN room_types rt ON rt.id = rr.room_type_id
            WHERE rt.hotel_id = ?1
              AND (?2 IS NULL OR rr.checkin >= ?2)
              AND (?3 IS NULL OR rr.checkin <= ?3)
            ORDER BY rt.id, rr.id
            "#,
        )
        .bind(hotel_id)
        .bind(filter.checkin_from)
        .bind(filter.checkin_to)
        .fetch_all(&self.pool)
        .await?;

        let rates = records
            .into_iter()
            .map(RateRow::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        // base_price is TEXT, so ordering by price happens after parsing
        Ok(order_within_rooms(rates, filter.per_room_limit))
    }

    async fn search_hotels(&self, city: &str, limit: usize) -> StoreResult<Vec<HotelDetails>> {
        // SQLite's lower() only folds ASCII, so matching happens here
        let needle = city.trim().to_lowercase();
        let hotels = sqlx::query_as::<_, Hotel>(&format!(
            "SELECT {} FROM hotels ORDER BY canonical_name, id",
            HOTEL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::new();
        for hotel in hotels
            .into_iter()
            .filter(|h| h.city.to_lowercase().contains(&needle))
            .take(limit)
        {
            details.push(self.load_details(hotel).await?);
        }
        Ok(details)
    }

    async fn list_hotels(&self) -> StoreResult<Vec<HotelListing>> {
        let hotels = sqlx::query_as::<_, Hotel>(&format!(
            "SELECT {} FROM hotels ORDER BY canonical_name, id",
            HOTEL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut listings = Vec::with_capacity(hotels.len());
        for hotel in hotels {
            let rooms = sqlx::query_as::<_, RoomType>(
                r#"
                SELECT id, hotel_id, canonical_name, room_class, max_guests,
                       bed_configuration, room_size_sqft
                FROM room_types
                WHERE hotel_id = ?
                ORDER BY id
                "#,
            )
            .bind(&hotel.id)
            .fetch_all(&self.pool)
            .await?;

            let rates = self
                .fetch_rates_for_hotel(&hotel.id, RateFilter::all())
                .await?;

            let rooms = rooms
                .into_iter()
                .map(|room| {
                    let own = rates
                        .iter()
                        .filter(|r| r.room_type_id == room.id)
                        .cloned()
                        .collect();
                    RoomWithRates { room, rates: own }
                })
                .collect();

            listings.push(HotelListing {
                details: self.load_details(hotel).await?,
                rooms,
            });
        }
        Ok(listings)
    }

    async fn fetch_offer(&self, offer_id: &str) -> StoreResult<Option<StoredOffer>> {
        let record = sqlx::query_as::<_, OfferRecord>(&format!("{} WHERE o.id = ?", OFFER_SELECT))
            .bind(offer_id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(StoredOffer::try_from).transpose()
    }

    async fn fetch_hotel_offers(&self, hotel_id: &str) -> StoreResult<Vec<StoredOffer>> {
        let records = sqlx::query_as::<_, OfferRecord>(&format!(
            "{} WHERE o.hotel_id = ? AND p.is_active = 1 ORDER BY o.fetched_at, o.id",
            OFFER_SELECT
        ))
        .bind(hotel_id)
        .fetch_all(&self.pool)
        .await?;

        let mut offers = records
            .into_iter()
            .map(StoredOffer::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        offers.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(offers)
    }

    async fn find_booking_link(
        &self,
        hotel_id: &str,
        ota: &str,
        pin: RatePin,
    ) -> StoreResult<Option<String>> {
        let rates = self
            .fetch_rates_for_hotel(hotel_id, RateFilter::all())
            .await?;

        let pinned: Vec<RateRow> = rates.iter().filter(|r| pin.matches(r)).cloned().collect();
        let rate = match partner_rate(&pinned, ota) {
            Some(rate) => Some(rate),
            None => {
                if !pin.is_empty() {
                    debug!(hotel_id, ota, ?pin, "Pinned rate gone, using partner's best rate");
                }
                partner_rate(&rates, ota)
            }
        };

        Ok(rate.map(|r| r.booking_reference.clone()))
    }

    async fn record_click(&self, click: &ClickRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clicks (
                id, offer_id, partner_id, user_id, hotel_id, ota, affiliate_link, ip, device, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&click.id)
        .bind(&click.offer_id)
        .bind(&click.partner_id)
        .bind(&click.user_id)
        .bind(&click.hotel_id)
        .bind(&click.ota)
        .bind(&click.affiliate_link)
        .bind(&click.ip)
        .bind(&click.device)
        .bind(click.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
