//! Demo catalogue
//!
//! Partners, hotels, room types, rates and stored offers used by the `seed`
//! binary and local development.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use super::{SqliteStore, StoreResult};
use crate::offers::cancellation_label;
use crate::types::{BookingType, Hotel, HotelImage, Partner, RateRow, RoomType, StoredOffer};

/// Row counts written by [`seed_demo`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub partners: usize,
    pub hotels: usize,
    pub room_types: usize,
    pub rates: usize,
    pub offers: usize,
}

struct DemoRoom {
    name: &'static str,
    prices: &'static [(&'static str, Decimal, Decimal)],
}

struct DemoHotel {
    id: &'static str,
    name: &'static str,
    slug: &'static str,
    address: &'static str,
    city: &'static str,
    country: &'static str,
    property_type: &'static str,
    description: &'static str,
    image: &'static str,
    review_score: f64,
    review_count: i64,
    amenities: &'static [&'static str],
    rooms: &'static [DemoRoom],
}

/// Active partners in priority order
pub fn demo_partners() -> Vec<Partner> {
    [
        ("booking", "Booking.com", "🏨", "https://www.booking.com"),
        ("agoda", "Agoda", "🌐", "https://www.agoda.com"),
        ("expedia", "Expedia", "✈️", "https://www.expedia.com"),
        ("makemytrip", "MakeMyTrip", "🧳", "https://www.makemytrip.com"),
        ("oyo", "OYO", "🏢", "https://www.oyorooms.com"),
        ("goibibo", "Goibibo", "🚀", "https://www.goibibo.com"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (slug, name, logo, base_url))| Partner {
        id: slug.to_string(),
        name: name.to_string(),
        slug: slug.to_string(),
        logo: Some(logo.to_string()),
        booking_type: BookingType::Redirect,
        base_url: Some(base_url.to_string()),
        is_active: true,
        priority: i as i64 + 1,
    })
    .collect()
}

const DEMO_HOTELS: &[DemoHotel] = &[
    DemoHotel {
        id: "3f6c1b0e-8d4a-4c2e-9b1f-2a7d5e8c9f01",
        name: "The Royal Atlantis",
        slug: "the-royal-atlantis-dubai",
        address: "Crescent Rd, The Palm Jumeirah",
        city: "Dubai",
        country: "UAE",
        property_type: "Resort",
        description: "Sky pool, private beaches and chef-led restaurants on the Palm Jumeirah.",
        image: "https://images.unsplash.com/photo-1542314831-068cd1dbfeeb",
        review_score: 4.8,
        review_count: 1240,
        amenities: &["Infinity Pool", "Private Beach", "Spa", "Butler Service"],
        rooms: &[
            DemoRoom {
                name: "King Room Ocean View",
                prices: &[
                    ("booking", dec!(45000), dec!(2250)),
                    ("agoda", dec!(42500), dec!(2125)),
                    ("expedia", dec!(46000), dec!(0)),
                ],
            },
            DemoRoom {
                name: "Palm Suite",
                prices: &[
                    ("booking", dec!(85000), dec!(4250)),
                    ("agoda", dec!(82000), dec!(4100)),
                ],
            },
        ],
    },
    DemoHotel {
        id: "7a2d9c4b-1e5f-4a8b-8c3d-6e9f0a1b2c02",
        name: "Taj Mahal Palace",
        slug: "taj-mahal-palace-mumbai",
        address: "Apollo Bunder",
        city: "Mumbai",
        country: "India",
        property_type: "Heritage",
        description: "A Mumbai landmark hosting kings, dignitaries and celebrities since 1903.",
        image: "https://images.unsplash.com/photo-1629140727571-9b5c6f6267b4",
        review_score: 4.9,
        review_count: 3500,
        amenities: &["Heritage Walk", "Sea View", "Butler Service", "Pool"],
        rooms: &[DemoRoom {
            name: "Palace Wing King",
            prices: &[
                ("booking", dec!(28000), dec!(1400)),
                ("agoda", dec!(26500), dec!(1325)),
                ("makemytrip", dec!(27200), dec!(0)),
            ],
        }],
    },
    DemoHotel {
        id: "c4e8f2a6-5b9d-4f1a-a2b3-8d7c6e5f4a03",
        name: "Ritz Paris",
        slug: "ritz-paris",
        address: "15 Place Vendôme",
        city: "Paris",
        country: "France",
        property_type: "Luxury",
        description: "French art de vivre in the heart of the City of Light.",
        image: "https://images.unsplash.com/photo-1590073242678-cfe2f1610738",
        review_score: 4.9,
        review_count: 980,
        amenities: &["Michelin Dining", "Spa", "Garden", "Historic Bar"],
        rooms: &[DemoRoom {
            name: "Superior Room",
            prices: &[
                ("booking", dec!(120000), dec!(6000)),
                ("hotels_com", dec!(118000), dec!(5900)),
            ],
        }],
    },
    DemoHotel {
        id: "9b1a3c5d-7e2f-4b6a-b8c9-0d1e2f3a4b04",
        name: "Marina Bay Sands",
        slug: "marina-bay-sands-singapore",
        address: "10 Bayfront Ave",
        city: "Singapore",
        country: "Singapore",
        property_type: "Resort",
        description: "Rooftop infinity pool, award-winning dining and shopping.",
        image: "https://images.unsplash.com/photo-1565557623262-b51c2513a641",
        review_score: 4.7,
        review_count: 5200,
        amenities: &["Infinity Pool", "Casino", "SkyPark", "Shopping Mall"],
        rooms: &[DemoRoom {
            name: "Deluxe King",
            prices: &[
                ("booking", dec!(48000), dec!(2400)),
                ("agoda", dec!(47500), dec!(2375)),
                ("trip_com", dec!(46800), dec!(2340)),
            ],
        }],
    },
];

/// Wipe the database and load the demo catalogue.
/// Rates check in `checkin` and stay one night.
pub async fn seed_demo(store: &SqliteStore, checkin: NaiveDate) -> StoreResult<SeedSummary> {
    store.clear().await?;
    let mut summary = SeedSummary::default();

    let partners = demo_partners();
    for partner in &partners {
        store.upsert_partner(partner).await?;
        summary.partners += 1;
    }

    for demo in DEMO_HOTELS {
        store.insert_hotel(&demo_hotel(demo)).await?;
        store
            .add_hotel_image(
                demo.id,
                &HotelImage {
                    image_url: demo.image.to_string(),
                    is_primary: true,
                    display_order: 1,
                },
            )
            .await?;
        for amenity in demo.amenities {
            store.add_amenity(demo.id, amenity).await?;
        }

        for room in demo.rooms {
            let is_suite = room.name.to_lowercase().contains("suite");
            let room_type_id = store
                .insert_room_type(&RoomType {
                    id: 0,
                    hotel_id: demo.id.to_string(),
                    canonical_name: room.name.to_string(),
                    room_class: Some(if is_suite { "Suite" } else { "Standard" }.to_string()),
                    max_guests: Some(if is_suite { 4 } else { 2 }),
                    bed_configuration: Some(
                        if is_suite { "1 King Bed" } else { "1 Queen Bed" }.to_string(),
                    ),
                    room_size_sqft: Some(if is_suite { 850 } else { 450 }),
                })
                .await?;
            summary.room_types += 1;

            for (i, (ota, base, taxes)) in room.prices.iter().enumerate() {
                let deeplink = deep_link(&partners, ota, demo.slug);
                let refundable = i % 2 == 0;
                store
                    .insert_rate(&RateRow {
                        room_type_id,
                        room_type_name: room.name.to_string(),
                        hotel_id: demo.id.to_string(),
                        ota_name: ota.to_string(),
                        base_price: *base,
                        currency: "INR".to_string(),
                        taxes: Some(*taxes),
                        refundable,
                        availability: 5,
                        checkin_date: checkin,
                        checkout_date: checkin + Duration::days(1),
                        booking_reference: deeplink.clone(),
                    })
                    .await?;
                summary.rates += 1;

                if let Some(partner) = partners.iter().find(|p| p.slug == *ota) {
                    store
                        .insert_offer(&StoredOffer {
                            id: uuid::Uuid::new_v4().to_string(),
                            hotel_id: demo.id.to_string(),
                            partner: partner.clone(),
                            room_name: Some(room.name.to_string()),
                            price: *base + *taxes,
                            currency: "INR".to_string(),
                            refundable,
                            cancellation: Some(cancellation_label(refundable).to_string()),
                            deeplink,
                            fetched_at: Utc::now(),
                        })
                        .await?;
                    summary.offers += 1;
                }
            }
        }
        summary.hotels += 1;
    }

    info!(
        partners = summary.partners,
        hotels = summary.hotels,
        rates = summary.rates,
        offers = summary.offers,
        "Demo catalogue seeded"
    );
    Ok(summary)
}

fn demo_hotel(demo: &DemoHotel) -> Hotel {
    Hotel {
        id: demo.id.to_string(),
        canonical_name: demo.name.to_string(),
        normalized_name: demo.name.to_lowercase(),
        slug: demo.slug.to_string(),
        address: demo.address.to_string(),
        city: demo.city.to_string(),
        country: demo.country.to_string(),
        star_rating: 5,
        property_type: demo.property_type.to_string(),
        description: Some(demo.description.to_string()),
        primary_image_url: Some(demo.image.to_string()),
        review_score: Some(demo.review_score),
        review_count: Some(demo.review_count),
        quality_score: Some(95),
    }
}

fn deep_link(partners: &[Partner], ota: &str, hotel_slug: &str) -> String {
    let base = partners
        .iter()
        .find(|p| p.slug == ota)
        .and_then(|p| p.base_url.clone())
        .unwrap_or_else(|| format!("https://www.{}.example", ota));
    format!("{}/hotel/{}", base, hotel_slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offers::aggregate;
    use crate::storage::{HotelStore, RateFilter};
    use crate::types::PartnerDirectory;

    #[tokio::test]
    async fn test_seed_is_repeatable() {
        let store = SqliteStore::in_memory().await.unwrap();
        let checkin = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();

        let first = seed_demo(&store, checkin).await.unwrap();
        let second = seed_demo(&store, checkin).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hotels, 4);
        assert_eq!(first.partners, 6);
        // hotels_com and trip_com have rates but no partner record
        assert_eq!(first.rates, first.offers + 2);
    }

    #[tokio::test]
    async fn test_seeded_hotel_aggregates() {
        let store = SqliteStore::in_memory().await.unwrap();
        let checkin = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        seed_demo(&store, checkin).await.unwrap();

        let partners = store.fetch_active_partners().await.unwrap();
        let directory = PartnerDirectory::from_partners(&partners);
        let rates = store
            .fetch_rates_for_hotel("3f6c1b0e-8d4a-4c2e-9b1f-2a7d5e8c9f01", RateFilter::all())
            .await
            .unwrap();

        let result = aggregate(&rates, &directory);
        assert_eq!(result.len(), 3);
        let lowest = result.lowest_offer().unwrap();
        assert_eq!(lowest.partner_id, "agoda");
        assert_eq!(lowest.total_price, dec!(44625));
        assert_eq!(lowest.partner_display_name, "Agoda");
    }
}
