//! End-to-end tests for the HTTP API over a seeded in-memory database

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

use stayra::analytics::{Analytics, AnalyticsError, AnalyticsSink, TrackedEvent};
use stayra::api::{create_router, AppState};
use stayra::auth::{Claims, TokenVerifier};
use stayra::config::AppConfig;
use rust_decimal_macros::dec;
use stayra::storage::{seed::seed_demo, HotelStore, RateFilter, SqliteStore};

const DUBAI: &str = "3f6c1b0e-8d4a-4c2e-9b1f-2a7d5e8c9f01";
const MUMBAI: &str = "7a2d9c4b-1e5f-4a8b-8c3d-6e9f0a1b2c02";
const PARIS: &str = "c4e8f2a6-5b9d-4f1a-a2b3-8d7c6e5f4a03";
const SINGAPORE: &str = "9b1a3c5d-7e2f-4b6a-b8c9-0d1e2f3a4b04";
const FALLBACK: &str = "https://stayra.test";
const SECRET: &str = "test-secret";

struct ChannelSink(mpsc::UnboundedSender<TrackedEvent>);

#[async_trait]
impl AnalyticsSink for ChannelSink {
    async fn capture(&self, event: &TrackedEvent) -> Result<(), AnalyticsError> {
        let _ = self.0.send(event.clone());
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl AnalyticsSink for FailingSink {
    async fn capture(&self, _event: &TrackedEvent) -> Result<(), AnalyticsError> {
        Err(AnalyticsError::Rejected(500))
    }
}

struct TestApp {
    router: Router,
    store: SqliteStore,
    events: mpsc::UnboundedReceiver<TrackedEvent>,
}

fn seed_checkin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
}

fn config() -> AppConfig {
    let mut config = AppConfig::defaults().unwrap();
    config.redirect.fallback_url = FALLBACK.to_string();
    config.auth.jwt_secret = Some(SECRET.to_string());
    config
}

async fn seeded_store() -> SqliteStore {
    let store = SqliteStore::in_memory().await.unwrap();
    seed_demo(&store, seed_checkin()).await.unwrap();
    store
}

async fn app() -> TestApp {
    let store = seeded_store().await;
    let (tx, events) = mpsc::unbounded_channel();
    let state = AppState::new(
        config(),
        Arc::new(store.clone()),
        Analytics::new(Arc::new(ChannelSink(tx))),
    );
    TestApp {
        router: create_router(state),
        store,
        events,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, HeaderMap, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "api-tests")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<TrackedEvent>) -> TrackedEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("analytics event not delivered")
        .expect("analytics channel closed")
}

fn location(headers: &HeaderMap) -> &str {
    headers[header::LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn test_hotel_detail_aggregates_offers() {
    let mut app = app().await;
    let (status, _, body) = get(&app.router, &format!("/api/hotels/{}", DUBAI)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hotelId"], DUBAI);
    assert_eq!(body["name"], "The Royal Atlantis");
    assert_eq!(body["rating"], 4.8);
    assert_eq!(body["amenities"].as_array().unwrap().len(), 4);
    assert_eq!(body["images"][0]["isPrimary"], true);

    let offers = body["offers"].as_array().unwrap();
    let partners: Vec<&str> = offers.iter().map(|o| o["partner"].as_str().unwrap()).collect();
    assert_eq!(partners, vec!["agoda", "expedia", "booking"]);
    assert_eq!(offers[0]["partnerName"], "Agoda");
    assert_eq!(offers[0]["roomType"], "King Room Ocean View");
    assert_eq!(offers[0]["totalPrice"], 44625.0);
    assert_eq!(offers[0]["availability"], 5);
    let deeplink = offers[0]["deeplink"].as_str().unwrap();
    assert!(deeplink.starts_with(&format!("/api/partners/agoda/redirect/{}?room=", DUBAI)));
    assert!(deeplink.ends_with("&checkin=2026-11-02"));
    assert_eq!(body["lowestPrice"], 44625.0);

    let event = next_event(&mut app.events).await;
    assert_eq!(event.event.name(), "hotel_viewed");
    assert!(event.user_id.is_none());
}

#[tokio::test]
async fn test_hotel_detail_errors() {
    let app = app().await;

    let (status, _, body) = get(&app.router, "/api/hotels/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_HOTEL_ID");

    let (status, _, body) = get(
        &app.router,
        "/api/hotels/0b7e8f90-1a2b-4c3d-9e8f-abcdefabcdef",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Hotel not found", "code": "HOTEL_NOT_FOUND"}));
}

#[tokio::test]
async fn test_hotel_view_attributed_to_token_user() {
    let mut app = app().await;
    let token = TokenVerifier::new(SECRET).sign(&Claims {
        user_id: Some("user-42".into()),
        ..Claims::default()
    });

    let request = Request::get(format!("/api/hotels/{}", MUMBAI))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        next_event(&mut app.events).await.user_id.as_deref(),
        Some("user-42")
    );

    // A bad token degrades to anonymous instead of failing
    let request = Request::get(format!("/api/hotels/{}", MUMBAI))
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(next_event(&mut app.events).await.user_id.is_none());
}

#[tokio::test]
async fn test_search_orders_hotels_by_lowest_price() {
    let mut app = app().await;
    let (status, _, body) = get(
        &app.router,
        "/api/hotels/search?city=A&checkin=2026-11-01&checkout=2026-11-04&guests=3",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["searchId"].as_str().unwrap().starts_with("s_"));
    assert_eq!(body["checkin"], "2026-11-01");
    assert_eq!(body["checkout"], "2026-11-04");
    assert_eq!(body["guests"], 3);
    assert_eq!(body["count"], 4);

    let ids: Vec<&str> = body["hotels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["hotelId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![MUMBAI, DUBAI, SINGAPORE, PARIS]);

    let first = &body["hotels"][0];
    assert_eq!(
        first["lowestPrice"],
        json!({"amount": 27200.0, "currency": "INR", "partner": "makemytrip"})
    );
    assert!(first["offers"][0].get("availability").is_none());

    // hotels_com has no partner record, so its raw id is shown
    let paris = &body["hotels"][3];
    assert_eq!(paris["offers"][0]["partnerName"], "hotels_com");

    let event = next_event(&mut app.events).await;
    assert_eq!(event.event.name(), "search_performed");
}

#[tokio::test]
async fn test_search_outside_rate_window_has_no_offers() {
    let app = app().await;
    let (status, _, body) = get(
        &app.router,
        "/api/hotels/search?city=dubai&checkin=2026-11-03",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["checkout"], "2026-11-06");
    assert_eq!(body["hotels"][0]["lowestPrice"], Value::Null);
    assert!(body["hotels"][0]["offers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_validation() {
    let app = app().await;

    let (status, _, body) = get(&app.router, "/api/hotels/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_CITY");

    let (_, _, body) = get(&app.router, "/api/hotels/search?city=Paris&checkin=tomorrow").await;
    assert_eq!(body["code"], "INVALID_DATE");

    let (_, _, body) = get(
        &app.router,
        "/api/hotels/search?city=Paris&checkin=2026-11-05&checkout=2026-11-01",
    )
    .await;
    assert_eq!(body["code"], "INVALID_DATE_RANGE");

    let (_, _, body) = get(&app.router, "/api/hotels/search?city=Paris&guests=0").await;
    assert_eq!(body["code"], "INVALID_GUESTS");
}

#[tokio::test]
async fn test_listing_includes_taxes_per_rate() {
    let app = app().await;
    let (status, _, body) = get(&app.router, "/api/hotels").await;

    assert_eq!(status, StatusCode::OK);
    let hotels = body.as_array().unwrap();
    assert_eq!(hotels.len(), 4);

    let dubai = hotels.iter().find(|h| h["id"] == DUBAI).unwrap();
    let rooms = dubai["roomOptions"].as_array().unwrap();
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0]["type"], "King Room Ocean View");

    let totals: Vec<f64> = rooms[0]["prices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["totalPrice"].as_f64().unwrap())
        .collect();
    assert_eq!(totals, vec![44625.0, 46000.0, 47250.0]);
    assert_eq!(
        rooms[0]["prices"][0]["deepLink"],
        "https://www.agoda.com/hotel/the-royal-atlantis-dubai"
    );
}

#[tokio::test]
async fn test_stored_offers_cheapest_first() {
    let app = app().await;
    let (status, _, body) = get(&app.router, &format!("/api/hotels/{}/offers", DUBAI)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hotelId"], DUBAI);
    let offers = body["offers"].as_array().unwrap();
    assert_eq!(offers.len(), 5);
    assert_eq!(offers[0]["partnerId"], "agoda");
    assert_eq!(offers[0]["partnerSlug"], "agoda");
    assert_eq!(offers[0]["price"], 44625.0);
    for pair in offers.windows(2) {
        assert!(pair[0]["price"].as_f64() <= pair[1]["price"].as_f64());
    }

    let (status, _, body) = get(&app.router, "/api/hotels/xyz/offers").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_HOTEL_ID");
}

#[tokio::test]
async fn test_click_returns_deeplink_and_logs() {
    let mut app = app().await;
    let (_, _, body) = get(&app.router, &format!("/api/hotels/{}/offers", MUMBAI)).await;
    let offer = &body["offers"][0];
    let offer_id = offer["id"].as_str().unwrap().to_string();

    let (status, _, body) = post_json(
        &app.router,
        "/api/click",
        json!({"offerId": offer_id, "partnerId": offer["partnerId"]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirectUrl"], offer["deeplink"]);

    let event = next_event(&mut app.events).await;
    assert_eq!(event.event.name(), "offer_clicked");

    let mut clicks = Vec::new();
    for _ in 0..50 {
        clicks = app.store.recent_clicks(10).await.unwrap();
        if !clicks.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].offer_id.as_deref(), Some(offer_id.as_str()));
    assert_eq!(clicks[0].hotel_id, MUMBAI);
    assert_eq!(clicks[0].device.as_deref(), Some("api-tests"));
    assert_eq!(clicks[0].ip, "unknown");
}

#[tokio::test]
async fn test_click_fallbacks() {
    let app = app().await;

    let (status, _, body) = post_json(&app.router, "/api/click", json!({"offerId": "o1"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELDS");

    let (status, _, body) = post_json(
        &app.router,
        "/api/click",
        json!({"offerId": "missing", "partnerId": "agoda"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"redirectUrl": FALLBACK}));
}

#[tokio::test]
async fn test_partner_redirect() {
    let app = app().await;

    let (status, headers, _) = get(
        &app.router,
        &format!("/api/partners/agoda/redirect/{}", DUBAI),
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        location(&headers),
        "https://www.agoda.com/hotel/the-royal-atlantis-dubai"
    );

    let (status, headers, _) = get(
        &app.router,
        &format!("/api/partners/oyo/redirect/{}", DUBAI),
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location(&headers), FALLBACK);
}

#[tokio::test]
async fn test_offer_link_lands_on_the_offered_rate() {
    let app = app().await;
    // Agoda suite rate with a higher base but a lower total than the king room
    let rates = app
        .store
        .fetch_rates_for_hotel(DUBAI, RateFilter::all())
        .await
        .unwrap();
    let mut suite = rates
        .iter()
        .find(|r| r.room_type_name == "Palm Suite" && r.ota_name == "agoda")
        .cloned()
        .unwrap();
    suite.base_price = dec!(43000);
    suite.taxes = Some(dec!(0));
    suite.booking_reference = "https://www.agoda.com/hotel/palm-suite-deal".to_string();
    app.store.insert_rate(&suite).await.unwrap();

    let (_, _, body) = get(&app.router, &format!("/api/hotels/{}", DUBAI)).await;
    let offer = body["offers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["partner"] == "agoda")
        .cloned()
        .unwrap();
    assert_eq!(offer["roomType"], "King Room Ocean View");
    assert_eq!(offer["totalPrice"], 44625.0);

    let (status, headers, _) = get(&app.router, offer["deeplink"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        location(&headers),
        "https://www.agoda.com/hotel/the-royal-atlantis-dubai"
    );

    // Without the pin the partner's offer rate is still chosen by base price
    let (_, headers, _) = get(
        &app.router,
        &format!("/api/partners/agoda/redirect/{}", DUBAI),
    )
    .await;
    assert_eq!(
        location(&headers),
        "https://www.agoda.com/hotel/the-royal-atlantis-dubai"
    );
}

#[tokio::test]
async fn test_direct_redirect() {
    let app = app().await;

    let (status, headers, _) = get(
        &app.router,
        "/api/redirect?hotelId=h1&ota=agoda&url=https%3A%2F%2Fagoda.example%2Fdeal",
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location(&headers), "https://agoda.example/deal");

    let (status, headers, _) = get(&app.router, "/api/redirect?hotelId=h1&ota=agoda").await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location(&headers), FALLBACK);
}

#[tokio::test]
async fn test_booking_stubs_not_implemented() {
    let app = app().await;

    let (status, _, body) = get(&app.router, "/api/bookings/b-1").await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["error"], "Not Implemented");

    for uri in ["/api/bookings/quote", "/api/bookings/confirm"] {
        let (status, _, _) = post_json(&app.router, uri, json!({})).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    tokio_test::assert_ok!(app.store.ping().await);

    let (status, _, body) = get(&app.router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "database": "connected"}));
}

#[tokio::test]
async fn test_analytics_failure_does_not_affect_response() {
    let store = seeded_store().await;
    let state = AppState::new(
        config(),
        Arc::new(store),
        Analytics::new(Arc::new(FailingSink)),
    );
    let router = create_router(state);

    let (status, _, body) = get(&router, &format!("/api/hotels/{}", PARIS)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lowestPrice"], 123900.0);

    let (status, _, body) = get(&router, "/api/hotels/search?city=paris&checkin=2026-11-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}
