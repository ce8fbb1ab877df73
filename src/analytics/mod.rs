//! Analytics Module - Fire-and-forget product events
//!
//! Events are captured through an [`AnalyticsSink`]. The [`Analytics`]
//! handle spawns every capture onto the runtime so request handlers never
//! wait on it; failures are logged and dropped.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AnalyticsConfig;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analytics endpoint rejected event with status {0}")]
    Rejected(u16),
}

/// Product event and its properties
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsEvent {
    SearchPerformed {
        city: String,
        checkin: String,
        checkout: String,
        guests: u32,
        result_count: usize,
    },
    HotelViewed {
        hotel_id: String,
        hotel_name: String,
        city: String,
    },
    OfferClicked {
        offer_id: String,
        partner_id: String,
        hotel_id: String,
        price: Option<Decimal>,
        currency: Option<String>,
    },
}

impl AnalyticsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsEvent::SearchPerformed { .. } => "search_performed",
            AnalyticsEvent::HotelViewed { .. } => "hotel_viewed",
            AnalyticsEvent::OfferClicked { .. } => "offer_clicked",
        }
    }

    pub fn properties(&self) -> Map<String, Value> {
        let value = match self {
            AnalyticsEvent::SearchPerformed {
                city,
                checkin,
                checkout,
                guests,
                result_count,
            } => json!({
                "search_city": city,
                "search_checkin": checkin,
                "search_checkout": checkout,
                "search_guests": guests,
                "result_count": result_count,
            }),
            AnalyticsEvent::HotelViewed {
                hotel_id,
                hotel_name,
                city,
            } => json!({
                "hotel_id": hotel_id,
                "hotel_name": hotel_name,
                "city": city,
            }),
            AnalyticsEvent::OfferClicked {
                offer_id,
                partner_id,
                hotel_id,
                price,
                currency,
            } => json!({
                "offer_id": offer_id,
                "partner_id": partner_id,
                "hotel_id": hotel_id,
                "click_price": price.map(|p| p.to_string()),
                "click_currency": currency,
            }),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Event attributed to a user, or to an anonymous visitor
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub event: AnalyticsEvent,
    pub user_id: Option<String>,
}

impl TrackedEvent {
    pub fn new(event: AnalyticsEvent, user_id: Option<String>) -> Self {
        Self { event, user_id }
    }

    /// User id, or `anon_<unix millis>` for anonymous visitors
    pub fn distinct_id(&self) -> String {
        match &self.user_id {
            Some(id) => id.clone(),
            None => format!("anon_{}", Utc::now().timestamp_millis()),
        }
    }
}

/// Destination for analytics events
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn capture(&self, event: &TrackedEvent) -> Result<(), AnalyticsError>;
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl AnalyticsSink for NoopSink {
    async fn capture(&self, _event: &TrackedEvent) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CapturePayload<'a> {
    api_key: &'a str,
    event: &'a str,
    distinct_id: String,
    properties: Map<String, Value>,
}

/// PostHog capture API client
#[derive(Debug, Clone)]
pub struct PostHogSink {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    environment: String,
}

impl PostHogSink {
    pub fn new(
        api_key: impl Into<String>,
        host: &str,
        environment: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AnalyticsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: format!("{}/capture/", host.trim_end_matches('/')),
            environment: environment.into(),
        })
    }

    fn payload<'a>(&'a self, event: &'a TrackedEvent) -> CapturePayload<'a> {
        let mut properties = event.event.properties();
        properties.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
        properties.insert(
            "environment".into(),
            Value::String(self.environment.clone()),
        );

        CapturePayload {
            api_key: &self.api_key,
            event: event.event.name(),
            distinct_id: event.distinct_id(),
            properties,
        }
    }
}

#[async_trait]
impl AnalyticsSink for PostHogSink {
    async fn capture(&self, event: &TrackedEvent) -> Result<(), AnalyticsError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(event))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyticsError::Rejected(status.as_u16()));
        }

        debug!(event = event.event.name(), "Analytics event captured");
        Ok(())
    }
}

/// Cloneable handle that captures events in the background
#[derive(Clone)]
pub struct Analytics {
    sink: Arc<dyn AnalyticsSink>,
}

impl Analytics {
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    /// PostHog when enabled with an API key, otherwise a no-op sink
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, AnalyticsError> {
        match (&config.api_key, config.enabled) {
            (Some(key), true) if !key.is_empty() => {
                let sink = PostHogSink::new(
                    key.clone(),
                    &config.host,
                    config.environment.clone(),
                    Duration::from_millis(config.timeout_ms),
                )?;
                info!(host = %config.host, "PostHog analytics enabled");
                Ok(Self::new(Arc::new(sink)))
            }
            _ => {
                info!("Analytics disabled");
                Ok(Self::disabled())
            }
        }
    }

    /// Capture without waiting; errors are logged at warn
    pub fn track(&self, event: AnalyticsEvent, user_id: Option<String>) {
        let sink = Arc::clone(&self.sink);
        let tracked = TrackedEvent::new(event, user_id);
        tokio::spawn(async move {
            if let Err(e) = sink.capture(&tracked).await {
                warn!(event = tracked.event.name(), error = %e, "Analytics capture failed");
            }
        });
    }
}

impl std::fmt::Debug for Analytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analytics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

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
            Err(AnalyticsError::Rejected(503))
        }
    }

    fn viewed() -> AnalyticsEvent {
        AnalyticsEvent::HotelViewed {
            hotel_id: "h1".into(),
            hotel_name: "Ritz Paris".into(),
            city: "Paris".into(),
        }
    }

    #[test]
    fn test_event_names_and_properties() {
        let search = AnalyticsEvent::SearchPerformed {
            city: "Paris".into(),
            checkin: "2026-11-01".into(),
            checkout: "2026-11-04".into(),
            guests: 2,
            result_count: 3,
        };
        assert_eq!(search.name(), "search_performed");
        let props = search.properties();
        assert_eq!(props["search_city"], "Paris");
        assert_eq!(props["result_count"], 3);

        let click = AnalyticsEvent::OfferClicked {
            offer_id: "o1".into(),
            partner_id: "agoda".into(),
            hotel_id: "h1".into(),
            price: Some(dec!(4300.50)),
            currency: Some("INR".into()),
        };
        assert_eq!(click.name(), "offer_clicked");
        assert_eq!(click.properties()["click_price"], "4300.50");
    }

    #[test]
    fn test_distinct_id() {
        let known = TrackedEvent::new(viewed(), Some("user-7".into()));
        assert_eq!(known.distinct_id(), "user-7");

        let anon = TrackedEvent::new(viewed(), None);
        assert!(anon.distinct_id().starts_with("anon_"));
    }

    #[test]
    fn test_posthog_payload() {
        let sink = PostHogSink::new(
            "phc_test",
            "https://eu.posthog.example/",
            "test",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(sink.endpoint, "https://eu.posthog.example/capture/");

        let tracked = TrackedEvent::new(viewed(), Some("user-7".into()));
        let payload = serde_json::to_value(sink.payload(&tracked)).unwrap();
        assert_eq!(payload["api_key"], "phc_test");
        assert_eq!(payload["event"], "hotel_viewed");
        assert_eq!(payload["distinct_id"], "user-7");
        assert_eq!(payload["properties"]["environment"], "test");
        assert_eq!(payload["properties"]["hotel_name"], "Ritz Paris");
        assert!(payload["properties"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_track_delivers_in_background() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let analytics = Analytics::new(Arc::new(ChannelSink(tx)));

        analytics.track(viewed(), None);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, viewed());
        assert!(received.user_id.is_none());
    }

    #[tokio::test]
    async fn test_track_swallows_failures() {
        let analytics = Analytics::new(Arc::new(FailingSink));
        analytics.track(viewed(), Some("user-1".into()));
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_from_config_without_key_is_disabled() {
        let config = AnalyticsConfig {
            enabled: true,
            api_key: None,
            host: "https://us.i.posthog.com".into(),
            timeout_ms: 1000,
            environment: "test".into(),
        };
        assert!(Analytics::from_config(&config).is_ok());
    }
}
