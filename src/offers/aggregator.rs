//! Offer Aggregator - Collapses partner rates into ranked offers
//!
//! Groups a hotel's rates by partner, keeps the cheapest rate of each
//! partner (first seen wins ties) and ranks the resulting offers by total
//! price. Grouping follows first-seen order so output never depends on hash
//! iteration order.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use super::{cancellation_label, tracking_route};
use crate::types::{PartnerDirectory, RateRow};

/// Where an offer sends the user on click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectMode {
    /// Partner deep link from the rate row
    Direct,
    /// Internal tracking route that logs the click before redirecting
    #[default]
    Tracked,
}

/// Best offer of one partner for a hotel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedOffer {
    #[serde(rename = "partner")]
    pub partner_id: String,
    #[serde(rename = "partnerName")]
    pub partner_display_name: String,
    #[serde(rename = "roomType")]
    pub room_type_label: String,
    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub taxes: Decimal,
    #[serde(rename = "totalPrice", with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(rename = "cancellation")]
    pub cancellation_label: String,
    pub refundable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<i64>,
    #[serde(rename = "deeplink")]
    pub redirect_target: String,
}

impl NormalizedOffer {
    /// Same offer without the availability count
    pub fn without_availability(self) -> Self {
        Self {
            availability: None,
            ..self
        }
    }
}

/// Ranked offers for one hotel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateResult {
    offers: Vec<NormalizedOffer>,
}

impl AggregateResult {
    /// Offers ascending by total price
    pub fn offers(&self) -> &[NormalizedOffer] {
        &self.offers
    }

    /// Cheapest offer, if any
    pub fn lowest_offer(&self) -> Option<&NormalizedOffer> {
        self.offers.first()
    }

    /// Total price of the cheapest offer
    pub fn lowest_price(&self) -> Option<Decimal> {
        self.lowest_offer().map(|o| o.total_price)
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn into_offers(self) -> Vec<NormalizedOffer> {
        self.offers
    }
}

/// Aggregates rates against a partner directory
pub struct OfferAggregator<'a> {
    partners: &'a PartnerDirectory,
    redirect: RedirectMode,
}

impl<'a> OfferAggregator<'a> {
    pub fn new(partners: &'a PartnerDirectory) -> Self {
        Self {
            partners,
            redirect: RedirectMode::default(),
        }
    }

    pub fn with_redirect(mut self, redirect: RedirectMode) -> Self {
        self.redirect = redirect;
        self
    }

    /// Reduce rates to one ranked offer per partner
    pub fn aggregate(&self, rows: &[RateRow]) -> AggregateResult {
        let mut offers: Vec<NormalizedOffer> = representatives(rows)
            .into_iter()
            .map(|row| self.normalize(row))
            .collect();

        // sort_by is stable: equal totals keep partner encounter order
        offers.sort_by(|a, b| a.total_price.cmp(&b.total_price));

        AggregateResult { offers }
    }

    fn normalize(&self, row: &RateRow) -> NormalizedOffer {
        let taxes = row.taxes.unwrap_or(Decimal::ZERO);
        NormalizedOffer {
            partner_id: row.ota_name.clone(),
            partner_display_name: self.partners.display_name(&row.ota_name).to_string(),
            room_type_label: row.room_type_name.clone(),
            base_price: row.base_price,
            currency: row.currency.clone(),
            taxes,
            total_price: row.base_price + taxes,
            cancellation_label: cancellation_label(row.refundable).to_string(),
            refundable: row.refundable,
            availability: Some(row.availability),
            redirect_target: self.redirect_target(row),
        }
    }

    fn redirect_target(&self, row: &RateRow) -> String {
        match self.redirect {
            RedirectMode::Direct => row.booking_reference.clone(),
            RedirectMode::Tracked => tracking_route(row),
        }
    }
}

/// Cheapest rate of each partner in first-seen partner order.
/// Ties on base price keep the earlier row.
fn representatives(rows: &[RateRow]) -> Vec<&RateRow> {
    let mut best: Vec<&RateRow> = Vec::new();
    let mut slot_by_partner: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        match slot_by_partner.get(row.ota_name.as_str()) {
            Some(&slot) => {
                if row.base_price < best[slot].base_price {
                    best[slot] = row;
                }
            }
            None => {
                slot_by_partner.insert(row.ota_name.as_str(), best.len());
                best.push(row);
            }
        }
    }

    best
}

/// The rate an aggregated offer of `ota` is built from
pub fn partner_rate<'r>(rows: &'r [RateRow], ota: &str) -> Option<&'r RateRow> {
    representatives(rows)
        .into_iter()
        .find(|row| row.ota_name == ota)
}

/// Reduce rates to ranked offers using tracked redirect targets
pub fn aggregate(rows: &[RateRow], partners: &PartnerDirectory) -> AggregateResult {
    OfferAggregator::new(partners).aggregate(rows)
}

/// Unaggregated per-rate price projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLine {
    pub ota: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub currency: String,
    pub deep_link: String,
}

/// Project a single rate into a price line
pub fn price_line(row: &RateRow) -> PriceLine {
    PriceLine {
        ota: row.ota_name.clone(),
        total_price: row.total_price(),
        currency: row.currency.clone(),
        deep_link: row.booking_reference.clone(),
    }
}
