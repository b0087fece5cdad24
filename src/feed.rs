//! Market data collaborator and per-type fetch dispatch.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::types::{Period, WidgetKind};

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldPrice {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

/// Price bars plus their quoting convention (e.g. USD per oz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub data: Vec<GoldPrice>,
    pub currency: String,
    pub unit: String,
}

/// Domestic premium over the converted international price on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumPoint {
    pub date: NaiveDate,
    pub premium_pct: f64,
    pub krx_price: f64,
    pub intl_price_krw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub signal: Signal,
    pub reasons: Vec<String>,
    pub ma5: f64,
    pub ma20: f64,
    pub premium_pct: f64,
    pub current_price: f64,
    pub price_change_pct: f64,
}

/// Data a widget renders.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetData {
    Prices(PriceSeries),
    Premium(Vec<PremiumPoint>),
    Recommendation(Recommendation),
    /// Unknown widget type; nothing to fetch
    Placeholder,
}

/// Recommendations are always computed over one month.
pub const RECOMMENDATION_PERIOD: Period = Period::Month;

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn international_gold(&self, period: Period) -> Result<PriceSeries, FetchError>;

    async fn krx_gold(&self, period: Period) -> Result<PriceSeries, FetchError>;

    async fn kimchi_premium(&self, period: Period) -> Result<Vec<PremiumPoint>, FetchError>;

    async fn gold_recommendation(&self, period: Period) -> Result<Recommendation, FetchError>;
}

/// Fetch the data for one widget, routed by its type.
pub async fn fetch_for(
    source: &dyn MarketDataSource,
    kind: &WidgetKind,
    period: Period,
) -> Result<WidgetData, FetchError> {
    match kind {
        WidgetKind::InternationalGold => source.international_gold(period).await.map(WidgetData::Prices),
        WidgetKind::KrxGold => source.krx_gold(period).await.map(WidgetData::Prices),
        WidgetKind::KimchiPremium => source.kimchi_premium(period).await.map(WidgetData::Premium),
        WidgetKind::GoldRecommendation => source
            .gold_recommendation(RECOMMENDATION_PERIOD)
            .await
            .map(WidgetData::Recommendation),
        WidgetKind::Unknown(tag) => {
            log::debug!("Feed: no data source for widget type '{}'", tag);
            Ok(WidgetData::Placeholder)
        }
    }
}
