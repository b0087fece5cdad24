use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Storage-assigned widget identity.
pub type WidgetId = i64;

/// Chart period selectable per widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Period {
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1w")]
    Week,
    #[default]
    #[serde(rename = "1m")]
    Month,
    #[serde(rename = "1y")]
    Year,
    #[serde(rename = "3y")]
    ThreeYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Year,
        Period::ThreeYears,
        Period::FiveYears,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "1d",
            Period::Week => "1w",
            Period::Month => "1m",
            Period::Year => "1y",
            Period::ThreeYears => "3y",
            Period::FiveYears => "5y",
        }
    }

    /// Label for the period selector
    pub fn label(&self) -> &'static str {
        match self {
            Period::Day => "1 day",
            Period::Week => "1 week",
            Period::Month => "1 month",
            Period::Year => "1 year",
            Period::ThreeYears => "3 years",
            Period::FiveYears => "5 years",
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown period: {}", s))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Widget kind. Unrecognised tags from storage are kept verbatim and
/// rendered as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetKind {
    InternationalGold,
    KrxGold,
    KimchiPremium,
    GoldRecommendation,
    Unknown(String),
}

impl WidgetKind {
    pub fn as_str(&self) -> &str {
        match self {
            WidgetKind::InternationalGold => "international_gold",
            WidgetKind::KrxGold => "krx_gold",
            WidgetKind::KimchiPremium => "kimchi_premium",
            WidgetKind::GoldRecommendation => "gold_recommendation",
            WidgetKind::Unknown(tag) => tag,
        }
    }

    /// Display label, also used as the default widget name
    pub fn label(&self) -> &'static str {
        match self {
            WidgetKind::InternationalGold => "International gold (USD/oz)",
            WidgetKind::KrxGold => "KRX gold (KRW/g)",
            WidgetKind::KimchiPremium => "Kimchi premium",
            WidgetKind::GoldRecommendation => "Buy/sell recommendation",
            WidgetKind::Unknown(_) => "Default widget",
        }
    }

    /// Recommendation panels have no period selector.
    pub fn has_period_selector(&self) -> bool {
        !matches!(
            self,
            WidgetKind::GoldRecommendation | WidgetKind::Unknown(_)
        )
    }
}

impl From<String> for WidgetKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "international_gold" => WidgetKind::InternationalGold,
            "krx_gold" => WidgetKind::KrxGold,
            "kimchi_premium" => WidgetKind::KimchiPremium,
            "gold_recommendation" => WidgetKind::GoldRecommendation,
            _ => WidgetKind::Unknown(tag),
        }
    }
}

impl From<&str> for WidgetKind {
    fn from(tag: &str) -> Self {
        WidgetKind::from(tag.to_string())
    }
}

impl From<WidgetKind> for String {
    fn from(kind: WidgetKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque per-widget settings. Only `period` is interpreted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetConfig(pub serde_json::Map<String, serde_json::Value>);

impl WidgetConfig {
    const PERIOD_KEY: &'static str = "period";

    pub fn with_period(period: Period) -> Self {
        let mut map = serde_json::Map::new();
        map.insert(
            Self::PERIOD_KEY.to_string(),
            serde_json::Value::String(period.as_str().to_string()),
        );
        Self(map)
    }

    /// Stored default period, ignoring values that do not parse.
    pub fn period(&self) -> Option<Period> {
        self.0
            .get(Self::PERIOD_KEY)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A widget's rectangle on the grid, in cell units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    /// Stable key derived from the widget id (`widget_{id}`)
    pub i: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rectangle {
    pub fn new(key: impl Into<String>, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            i: key.into(),
            x,
            y,
            w,
            h,
        }
    }

    pub fn key(&self) -> &str {
        &self.i
    }

    /// First column to the right of this rectangle
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    /// First row below this rectangle
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn overlaps(&self, other: &Rectangle) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.i = key.into();
        self
    }
}

/// Persisted widget record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: WidgetId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: WidgetConfig,
    pub layout: Rectangle,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Widget {
    pub fn key(&self) -> String {
        crate::grid::widget_key(self.id)
    }

    /// Period the widget starts with when mounted
    pub fn initial_period(&self, fallback: Period) -> Period {
        self.config.period().unwrap_or(fallback)
    }
}

// Storage sends `"config": null` for widgets created without settings.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Create request sent to storage. Carries the full initial rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    #[serde(default, skip_serializing_if = "WidgetConfig::is_empty")]
    pub config: WidgetConfig,
    pub layout: Rectangle,
}

/// Partial update. Only name and type are editable through the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<WidgetKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_round_trips_verbatim() {
        let kind: WidgetKind = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(kind, WidgetKind::Unknown("default".into()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"default\"");
        assert_eq!(kind.label(), "Default widget");
    }

    #[test]
    fn test_known_kind_parses() {
        assert_eq!(WidgetKind::from("krx_gold"), WidgetKind::KrxGold);
        assert!(!WidgetKind::GoldRecommendation.has_period_selector());
        assert!(WidgetKind::KimchiPremium.has_period_selector());
    }

    #[test]
    fn test_config_period() {
        let config = WidgetConfig::with_period(Period::Year);
        assert_eq!(config.period(), Some(Period::Year));

        let bogus: WidgetConfig = serde_json::from_str(r#"{"period": "2q"}"#).unwrap();
        assert_eq!(bogus.period(), None);
        assert!(WidgetConfig::default().is_empty());
    }

    #[test]
    fn test_widget_record_deserializes_storage_shape() {
        let json = r#"{
            "id": 3,
            "name": "Gold",
            "type": "international_gold",
            "config": {"period": "1w"},
            "layout": {"i": "widget_3", "x": 0, "y": 0, "w": 3, "h": 3},
            "created_at": "2026-01-02T03:04:05Z",
            "updated_at": null
        }"#;
        let widget: Widget = serde_json::from_str(json).unwrap();
        assert_eq!(widget.kind, WidgetKind::InternationalGold);
        assert_eq!(widget.initial_period(Period::Month), Period::Week);
        assert_eq!(widget.key(), "widget_3");
        assert_eq!(widget.layout.bottom(), 3);
    }

    #[test]
    fn test_null_config_defaults_to_empty() {
        let json = r#"{
            "id": 1, "name": "n", "type": "krx_gold", "config": null,
            "layout": {"i": "widget_1", "x": 0, "y": 0, "w": 1, "h": 2},
            "created_at": "2026-01-02T03:04:05Z"
        }"#;
        let widget: Widget = serde_json::from_str(json).unwrap();
        assert!(widget.config.is_empty());
        assert_eq!(widget.updated_at, None);
    }

    #[test]
    fn test_overlap() {
        let a = Rectangle::new("a", 0, 0, 3, 3);
        let b = Rectangle::new("b", 3, 0, 3, 3);
        let c = Rectangle::new("c", 2, 2, 2, 2);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("3y".parse::<Period>(), Ok(Period::ThreeYears));
        assert!("7d".parse::<Period>().is_err());
        assert_eq!(Period::default().to_string(), "1m");
    }
}
