// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window key selecting which series resolution to request ("15m", "1h", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Interval(String);

impl Interval {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Interval {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One chart point: when, and at what price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub at: DateTime<Utc>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    High,
    Low,
    Latest,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::High, Metric::Low, Metric::Latest];

    pub fn label(self) -> &'static str {
        match self {
            Metric::High => "High 24h",
            Metric::Low => "Low 24h",
            Metric::Latest => "Latest",
        }
    }
}

/// The daily triple installed as `current` after a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyStatistics {
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub latest_price: Decimal,
}

impl DailyStatistics {
    pub fn get(&self, metric: Metric) -> Decimal {
        match metric {
            Metric::High => self.high_24h,
            Metric::Low => self.low_24h,
            Metric::Latest => self.latest_price,
        }
    }
}

/// Baseline for trend comparison. Every field is independently nullable and the
/// whole triple starts out empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviousStatistics {
    pub high_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    pub latest_price: Option<Decimal>,
}

impl PreviousStatistics {
    pub fn get(&self, metric: Metric) -> Option<Decimal> {
        match metric {
            Metric::High => self.high_24h,
            Metric::Low => self.low_24h,
            Metric::Latest => self.latest_price,
        }
    }
}

impl From<DailyStatistics> for PreviousStatistics {
    fn from(stats: DailyStatistics) -> Self {
        Self {
            high_24h: Some(stats.high_24h),
            low_24h: Some(stats.low_24h),
            latest_price: Some(stats.latest_price),
        }
    }
}

/// A normalized market read for one instrument and one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub series: Vec<PricePoint>,
    pub statistics: DailyStatistics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendClass {
    #[serde(rename = "price-up")]
    Up,
    #[serde(rename = "price-down")]
    Down,
    #[default]
    #[serde(rename = "price-neutral")]
    Neutral,
}

impl TrendClass {
    pub fn css_class(self) -> &'static str {
        match self {
            TrendClass::Up => "price-up",
            TrendClass::Down => "price-down",
            TrendClass::Neutral => "price-neutral",
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            TrendClass::Up => "▲",
            TrendClass::Down => "▼",
            TrendClass::Neutral => "",
        }
    }
}

/// Last known trend per metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTrends {
    pub high: TrendClass,
    pub low: TrendClass,
    pub latest: TrendClass,
}

impl MetricTrends {
    pub fn get(&self, metric: Metric) -> TrendClass {
        match metric {
            Metric::High => self.high,
            Metric::Low => self.low,
            Metric::Latest => self.latest,
        }
    }

    pub fn set(&mut self, metric: Metric, class: TrendClass) {
        match metric {
            Metric::High => self.high = class,
            Metric::Low => self.low = class,
            Metric::Latest => self.latest = class,
        }
    }
}

/// Display strings per metric: color class and arrow glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendIndicators {
    pub high_price_class: &'static str,
    pub low_price_class: &'static str,
    pub latest_price_class: &'static str,
    pub high_arrow: &'static str,
    pub low_arrow: &'static str,
    pub latest_arrow: &'static str,
}

impl From<MetricTrends> for TrendIndicators {
    fn from(trends: MetricTrends) -> Self {
        Self {
            high_price_class: trends.high.css_class(),
            low_price_class: trends.low.css_class(),
            latest_price_class: trends.latest.css_class(),
            high_arrow: trends.high.arrow(),
            low_arrow: trends.low.arrow(),
            latest_arrow: trends.latest.arrow(),
        }
    }
}

impl Default for TrendIndicators {
    fn default() -> Self {
        MetricTrends::default().into()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    #[default]
    Uninitialized,
    Ready,
}

/// Everything the presentation layer may read about one instrument. Published as a
/// whole after each reconciliation, never field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentView {
    pub instrument: String,
    pub name: String,
    pub status: EngineStatus,
    pub selected_interval: Option<Interval>,
    pub data: Vec<PricePoint>,
    pub daily_statistics: Option<DailyStatistics>,
    pub previous: PreviousStatistics,
    pub trends: MetricTrends,
    pub indicators: TrendIndicators,
}

/// Queued reasons for an instrument engine to refetch. Interval changes travel
/// separately, see `InstrumentHandle`.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    DataChanged,
    Poll,
}
