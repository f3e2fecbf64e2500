// src/core/trend.rs
use crate::types::{DailyStatistics, Metric, MetricTrends, PreviousStatistics, TrendClass};
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Direction of `new` relative to `old`, or `None` when either side is
/// missing. Exact comparison, no tolerance.
pub fn classify(old: Option<Decimal>, new: Option<Decimal>) -> Option<TrendClass> {
    let (old, new) = (old?, new?);
    let class = match new.cmp(&old) {
        Ordering::Greater => TrendClass::Up,
        Ordering::Less => TrendClass::Down,
        Ordering::Equal => TrendClass::Neutral,
    };
    Some(class)
}

/// Re-derives each metric's trend independently. A metric without a usable
/// baseline keeps its last known trend.
pub fn update_trends(
    trends: &mut MetricTrends,
    current: Option<&DailyStatistics>,
    previous: &PreviousStatistics,
) {
    for metric in Metric::ALL {
        let new = current.map(|stats| stats.get(metric));
        if let Some(class) = classify(previous.get(metric), new) {
            trends.set(metric, class);
        }
    }
}
