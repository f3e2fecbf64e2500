// src/core/fetcher.rs
use crate::connectors::messages::RawSnapshot;
use crate::connectors::traits::QuoteSource;
use crate::error::FetchError;
use crate::types::{DailyStatistics, Interval, PricePoint, Snapshot};
use crate::utils::precision::RoundingPolicy;
use std::sync::Arc;

/// Requests snapshots for one instrument and normalizes them per its
/// rounding policy.
pub struct SnapshotFetcher {
    source: Arc<dyn QuoteSource>,
    endpoint: String,
    rounding: RoundingPolicy,
    supported_intervals: Vec<Interval>,
}

impl SnapshotFetcher {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        endpoint: impl Into<String>,
        rounding: RoundingPolicy,
        supported_intervals: Vec<Interval>,
    ) -> Self {
        Self {
            source,
            endpoint: endpoint.into(),
            rounding,
            supported_intervals,
        }
    }

    pub fn supports(&self, interval: &Interval) -> bool {
        self.supported_intervals.contains(interval)
    }

    pub fn supported_intervals(&self) -> &[Interval] {
        &self.supported_intervals
    }

    pub async fn fetch(&self, interval: &Interval) -> Result<Snapshot, FetchError> {
        if !self.supports(interval) {
            return Err(FetchError::UnsupportedInterval(interval.to_string()));
        }
        let raw = self.source.fetch_snapshot(&self.endpoint, interval).await?;
        normalize(raw, self.rounding)
    }
}

/// Maps the series to chart points and applies the rounding policy to the
/// three statistics. The series prices are left untouched.
pub fn normalize(raw: RawSnapshot, rounding: RoundingPolicy) -> Result<Snapshot, FetchError> {
    let series = raw
        .prices
        .iter()
        .map(|point| -> Result<PricePoint, FetchError> {
            Ok(PricePoint {
                at: point.timestamp.to_utc()?,
                price: point.price,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Snapshot {
        series,
        statistics: DailyStatistics {
            high_24h: rounding.apply(raw.high_24h),
            low_24h: rounding.apply(raw.low_24h),
            latest_price: rounding.apply(raw.latest_price),
        },
    })
}
