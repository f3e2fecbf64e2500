// src/core/stats.rs
use crate::core::trend::update_trends;
use crate::types::{
    DailyStatistics, EngineStatus, Interval, MetricTrends, PreviousStatistics, PricePoint,
    Snapshot,
};

/// Per-instrument state kept for the lifetime of a dashboard session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedStatistics {
    pub selected_interval: Interval,
    pub series: Vec<PricePoint>,
    pub current: Option<DailyStatistics>,
    pub previous: PreviousStatistics,
    pub trends: MetricTrends,
}

impl TrackedStatistics {
    pub fn new(selected_interval: Interval) -> Self {
        Self {
            selected_interval,
            series: Vec::new(),
            current: None,
            previous: PreviousStatistics::default(),
            trends: MetricTrends::default(),
        }
    }

    pub fn status(&self) -> EngineStatus {
        match self.current {
            Some(_) => EngineStatus::Ready,
            None => EngineStatus::Uninitialized,
        }
    }

    /// Shifts `current` into `previous`, then installs the snapshot. The order
    /// matters: classification compares against the pre-update triple.
    pub fn reconcile(&mut self, snapshot: Snapshot) {
        self.previous = self
            .current
            .map(PreviousStatistics::from)
            .unwrap_or_default();
        self.current = Some(snapshot.statistics);
        self.series = snapshot.series;
    }

    pub fn classify(&mut self) {
        update_trends(&mut self.trends, self.current.as_ref(), &self.previous);
    }

    /// Reconcile and classify as one step; callers never observe the state
    /// between the two.
    pub fn apply(&mut self, snapshot: Snapshot) {
        self.reconcile(snapshot);
        self.classify();
    }
}
