// src/core/engine.rs
use crate::core::fetcher::SnapshotFetcher;
use crate::core::stats::TrackedStatistics;
use crate::types::{Interval, InstrumentView, Trigger};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Drives one instrument: every trigger runs fetch -> reconcile -> classify ->
/// publish to completion before the next trigger is taken, so fetches for an
/// instrument never overlap.
pub struct InstrumentEngine {
    id: String,
    name: String,
    fetcher: SnapshotFetcher,
    stats: TrackedStatistics,
    trigger_receiver: mpsc::Receiver<Trigger>,
    interval_sender: Arc<watch::Sender<Interval>>,
    interval_receiver: watch::Receiver<Interval>,
    view_sender: watch::Sender<InstrumentView>,
    fetch_on_start: bool,
}

impl InstrumentEngine {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        fetcher: SnapshotFetcher,
        initial_interval: Interval,
        trigger_receiver: mpsc::Receiver<Trigger>,
        fetch_on_start: bool,
    ) -> Self {
        let (interval_sender, interval_receiver) = watch::channel(initial_interval.clone());
        let stats = TrackedStatistics::new(initial_interval);
        let (view_sender, _) = watch::channel(InstrumentView::default());
        let engine = Self {
            id: id.into(),
            name: name.into(),
            fetcher,
            stats,
            trigger_receiver,
            interval_sender: Arc::new(interval_sender),
            interval_receiver,
            view_sender,
            fetch_on_start,
        };
        engine.publish();
        engine
    }

    pub fn subscribe_view(&self) -> watch::Receiver<InstrumentView> {
        self.view_sender.subscribe()
    }

    /// Latest-wins slot for interval requests from the presentation layer.
    pub fn interval_selector(&self) -> Arc<watch::Sender<Interval>> {
        Arc::clone(&self.interval_sender)
    }

    #[cfg(test)]
    pub fn statistics(&self) -> &TrackedStatistics {
        &self.stats
    }

    fn view(&self) -> InstrumentView {
        InstrumentView {
            instrument: self.id.clone(),
            name: self.name.clone(),
            status: self.stats.status(),
            selected_interval: Some(self.stats.selected_interval.clone()),
            data: self.stats.series.clone(),
            daily_statistics: self.stats.current,
            previous: self.stats.previous,
            trends: self.stats.trends,
            indicators: self.stats.trends.into(),
        }
    }

    fn publish(&self) {
        self.view_sender.send_replace(self.view());
    }

    /// Fetches with the selected interval and applies the result. Failures are
    /// logged and leave every tracked field as it was.
    pub async fn refresh(&mut self) -> bool {
        let interval = self.stats.selected_interval.clone();
        match self.fetcher.fetch(&interval).await {
            Ok(snapshot) => {
                self.stats.apply(snapshot);
                self.publish();
                debug!(
                    "{} [{}] updated: {:?} trends {:?}",
                    self.id, interval, self.stats.current, self.stats.trends
                );
                true
            }
            Err(e) => {
                error!("Fetch {} [{}] failed: {}", self.id, interval, e);
                false
            }
        }
    }

    /// Changes the window and fetches it once. Re-selecting the current window
    /// or an unsupported one does nothing.
    pub async fn select_interval(&mut self, interval: Interval) -> bool {
        if interval == self.stats.selected_interval {
            debug!("{} already on interval {}", self.id, interval);
            return false;
        }
        if !self.fetcher.supports(&interval) {
            warn!(
                "{}: interval {} rejected, supported: {:?}",
                self.id,
                interval,
                self.fetcher.supported_intervals()
            );
            return false;
        }

        info!(
            "{}: interval {} -> {}",
            self.id, self.stats.selected_interval, interval
        );
        self.stats.selected_interval = interval;
        self.publish();
        self.refresh().await
    }

    pub async fn on_data_changed(&mut self) -> bool {
        debug!("{}: push signal received", self.id);
        self.refresh().await
    }

    pub async fn handle_trigger(&mut self, trigger: Trigger) -> bool {
        match trigger {
            Trigger::DataChanged => self.on_data_changed().await,
            Trigger::Poll => self.refresh().await,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!(
            "Engine starting for {} on interval {}",
            self.id, self.stats.selected_interval
        );
        if self.fetch_on_start {
            self.refresh().await;
        }

        loop {
            tokio::select! {
                biased;
                Ok(()) = self.interval_receiver.changed() => {
                    let interval = self.interval_receiver.borrow_and_update().clone();
                    self.select_interval(interval).await;
                }
                trigger = self.trigger_receiver.recv() => match trigger {
                    Some(trigger) => {
                        self.handle_trigger(trigger).await;
                    }
                    None => break,
                },
            }
        }

        info!("Trigger channel closed, engine for {} stopped", self.id);
        Ok(())
    }
}

/// What the presentation layer holds for one instrument: a read side, the
/// interval slot, and the trigger queue for manual refreshes.
///
/// Interval requests overwrite each other until the engine picks one up, so
/// a burst of selections ends in one fetch for the last of them and none is
/// lost to a full queue.
#[derive(Clone)]
pub struct InstrumentHandle {
    pub id: String,
    pub supported_intervals: Vec<Interval>,
    trigger_sender: mpsc::Sender<Trigger>,
    interval_sender: Arc<watch::Sender<Interval>>,
    view_receiver: watch::Receiver<InstrumentView>,
}

impl InstrumentHandle {
    pub fn new(
        id: impl Into<String>,
        supported_intervals: Vec<Interval>,
        trigger_sender: mpsc::Sender<Trigger>,
        interval_sender: Arc<watch::Sender<Interval>>,
        view_receiver: watch::Receiver<InstrumentView>,
    ) -> Self {
        Self {
            id: id.into(),
            supported_intervals,
            trigger_sender,
            interval_sender,
            view_receiver,
        }
    }

    pub fn view(&self) -> InstrumentView {
        self.view_receiver.borrow().clone()
    }

    /// A dropped refresh on a full queue is harmless: the queued ones fetch
    /// the same data.
    pub fn request_refresh(&self) {
        match self.trigger_sender.try_send(Trigger::Poll) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(t)) => {
                warn!("Trigger queue for {} full, dropping {:?}", self.id, t);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Engine for {} is gone", self.id);
            }
        }
    }

    pub fn select_interval(&self, interval: Interval) {
        self.interval_sender.send_replace(interval);
    }

    /// Most recently requested interval, which may not be fetched yet.
    pub fn requested_interval(&self) -> Interval {
        self.interval_sender.borrow().clone()
    }

    /// Moves the selection `step` places through the supported windows,
    /// wrapping at both ends.
    pub fn cycle_interval(&self, step: isize) {
        let len = self.supported_intervals.len() as isize;
        if len == 0 {
            return;
        }
        let current = self.requested_interval();
        let position = self
            .supported_intervals
            .iter()
            .position(|i| *i == current)
            .unwrap_or(0) as isize;
        let next = (position + step).rem_euclid(len) as usize;
        self.select_interval(self.supported_intervals[next].clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::messages::RawSnapshot;
    use crate::connectors::traits::QuoteSource;
    use crate::error::FetchError;
    use crate::types::{DailyStatistics, EngineStatus, PreviousStatistics, TrendClass};
    use crate::utils::precision::RoundingPolicy;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};

    /// Replays scripted responses and records every request.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<RawSnapshot, FetchError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSource {
        fn push_ok(&self, high: &str, low: &str, latest: &str) {
            let body = format!(
                r#"{{"prices": [{{"timestamp": 1700000000000, "price": {latest}}}],
                    "high_24h": {high}, "low_24h": {low}, "latest_price": {latest}}}"#
            );
            let raw = serde_json::from_str(&body).unwrap();
            self.responses.lock().unwrap().push_back(Ok(raw));
        }

        fn push_err(&self) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(FetchError::Status { status: 503 }));
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        async fn fetch_snapshot(
            &self,
            endpoint: &str,
            interval: &Interval,
        ) -> Result<RawSnapshot, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((endpoint.to_string(), interval.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Status { status: 500 }))
        }
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn stats(high: &str, low: &str, latest: &str) -> DailyStatistics {
        DailyStatistics {
            high_24h: d(high),
            low_24h: d(low),
            latest_price: d(latest),
        }
    }

    fn engine_with(
        source: Arc<ScriptedSource>,
        rounding: RoundingPolicy,
    ) -> (InstrumentEngine, mpsc::Sender<Trigger>) {
        let intervals = ["15m", "1h", "4h", "1d"].map(Interval::from).to_vec();
        let fetcher = SnapshotFetcher::new(source, "/api/usd-to-thb", rounding, intervals);
        let (tx, rx) = mpsc::channel(16);
        let engine = InstrumentEngine::new(
            "usd-thb",
            "USD/THB",
            fetcher,
            Interval::from("15m"),
            rx,
            false,
        );
        (engine, tx)
    }

    #[tokio::test]
    async fn two_fetch_scenario_classifies_high_only() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok("100", "90", "95");
        source.push_ok("105", "90", "95");
        let (mut engine, _tx) = engine_with(source.clone(), RoundingPolicy::Source);

        assert!(engine.refresh().await);
        let state = engine.statistics();
        assert_eq!(state.current, Some(stats("100", "90", "95")));
        assert_eq!(state.previous, PreviousStatistics::default());
        assert_eq!(state.trends.high, TrendClass::Neutral);
        assert_eq!(state.trends.high.arrow(), "");

        assert!(engine.refresh().await);
        let state = engine.statistics();
        assert_eq!(state.previous, PreviousStatistics::from(stats("100", "90", "95")));
        assert_eq!(state.current, Some(stats("105", "90", "95")));
        assert_eq!(state.trends.high, TrendClass::Up);
        assert_eq!(state.trends.high.arrow(), "▲");
        assert_eq!(state.trends.low, TrendClass::Neutral);
        assert_eq!(state.trends.latest, TrendClass::Neutral);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok("32.10", "31.90", "32.00");
        source.push_ok("32.20", "31.80", "32.00");
        source.push_err();
        let (mut engine, _tx) = engine_with(source.clone(), RoundingPolicy::Fixed(2));
        let view = engine.subscribe_view();

        engine.refresh().await;
        engine.refresh().await;
        let before = engine.statistics().clone();
        let published = view.borrow().clone();

        assert!(!engine.refresh().await);
        assert_eq!(engine.statistics(), &before);
        assert_eq!(*view.borrow(), published);
        assert_eq!(engine.statistics().status(), EngineStatus::Ready);
    }

    #[tokio::test]
    async fn failure_before_first_success_stays_uninitialized() {
        let source = Arc::new(ScriptedSource::default());
        source.push_err();
        let (mut engine, _tx) = engine_with(source, RoundingPolicy::Source);

        assert!(!engine.refresh().await);
        assert_eq!(engine.statistics().status(), EngineStatus::Uninitialized);
        assert_eq!(engine.statistics().current, None);
    }

    #[tokio::test]
    async fn currency_pair_values_are_stored_rounded() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok("32.456", "32.001", "32.2");
        let (mut engine, _tx) = engine_with(source, RoundingPolicy::Fixed(2));

        engine.refresh().await;
        assert_eq!(engine.statistics().current, Some(stats("32.46", "32.00", "32.20")));
    }

    #[tokio::test]
    async fn interval_change_fetches_once_with_new_interval() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok("1", "1", "1");
        let (mut engine, _tx) = engine_with(source.clone(), RoundingPolicy::Source);

        assert!(engine.select_interval(Interval::from("1h")).await);
        assert_eq!(
            source.calls(),
            vec![("/api/usd-to-thb".to_string(), "1h".to_string())]
        );
        assert_eq!(engine.statistics().selected_interval, Interval::from("1h"));
    }

    #[tokio::test]
    async fn same_or_unsupported_interval_does_not_fetch() {
        let source = Arc::new(ScriptedSource::default());
        let (mut engine, _tx) = engine_with(source.clone(), RoundingPolicy::Source);

        assert!(!engine.select_interval(Interval::from("15m")).await);
        assert!(!engine.select_interval(Interval::from("3y")).await);
        assert!(source.calls().is_empty());
        assert_eq!(engine.statistics().selected_interval, Interval::from("15m"));
    }

    #[tokio::test]
    async fn push_signal_uses_selected_interval() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok("1", "1", "1");
        source.push_ok("2", "1", "1");
        let (mut engine, _tx) = engine_with(source.clone(), RoundingPolicy::Source);

        engine.select_interval(Interval::from("1d")).await;
        engine.on_data_changed().await;

        let intervals: Vec<String> = source.calls().into_iter().map(|(_, i)| i).collect();
        assert_eq!(intervals, vec!["1d", "1d"]);
        assert_eq!(engine.statistics().trends.high, TrendClass::Up);
    }

    #[tokio::test]
    async fn run_applies_pending_interval_then_queued_triggers() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok("100", "90", "95");
        source.push_ok("99", "90", "96");
        source.push_ok("99", "89", "96");
        let (engine, tx) = engine_with(source.clone(), RoundingPolicy::Source);
        let view = engine.subscribe_view();

        engine.interval_selector().send_replace(Interval::from("4h"));
        tx.send(Trigger::DataChanged).await.unwrap();
        tx.send(Trigger::Poll).await.unwrap();
        drop(tx);

        engine.run().await.unwrap();

        let intervals: Vec<String> = source.calls().into_iter().map(|(_, i)| i).collect();
        assert_eq!(intervals, vec!["4h", "4h", "4h"]);

        let published = view.borrow().clone();
        assert_eq!(published.instrument, "usd-thb");
        assert_eq!(published.status, EngineStatus::Ready);
        assert_eq!(published.selected_interval, Some(Interval::from("4h")));
        assert_eq!(published.daily_statistics, Some(stats("99", "89", "96")));
        assert_eq!(published.trends.high, TrendClass::Neutral);
        assert_eq!(published.trends.low, TrendClass::Down);
        assert_eq!(published.trends.latest, TrendClass::Neutral);
        assert_eq!(published.data.len(), 1);
    }

    #[tokio::test]
    async fn published_view_carries_class_strings() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok("100", "90", "95");
        source.push_ok("105", "89", "95");
        let (mut engine, _tx) = engine_with(source, RoundingPolicy::Source);
        let view = engine.subscribe_view();

        assert_eq!(view.borrow().indicators.high_price_class, "price-neutral");
        engine.refresh().await;
        engine.refresh().await;

        let published = view.borrow().clone();
        assert_eq!(published.indicators.high_price_class, "price-up");
        assert_eq!(published.indicators.high_arrow, "▲");
        assert_eq!(published.indicators.low_price_class, "price-down");
        assert_eq!(published.indicators.low_arrow, "▼");
        assert_eq!(published.indicators.latest_price_class, "price-neutral");
        assert_eq!(published.indicators.latest_arrow, "");

        let json = serde_json::to_value(&published).unwrap();
        assert_eq!(json["indicators"]["high_price_class"], "price-up");
        assert_eq!(json["trends"]["low"], "price-down");
    }

    fn handle_for(engine: &InstrumentEngine, trigger_sender: mpsc::Sender<Trigger>) -> InstrumentHandle {
        InstrumentHandle::new(
            "usd-thb",
            ["15m", "1h", "4h", "1d"].map(Interval::from).to_vec(),
            trigger_sender,
            engine.interval_selector(),
            engine.subscribe_view(),
        )
    }

    #[tokio::test]
    async fn handle_cycles_through_supported_intervals() {
        let source = Arc::new(ScriptedSource::default());
        let (engine, _tx) = engine_with(source, RoundingPolicy::Source);
        let (refresh_tx, mut rx) = mpsc::channel(4);
        let handle = handle_for(&engine, refresh_tx);

        handle.cycle_interval(-1);
        assert_eq!(handle.requested_interval(), Interval::from("1d"));
        handle.cycle_interval(-1);
        assert_eq!(handle.requested_interval(), Interval::from("4h"));
        handle.cycle_interval(2);
        assert_eq!(handle.requested_interval(), Interval::from("15m"));

        handle.request_refresh();
        assert_eq!(rx.recv().await, Some(Trigger::Poll));
    }

    #[tokio::test]
    async fn burst_of_interval_selections_is_never_dropped() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok("1", "1", "1");
        let (engine, tx) = engine_with(source.clone(), RoundingPolicy::Source);
        // A queue that is already full must not swallow interval changes.
        let (full_tx, _full_rx) = mpsc::channel(1);
        full_tx.try_send(Trigger::Poll).unwrap();
        let handle = handle_for(&engine, full_tx);
        let view = engine.subscribe_view();

        for _ in 0..250 {
            handle.cycle_interval(1);
        }
        assert_eq!(handle.requested_interval(), Interval::from("4h"));
        drop(tx);

        engine.run().await.unwrap();

        assert_eq!(
            source.calls(),
            vec![("/api/usd-to-thb".to_string(), "4h".to_string())]
        );
        assert_eq!(view.borrow().selected_interval, Some(Interval::from("4h")));
    }
}
