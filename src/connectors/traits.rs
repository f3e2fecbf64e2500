// src/connectors/traits.rs
use crate::connectors::messages::RawSnapshot;
use crate::error::FetchError;
use crate::types::{Interval, Trigger};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Request side of the transport: one raw snapshot per call.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_snapshot(&self, endpoint: &str, interval: &Interval)
        -> Result<RawSnapshot, FetchError>;
}

/// Push side of the transport: payload-less "data changed" events, one topic per
/// instrument.
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn subscribe_topic(&mut self, topic: &str, sender: mpsc::Sender<Trigger>) -> Result<()>;
}
