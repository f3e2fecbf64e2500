// src/connectors/http.rs
use crate::connectors::messages::RawSnapshot;
use crate::connectors::traits::QuoteSource;
use crate::error::{FetchError, MalformedPayloadError};
use crate::types::Interval;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// REST side of the quote API. One client is shared by every instrument.
pub struct HttpQuoteClient {
    http_client: Client,
    base_rest_url: Url,
}

impl HttpQuoteClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_rest_url: Url::parse(base_url)?,
        })
    }

    fn snapshot_url(&self, endpoint: &str, interval: &Interval) -> Result<Url, FetchError> {
        let mut url = self.base_rest_url.join(endpoint)?;
        let query = serde_urlencoded::to_string(&[("interval", interval.as_str())])?;
        url.set_query(Some(&query));
        Ok(url)
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteClient {
    async fn fetch_snapshot(
        &self,
        endpoint: &str,
        interval: &Interval,
    ) -> Result<RawSnapshot, FetchError> {
        let url = self.snapshot_url(endpoint, interval)?;
        debug!("GET {}", url);

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_snapshot(&body)
    }
}

fn parse_snapshot(body: &str) -> Result<RawSnapshot, FetchError> {
    if body.trim().is_empty() {
        return Err(MalformedPayloadError::EmptyBody.into());
    }
    let raw = serde_json::from_str::<RawSnapshot>(body).map_err(MalformedPayloadError::from)?;
    Ok(raw)
}
