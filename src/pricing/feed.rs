use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::PriceFeedSettings;
use crate::error::ValuationError;

/// One entry of the feed response, e.g. `{"usd": 3012.4, "usd_24h_change": -1.2}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedQuote {
    /// Absent when the feed does not know the id
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub usd_24h_change: Option<f64>,
    #[serde(default)]
    pub last_updated_at: Option<i64>,
}

/// Feed response keyed by feed id.
pub type FeedPrices = HashMap<String, FeedQuote>;

/// External USD spot price source.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_prices(&self, ids: &[String]) -> Result<FeedPrices, ValuationError>;
}

/// CoinGecko-style `simple/price` endpoint.
pub struct HttpPriceFeed {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpPriceFeed {
    pub fn new(settings: &PriceFeedSettings) -> Result<Self, ValuationError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| ValuationError::Config(format!("price_feed.base_url: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ValuationError::Config(format!("price feed client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
        })
    }

    fn request_url(&self, ids: &[String]) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("ids", &ids.join(","))
            .append_pair("vs_currencies", "usd")
            .append_pair("include_24hr_change", "true")
            .append_pair("include_last_updated_at", "true");
        url
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch_prices(&self, ids: &[String]) -> Result<FeedPrices, ValuationError> {
        let mut request = self.client.get(self.request_url(ids));
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ValuationError::FeedUnavailable(format!("HTTP {status}")));
        }

        Ok(resp.json::<FeedPrices>().await?)
    }
}
