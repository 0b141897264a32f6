//! REST clients for the pool listing and pair-detail APIs.
//!
//! One request per call. Failures are logged and reported as "no result";
//! there is no retry or backoff.

use crate::error::FeedError;
use async_trait::async_trait;
use poolwatch_core::Pool;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default pool listing API.
pub const DEFAULT_POOLS_API_URL: &str = "https://dlmm-api.meteora.ag";
/// Default pair-detail API.
pub const DEFAULT_PAIRS_API_URL: &str = "https://api.dexscreener.com";

/// Something that can list the current pools.
#[async_trait]
pub trait PoolSource: Send + Sync {
    /// Fetch the full current listing. `None` when the fetch failed.
    async fn fetch_all(&self) -> Option<Vec<Pool>>;
}

/// Endpoints and timeout for [`PoolClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub pools_api_url: String,
    pub pairs_api_url: String,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pools_api_url: DEFAULT_POOLS_API_URL.to_string(),
            pairs_api_url: DEFAULT_PAIRS_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Listing body. Some deployments wrap the array in `{"data": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PoolListing {
    Plain(Vec<Pool>),
    Wrapped { data: Vec<Pool> },
}

impl PoolListing {
    fn into_pools(self) -> Vec<Pool> {
        match self {
            PoolListing::Plain(pools) | PoolListing::Wrapped { data: pools } => pools,
        }
    }
}

/// Token reference inside a pair-detail response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenRef {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PairLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PairVolume {
    #[serde(default)]
    pub h24: Option<f64>,
}

/// Pair detail from the pair-detail API.
///
/// Not used by filtering; exposed for enrichment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairDetail {
    pub pair_address: String,
    #[serde(default)]
    pub dex_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub base_token: TokenRef,
    #[serde(default)]
    pub quote_token: Option<TokenRef>,
    #[serde(default)]
    pub price_usd: Option<String>,
    #[serde(default)]
    pub liquidity: Option<PairLiquidity>,
    #[serde(default)]
    pub volume: Option<PairVolume>,
    #[serde(default)]
    pub fdv: Option<f64>,
    /// Creation time in unix milliseconds
    #[serde(default)]
    pub pair_created_at: Option<i64>,
}

impl PairDetail {
    pub fn price_usd_f64(&self) -> Option<f64> {
        self.price_usd.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }
}

#[derive(Deserialize)]
struct PairDetailResponse {
    #[serde(default)]
    pairs: Option<Vec<PairDetail>>,
    #[serde(default)]
    pair: Option<PairDetail>,
}

/// HTTP client for the listing and pair-detail APIs.
#[derive(Debug, Clone)]
pub struct PoolClient {
    client: reqwest::Client,
    pools_url: Url,
    pairs_base: Url,
}

impl PoolClient {
    /// Build a client with its own connection pool and request timeout.
    pub fn new(config: &ClientConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(client, &config.pools_api_url, &config.pairs_api_url)
    }

    /// Build on top of an existing `reqwest::Client`.
    pub fn with_client(
        client: reqwest::Client,
        pools_api_url: &str,
        pairs_api_url: &str,
    ) -> Result<Self, FeedError> {
        let pools_url = base_url(pools_api_url)?.join("v2/pools")?;
        let pairs_base = base_url(pairs_api_url)?;
        Ok(Self {
            client,
            pools_url,
            pairs_base,
        })
    }

    /// URL of the pair-detail endpoint for a Solana pair address.
    pub fn pair_detail_url(&self, address: &str) -> Result<Url, FeedError> {
        let address = address.trim();
        if address.is_empty() || address.contains('/') {
            return Err(FeedError::InvalidUrl(format!("bad pair address: {address:?}")));
        }
        Ok(self
            .pairs_base
            .join(&format!("latest/dex/pairs/solana/{address}"))?)
    }

    /// Fetch the full listing, reporting why it failed.
    pub async fn try_fetch_all(&self) -> Result<Vec<Pool>, FeedError> {
        let body = self.get_text(self.pools_url.clone()).await?;
        let listing: PoolListing = serde_json::from_str(&body)?;
        Ok(listing.into_pools())
    }

    /// Fetch detail for one pair, reporting why it failed.
    pub async fn try_fetch_pair_detail(&self, address: &str) -> Result<PairDetail, FeedError> {
        let url = self.pair_detail_url(address)?;
        let body = self.get_text(url).await?;
        let response: PairDetailResponse = serde_json::from_str(&body)?;

        response
            .pair
            .or_else(|| response.pairs.and_then(|pairs| pairs.into_iter().next()))
            .ok_or_else(|| FeedError::NotFound(address.to_string()))
    }

    /// Fetch detail for one pair. `None` when the request failed.
    pub async fn fetch_pair_detail(&self, address: &str) -> Option<PairDetail> {
        match self.try_fetch_pair_detail(address).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                warn!(address = address, error = %e, "Failed to fetch pair detail");
                None
            }
        }
    }

    async fn get_text(&self, url: Url) -> Result<String, FeedError> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PoolSource for PoolClient {
    async fn fetch_all(&self) -> Option<Vec<Pool>> {
        match self.try_fetch_all().await {
            Ok(pools) => {
                debug!(count = pools.len(), "Fetched pool listing");
                Some(pools)
            }
            Err(e) => {
                warn!(url = %self.pools_url, error = %e, "Failed to fetch pools");
                None
            }
        }
    }
}

/// Parse a base URL so that relative joins append to its path.
fn base_url(raw: &str) -> Result<Url, FeedError> {
    let trimmed = raw.trim().trim_end_matches('/');
    Ok(Url::parse(&format!("{trimmed}/"))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return its base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{addr}")
    }

    fn local_client(base: &str) -> PoolClient {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        PoolClient::with_client(http, base, base).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let client = local_client("https://pools.example.com/api/");
        assert_eq!(
            client.pools_url.as_str(),
            "https://pools.example.com/api/v2/pools"
        );
        assert_eq!(
            client.pair_detail_url("AbC123").unwrap().as_str(),
            "https://pools.example.com/api/latest/dex/pairs/solana/AbC123"
        );
        assert!(client.pair_detail_url("").is_err());
        assert!(client.pair_detail_url("a/b").is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let http = reqwest::Client::new();
        assert!(matches!(
            PoolClient::with_client(http, "not a url", DEFAULT_PAIRS_API_URL),
            Err(FeedError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_plain_array() {
        let base = serve_once(
            "200 OK",
            r#"[{"pair_name":"SOL-USDC","tvl":500,"fees":1},{"pair_name":"WIF-SOL","tvl":"2","fees":1}]"#,
        )
        .await;
        let client = local_client(&base);

        let pools = client.fetch_all().await.unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].pair_name.as_deref(), Some("SOL-USDC"));
        assert_eq!(pools[1].tvl, Some(2.0));
    }

    #[tokio::test]
    async fn test_fetch_all_wrapped_listing() {
        let base = serve_once("200 OK", r#"{"data":[{"address":"Pool1","fees":0.3}]}"#).await;
        let client = local_client(&base);

        let pools = client.try_fetch_all().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].address.as_deref(), Some("Pool1"));
    }

    #[tokio::test]
    async fn test_fetch_all_non_success_status() {
        let base = serve_once("503 Service Unavailable", "{}").await;
        let client = local_client(&base);

        assert!(matches!(
            client.try_fetch_all().await,
            Err(FeedError::HttpStatus(503))
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_bad_body_is_none() {
        let base = serve_once("200 OK", "<html>maintenance</html>").await;
        let client = local_client(&base);

        assert!(client.fetch_all().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_all_unreachable_is_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = local_client(&format!("http://{addr}"));
        assert!(client.fetch_all().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_pair_detail() {
        let base = serve_once(
            "200 OK",
            r#"{"schemaVersion":"1.0.0","pairs":[{"chainId":"solana","dexId":"meteora","pairAddress":"Pair1","baseToken":{"address":"Mint1","name":"Bonk","symbol":"BONK"},"priceUsd":"0.0000215","liquidity":{"usd":15230.5},"volume":{"h24":9800.0},"fdv":1500000,"pairCreatedAt":1718000000000}]}"#,
        )
        .await;
        let client = local_client(&base);

        let detail = client.fetch_pair_detail("Pair1").await.unwrap();
        assert_eq!(detail.pair_address, "Pair1");
        assert_eq!(detail.base_token.symbol.as_deref(), Some("BONK"));
        assert_eq!(detail.price_usd_f64(), Some(0.0000215));
        assert_eq!(detail.liquidity_usd(), Some(15230.5));
        assert_eq!(detail.pair_created_at, Some(1718000000000));
    }

    #[tokio::test]
    async fn test_fetch_pair_detail_missing_pair() {
        let base = serve_once("200 OK", r#"{"schemaVersion":"1.0.0","pairs":null}"#).await;
        let client = local_client(&base);

        assert!(matches!(
            client.try_fetch_pair_detail("Gone").await,
            Err(FeedError::NotFound(_))
        ));
    }
}
