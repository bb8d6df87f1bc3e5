//! Application configuration loaded from environment variables.
//!
//! Required: `HMAC_SECRET`
//! Optional: `HTTP_PORT`, `MINT_FEE`, `ORACLE_FEE`, `SUBSCRIPTION_FUND_AMOUNT`,
//!           `RARITY_BOUNDS`, `RARITY_TABLE_SIZE`, `TOKEN_URIS`,
//!           `COLLECTION_NAME`, `COLLECTION_SYMBOL`, `COLLECTION_OWNER`,
//!           `KEY_HASH`, `FULFILLMENT_DELAY_MS`, `FULFILLMENT_CONCURRENCY`,
//!           `CHANNEL_CAPACITY`

use anyhow::{Context, Result, bail};
use random_mint::rarity::{DEFAULT_BOUNDS, DEFAULT_TABLE_SIZE};
use std::fmt::Display;
use std::str::FromStr;

/// 0.01 ETH in wei.
const DEFAULT_MINT_FEE: u128 = 10_000_000_000_000_000;

/// 30 ETH in wei.
const DEFAULT_SUBSCRIPTION_FUND: u128 = 30_000_000_000_000_000_000;

const DEFAULT_TOKEN_URIS: [&str; 3] = [
    "ipfs://QmYwFaSdqj7NuqVDWmdyQjUkhWwK158ybnWHqWLbCFTMJP",
    "ipfs://QmSy5X6641zp7xwhMX1kAG1ixja2HU86tCQpRBmcPXA6bf",
    "ipfs://QmNWSTd4bfkWWFmCF21N49Par1TKzAfcCY6ES7DofdfwKj",
];

const DEFAULT_KEY_HASH: &str = "474e34a077df58807dbe9c96d3c009b23b3c6d0cce433e59bbf5b34f823bc56c";

/// Application configuration for the mint backend.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server port.
    pub http_port: u16,
    /// Secret key for HMAC-SHA256 randomness generation.
    pub hmac_secret: Vec<u8>,
    /// Key lane mixed into every random word.
    pub key_hash: [u8; 32],
    /// Minimum payment per mint request.
    pub mint_fee: u128,
    /// Fee the coordinator charges its subscription per request.
    pub oracle_fee: u128,
    /// Amount credited to the coordinator subscription on startup.
    pub subscription_fund_amount: u128,
    /// Cumulative rarity bounds.
    pub rarity_bounds: Vec<u64>,
    /// Modulus applied to random words before bucket lookup.
    pub rarity_table_size: u64,
    /// Metadata URI per rarity category.
    pub token_uris: Vec<String>,
    pub collection_name: String,
    pub collection_symbol: String,
    /// Identity allowed to withdraw collected fees.
    pub collection_owner: String,
    /// Artificial delay between a request and its oracle delivery.
    pub fulfillment_delay_ms: u64,
    /// Maximum concurrent fulfillment tasks.
    pub fulfillment_concurrency: usize,
    /// Capacity of the oracle delivery channel.
    pub channel_capacity: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let hmac_secret = lookup("HMAC_SECRET")
            .filter(|s| !s.is_empty())
            .context("HMAC_SECRET env var must be set")?
            .into_bytes();

        let key_hash_str = lookup("KEY_HASH").unwrap_or_else(|| DEFAULT_KEY_HASH.into());
        let key_hash = parse_key_hash(&key_hash_str)
            .with_context(|| format!("invalid KEY_HASH: {key_hash_str}"))?;

        let rarity_bounds = match lookup("RARITY_BOUNDS") {
            Some(raw) => parse_list::<u64>(&raw).context("invalid RARITY_BOUNDS")?,
            None => DEFAULT_BOUNDS.to_vec(),
        };

        let token_uris = match lookup("TOKEN_URIS") {
            Some(raw) => parse_list::<String>(&raw).context("invalid TOKEN_URIS")?,
            None => DEFAULT_TOKEN_URIS.iter().map(|s| s.to_string()).collect(),
        };

        let fulfillment_concurrency: usize = parse_or(&lookup, "FULFILLMENT_CONCURRENCY", 4)?;
        if fulfillment_concurrency == 0 {
            bail!("FULFILLMENT_CONCURRENCY must be at least 1");
        }
        let channel_capacity: usize = parse_or(&lookup, "CHANNEL_CAPACITY", 256)?;
        if channel_capacity == 0 {
            bail!("CHANNEL_CAPACITY must be at least 1");
        }

        Ok(Self {
            http_port: parse_or(&lookup, "HTTP_PORT", 8080)?,
            hmac_secret,
            key_hash,
            mint_fee: parse_or(&lookup, "MINT_FEE", DEFAULT_MINT_FEE)?,
            oracle_fee: parse_or(&lookup, "ORACLE_FEE", 0)?,
            subscription_fund_amount: parse_or(
                &lookup,
                "SUBSCRIPTION_FUND_AMOUNT",
                DEFAULT_SUBSCRIPTION_FUND,
            )?,
            rarity_bounds,
            rarity_table_size: parse_or(&lookup, "RARITY_TABLE_SIZE", DEFAULT_TABLE_SIZE)?,
            token_uris,
            collection_name: lookup("COLLECTION_NAME").unwrap_or_else(|| "Random IPFS NFT".into()),
            collection_symbol: lookup("COLLECTION_SYMBOL").unwrap_or_else(|| "RIN".into()),
            collection_owner: lookup("COLLECTION_OWNER").unwrap_or_else(|| "deployer".into()),
            fulfillment_delay_ms: parse_or(&lookup, "FULFILLMENT_DELAY_MS", 0)?,
            fulfillment_concurrency,
            channel_capacity,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.http_port)
    }
}

/// Parse `key` if present, fall back to `default` if absent. A present but
/// malformed value is an error.
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid {key}: {raw}")),
        None => Ok(default),
    }
}

fn parse_list<T>(raw: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let items = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|e| anyhow::anyhow!("{s}: {e}")))
        .collect::<Result<Vec<T>>>()?;
    if items.is_empty() {
        bail!("list is empty");
    }
    Ok(items)
}

fn parse_key_hash(raw: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("expected 32 bytes, got {}", b.len()))
}
