use crate::domain::{Address, Decimal, Timestamp};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub event_source: EventSourceConfig,
    pub chain_state_file: PathBuf,
    pub deployment: Deployment,
    pub batch_size: usize,
    /// 0 stops the run once the source is drained.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSourceConfig {
    File(PathBuf),
    Http(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let event_source = match (env_map.get("EVENTS_FILE"), env_map.get("EVENTS_URL")) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidValue(
                    "EVENTS_FILE".to_string(),
                    "set either EVENTS_FILE or EVENTS_URL, not both".to_string(),
                ))
            }
            (Some(path), None) => EventSourceConfig::File(PathBuf::from(path)),
            (None, Some(url)) => EventSourceConfig::Http(url.trim_end_matches('/').to_string()),
            (None, None) => return Err(ConfigError::MissingEnv("EVENTS_FILE".to_string())),
        };

        let chain_state_file = env_map
            .get("CHAIN_STATE_FILE")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnv("CHAIN_STATE_FILE".to_string()))?;

        let mut deployment = match env_map.get("DEPLOYMENT_FILE") {
            Some(path) => Deployment::from_file(path)?,
            None => Deployment::mainnet(),
        };

        if let Some(value) = env_map.get("SWEEP_INTERVAL_SECS") {
            deployment.sweep_interval_secs = value.parse::<i64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "SWEEP_INTERVAL_SECS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;
        }
        if let Some(value) = env_map.get("PRICING_MIN_TVL") {
            deployment.pricing_min_tvl = parse_decimal("PRICING_MIN_TVL", value)?;
        }
        if let Some(value) = env_map.get("MIN_LIQUIDITY_USD") {
            deployment.min_liquidity_usd = parse_decimal("MIN_LIQUIDITY_USD", value)?;
        }

        let batch_size = env_map
            .get("BATCH_SIZE")
            .map(|s| s.as_str())
            .unwrap_or("500")
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "BATCH_SIZE".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let poll_interval_ms = env_map
            .get("POLL_INTERVAL_MS")
            .map(|s| s.as_str())
            .unwrap_or("0")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "POLL_INTERVAL_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        Ok(Config {
            database_path,
            event_source,
            chain_state_file,
            deployment,
            batch_size,
            poll_interval_ms,
        })
    }
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str_canonical(value)
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a decimal".to_string()))
}

// =============================================================================
// Deployment constants
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableAsset {
    pub address: Address,
    pub decimals: u32,
}

/// Bridge asset priced through a dedicated pair against a stable asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAsset {
    pub address: Address,
    pub reference_pair: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcentratedVenue {
    pub factory: Address,
    /// Venue scans are skipped before this time.
    pub deployed_at: Timestamp,
    pub fee_tiers: Vec<u32>,
}

/// Per-deployment constants for pricing and pool accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub stablecoins: Vec<StableAsset>,
    pub base_assets: Vec<BaseAsset>,
    /// Liquid tokens tried as pair counterparts after stables and base assets.
    #[serde(default)]
    pub high_volume_tokens: Vec<Address>,
    pub v2_factories: Vec<Address>,
    pub v3: Option<ConcentratedVenue>,
    pub min_liquidity_usd: Decimal,
    pub bootstrap_shares_per_token: Decimal,
    pub gysr_token: Address,
    pub gysr_fee: Decimal,
    pub sweep_interval_secs: i64,
    pub pricing_min_tvl: Decimal,
    pub boiling_lookahead_secs: i64,
    pub tvl_drift_tolerance: Decimal,
}

impl Deployment {
    /// Ethereum mainnet.
    pub fn mainnet() -> Self {
        Self {
            stablecoins: vec![
                StableAsset {
                    address: Address::new("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
                    decimals: 6,
                },
                StableAsset {
                    address: Address::new("0xdac17f958d2ee523a2206206994597c13d831ec7"),
                    decimals: 6,
                },
                StableAsset {
                    address: Address::new("0x6b175474e89094c44da98b954eedeac495271d0f"),
                    decimals: 18,
                },
            ],
            base_assets: vec![BaseAsset {
                address: Address::new("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
                reference_pair: Address::new("0x0d4a11d5eeaac28ec3f61d100daf4d40471f1852"),
            }],
            high_volume_tokens: [
                "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599",
                "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984",
                "0x514910771af9ca656af840dff83e8264ecf986ca",
            ]
            .into_iter()
            .map(Address::new)
            .collect(),
            v2_factories: vec![
                Address::new("0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f"),
                Address::new("0xc0aee478e3658e2610c5f7a4a2e1777ce9e4f2ac"),
            ],
            v3: Some(ConcentratedVenue {
                factory: Address::new("0x1f98431c8ad98523631ae4a59f267346ea31f984"),
                deployed_at: Timestamp::new(1_620_157_956),
                fee_tiers: vec![500, 3000, 10000],
            }),
            min_liquidity_usd: Decimal::new(dec!(10000)),
            bootstrap_shares_per_token: Decimal::new(dec!(1000000)),
            gysr_token: Address::new("0xbea98c05eeae2f3bc8c3565db7551eb738c8ccab"),
            gysr_fee: Decimal::new(dec!(0.2)),
            sweep_interval_secs: 86_400,
            pricing_min_tvl: Decimal::new(dec!(100)),
            boiling_lookahead_secs: 90 * 86_400,
            tvl_drift_tolerance: Decimal::new(dec!(0.01)),
        }
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| {
            ConfigError::InvalidValue(
                "DEPLOYMENT_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ConfigError::InvalidValue("DEPLOYMENT_FILE".to_string(), e.to_string())
        })
    }

    pub fn stable(&self, token: &Address) -> Option<&StableAsset> {
        self.stablecoins.iter().find(|s| &s.address == token)
    }

    pub fn is_stable(&self, token: &Address) -> bool {
        self.stable(token).is_some()
    }

    pub fn base_asset(&self, token: &Address) -> Option<&BaseAsset> {
        self.base_assets.iter().find(|b| &b.address == token)
    }

    /// Counterparts tried by the venue scans, most trusted first.
    pub fn candidate_bases(&self) -> Vec<Address> {
        self.stablecoins
            .iter()
            .map(|s| s.address.clone())
            .chain(self.base_assets.iter().map(|b| b.address.clone()))
            .chain(self.high_volume_tokens.iter().cloned())
            .collect()
    }
}
