//! Token records and their pricing classification.

use super::primitives::raw_amount;
use super::{Address, Decimal, Timestamp};
use serde::{Deserialize, Serialize};

/// How a token is valued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Pegged to one USD.
    Stable,
    /// Priced on exchange venues against base assets.
    #[default]
    Standard,
    /// Two-asset constant-product pool share.
    UniswapLiquidity,
    /// Weighted pool share.
    BalancerWeighted,
    /// Managed concentrated-liquidity vault share.
    GUniLiquidity,
}

impl TokenKind {
    /// Composite kinds are priced by decomposing into `underlying`.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            TokenKind::UniswapLiquidity | TokenKind::BalancerWeighted | TokenKind::GUniLiquidity
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: Address,
    pub symbol: String,
    pub name: String,
    pub alias: String,
    pub decimals: u32,
    #[serde(with = "raw_amount")]
    pub total_supply: u128,
    pub kind: TokenKind,
    pub price: Decimal,
    /// Opaque record of the venue that last priced this token.
    pub hint: String,
    pub underlying: Vec<Address>,
    pub updated: Timestamp,
}

impl Token {
    pub fn new(id: Address, decimals: u32, kind: TokenKind) -> Self {
        Self {
            id,
            symbol: String::new(),
            name: String::new(),
            alias: String::new(),
            decimals,
            total_supply: 0,
            kind,
            price: Decimal::zero(),
            hint: String::new(),
            underlying: Vec::new(),
            updated: Timestamp::default(),
        }
    }

    /// Decimal-adjusted value of a raw amount of this token.
    pub fn amount(&self, raw: u128) -> Decimal {
        Decimal::from_raw(raw, self.decimals)
    }

    /// USD value of a decimal-adjusted amount at the cached price.
    pub fn usd(&self, amount: Decimal) -> Decimal {
        amount.safe_mul(self.price)
    }
}
