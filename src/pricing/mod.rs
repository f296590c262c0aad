//! Token price oracle.
//!
//! A [`PricingPass`] lives for exactly one handler invocation or sweep. It
//! caches every price it resolves, keyed by token address, and is dropped at
//! the end of the pass; only the hints it returns are persisted.
//!
//! Standard tokens try, in order, stopping at the first non-zero and
//! sufficiently liquid result:
//! 1. stable asset, fixed at 1.0
//! 2. base asset, through its reference pair
//! 3. replay of the prior hint
//! 4. constant-product scan over factories x candidate bases
//! 5. concentrated-liquidity scan over candidate bases x fee tiers
//! 6. unpriced (0, empty hint)
//!
//! Composite tokens are priced from their constituents, see the venue
//! submodules. Chain read failures inside pricing are never fatal.

use crate::chain::{CallResultExt, ChainReader};
use crate::config::Deployment;
use crate::domain::{Address, Decimal, Timestamp, Token, TokenKind};
use std::collections::HashMap;
use tracing::debug;

pub mod balancer;
pub mod classify;
pub mod guni;
pub mod hint;
pub mod uniswap_v2;
pub mod uniswap_v3;

pub use classify::{create_token, load_or_create_token};
pub use hint::Hint;

/// Bases are priced recursively; this bounds the chain of bases.
const MAX_DEPTH: u8 = 2;

/// Default when a token does not answer `decimals()`.
pub const DEFAULT_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Quote {
    pub price: Decimal,
    pub hint: Hint,
}

impl Quote {
    pub fn unpriced() -> Self {
        Self::default()
    }

    pub fn new(price: Decimal, hint: Hint) -> Self {
        Self { price, hint }
    }

    pub fn is_priced(&self) -> bool {
        self.price.is_positive()
    }
}

pub struct PricingPass<'a, C: ChainReader + ?Sized> {
    chain: &'a C,
    deployment: &'a Deployment,
    now: Timestamp,
    cache: HashMap<Address, Quote>,
    decimals: HashMap<Address, u32>,
}

impl<'a, C: ChainReader + ?Sized> PricingPass<'a, C> {
    pub fn new(chain: &'a C, deployment: &'a Deployment, now: Timestamp) -> Self {
        Self {
            chain,
            deployment,
            now,
            cache: HashMap::new(),
            decimals: HashMap::new(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn chain(&self) -> &'a C {
        self.chain
    }

    pub fn deployment(&self) -> &'a Deployment {
        self.deployment
    }

    /// Number of tokens resolved so far in this pass.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Price a stored token, replaying its hint.
    pub fn quote(&mut self, token: &Token) -> Quote {
        if let Some(cached) = self.cache.get(&token.id) {
            return cached.clone();
        }
        self.decimals.insert(token.id.clone(), token.decimals);
        let prior = Hint::parse(&token.hint);

        let quote = match token.kind {
            TokenKind::Stable => Quote::new(Decimal::one(), Hint::Stable),
            TokenKind::Standard => self.price_standard(&token.id, Some(&prior), 0),
            TokenKind::UniswapLiquidity => self.price_uniswap_liquidity(token, &prior),
            TokenKind::BalancerWeighted => self.price_weighted_pool(token, &prior),
            TokenKind::GUniLiquidity => self.price_managed_vault(token, &prior),
        };

        debug!(
            token = %token.id,
            price = %quote.price,
            hint = %quote.hint,
            "priced token"
        );
        self.cache.insert(token.id.clone(), quote.clone());
        quote
    }

    /// Price any token address through the standard strategy chain.
    pub fn price_of(&mut self, token: &Address) -> Decimal {
        self.price_standard(token, None, 0).price
    }

    pub(crate) fn decimals_of(&mut self, token: &Address) -> u32 {
        if let Some(stable) = self.deployment.stable(token) {
            return stable.decimals;
        }
        if let Some(d) = self.decimals.get(token) {
            return *d;
        }
        let d = self
            .chain
            .erc20_decimals(token)
            .probe("decimals")
            .unwrap_or(DEFAULT_DECIMALS);
        self.decimals.insert(token.clone(), d);
        d
    }

    pub(crate) fn price_standard(
        &mut self,
        token: &Address,
        prior: Option<&Hint>,
        depth: u8,
    ) -> Quote {
        if let Some(cached) = self.cache.get(token) {
            return cached.clone();
        }
        if depth > MAX_DEPTH {
            return Quote::unpriced();
        }

        let quote = if self.deployment.is_stable(token) {
            Quote::new(Decimal::one(), Hint::Stable)
        } else if let Some(base) = self.deployment.base_asset(token) {
            let pair = base.reference_pair.clone();
            self.price_base_asset(token, &pair)
        } else {
            self.replay_hint(token, prior, depth)
                .or_else(|| self.scan_v2(token, depth))
                .or_else(|| self.scan_v3(token, depth))
                .unwrap_or_else(|| {
                    debug!(token = %token, "no venue priced token");
                    Quote::unpriced()
                })
        };

        // Unpriced bases found while scanning are not cached, a later
        // top-level request may still find them with a full candidate list.
        if quote.is_priced() || depth == 0 {
            self.cache.insert(token.clone(), quote.clone());
        }
        quote
    }

    fn replay_hint(&mut self, token: &Address, prior: Option<&Hint>, depth: u8) -> Option<Quote> {
        let quote = match prior? {
            Hint::V2 { pair, base } => self.price_in_v2_pair(token, pair, base, depth),
            Hint::V3 { pool, base } => self.price_in_v3_pool(token, pool, base, depth),
            _ => None,
        };
        if quote.is_none() {
            debug!(token = %token, "hint replay failed, rescanning venues");
        }
        quote
    }

    /// Counterparts to try at this recursion depth.
    ///
    /// Below the top level only stables and base assets are tried, so a base
    /// is never priced through another scanned base.
    pub(crate) fn candidate_bases(&self, token: &Address, depth: u8) -> Vec<Address> {
        let deployment = self.deployment;
        deployment
            .candidate_bases()
            .into_iter()
            .filter(|base| base != token)
            .filter(|base| {
                depth == 0 || deployment.is_stable(base) || deployment.base_asset(base).is_some()
            })
            .collect()
    }

    /// USD price of a base asset, or None when it is itself unpriced.
    pub(crate) fn base_price(&mut self, base: &Address, depth: u8) -> Option<Decimal> {
        let quote = self.price_standard(base, None, depth + 1);
        quote.is_priced().then_some(quote.price)
    }

    pub(crate) fn is_liquid(&self, liquidity_usd: Decimal) -> bool {
        liquidity_usd >= self.deployment.min_liquidity_usd
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::chain::StaticChain;
    use crate::config::{BaseAsset, ConcentratedVenue, Deployment, StableAsset};
    use crate::domain::{Address, Decimal, Timestamp};

    pub const USDC: &str = "0xusdc";
    pub const WETH: &str = "0xweth";
    pub const REF_PAIR: &str = "0xrefpair";
    pub const FACTORY_A: &str = "0xfactorya";
    pub const FACTORY_B: &str = "0xfactoryb";
    pub const V3_FACTORY: &str = "0xv3factory";

    pub fn e18(n: u128) -> u128 {
        n * 1_000_000_000_000_000_000
    }

    pub fn e6(n: u128) -> u128 {
        n * 1_000_000
    }

    pub fn deployment() -> Deployment {
        let mut deployment = Deployment::mainnet();
        deployment.stablecoins = vec![StableAsset {
            address: Address::new(USDC),
            decimals: 6,
        }];
        deployment.base_assets = vec![BaseAsset {
            address: Address::new(WETH),
            reference_pair: Address::new(REF_PAIR),
        }];
        deployment.high_volume_tokens = vec![];
        deployment.v2_factories = vec![Address::new(FACTORY_A), Address::new(FACTORY_B)];
        deployment.v3 = Some(ConcentratedVenue {
            factory: Address::new(V3_FACTORY),
            deployed_at: Timestamp::new(1_000),
            fee_tiers: vec![500, 3000, 10000],
        });
        deployment.min_liquidity_usd = Decimal::from_u64(10_000);
        deployment
    }

    /// USDC plus WETH at 2000 USD through the reference pair.
    pub fn base_chain() -> StaticChain {
        StaticChain::new()
            .with_token(USDC, "USDC", 6)
            .with_token(WETH, "WETH", 18)
            .with_v2_pair(FACTORY_A, REF_PAIR, USDC, WETH, e6(20_000_000), e18(10_000))
    }
}
