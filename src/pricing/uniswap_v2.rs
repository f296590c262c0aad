//! Constant-product venues: base-asset reference pairs, pair scans and LP shares.

use super::{Hint, PricingPass, Quote};
use crate::chain::{CallResultExt, ChainReader, V2PairState};
use crate::domain::{Address, Decimal, Token};
use tracing::debug;

/// Reserves of a pair oriented as (token side, other side), or None if the
/// pair does not hold exactly these two tokens.
pub fn oriented_reserves(
    pair: &V2PairState,
    token: &Address,
    other: &Address,
) -> Option<(u128, u128)> {
    if &pair.token0 == token && &pair.token1 == other {
        Some((pair.reserve0, pair.reserve1))
    } else if &pair.token1 == token && &pair.token0 == other {
        Some((pair.reserve1, pair.reserve0))
    } else {
        None
    }
}

impl<C: ChainReader + ?Sized> PricingPass<'_, C> {
    /// Stable reserve over base reserve of the base asset's reference pair.
    pub(crate) fn price_base_asset(&mut self, token: &Address, pair_addr: &Address) -> Quote {
        let Some(pair) = self.chain.v2_pair(pair_addr).probe("getReserves") else {
            return Quote::unpriced();
        };
        let stable = if &pair.token0 == token {
            pair.token1.clone()
        } else {
            pair.token0.clone()
        };
        let Some(stable_decimals) = self.deployment.stable(&stable).map(|s| s.decimals) else {
            debug!(pair = %pair_addr, "reference pair has no stable side");
            return Quote::unpriced();
        };
        let Some((base_raw, stable_raw)) = oriented_reserves(&pair, token, &stable) else {
            return Quote::unpriced();
        };
        let base_decimals = self.decimals_of(token);
        let price = Decimal::from_raw(stable_raw, stable_decimals)
            .safe_div(Decimal::from_raw(base_raw, base_decimals));
        if price.is_zero() {
            return Quote::unpriced();
        }
        Quote::new(
            price,
            Hint::Base {
                pair: pair_addr.clone(),
            },
        )
    }

    /// Price `token` in one known pair against `base`.
    pub(crate) fn price_in_v2_pair(
        &mut self,
        token: &Address,
        pair_addr: &Address,
        base: &Address,
        depth: u8,
    ) -> Option<Quote> {
        let pair = self.chain.v2_pair(pair_addr).probe("getReserves")?;
        let (token_raw, base_raw) = oriented_reserves(&pair, token, base)?;
        let base_price = self.base_price(base, depth)?;

        let token_decimals = self.decimals_of(token);
        let base_decimals = self.decimals_of(base);
        let liquidity = Decimal::from_raw(base_raw, base_decimals).safe_mul(base_price);
        if !self.is_liquid(liquidity) {
            debug!(
                token = %token,
                pair = %pair_addr,
                liquidity = %liquidity,
                "pair below minimum liquidity"
            );
            return None;
        }

        let price = liquidity.safe_div(Decimal::from_raw(token_raw, token_decimals));
        price.is_positive().then(|| {
            Quote::new(
                price,
                Hint::V2 {
                    pair: pair_addr.clone(),
                    base: base.clone(),
                },
            )
        })
    }

    pub(crate) fn scan_v2(&mut self, token: &Address, depth: u8) -> Option<Quote> {
        let factories = self.deployment.v2_factories.clone();
        let bases = self.candidate_bases(token, depth);
        for factory in &factories {
            for base in &bases {
                let Some(Some(pair)) = self.chain.v2_get_pair(factory, token, base).probe("getPair")
                else {
                    continue;
                };
                if pair.is_zero() {
                    continue;
                }
                if let Some(quote) = self.price_in_v2_pair(token, &pair, base, depth) {
                    return Some(quote);
                }
            }
        }
        None
    }

    /// Two-asset LP share: one priced side's reserve value, doubled, over supply.
    pub(crate) fn price_uniswap_liquidity(&mut self, token: &Token, prior: &Hint) -> Quote {
        let Some(pair) = self.chain.v2_pair(&token.id).probe("getReserves") else {
            return Quote::unpriced();
        };
        let supply = self
            .chain
            .erc20_total_supply(&token.id)
            .probe("totalSupply")
            .map(|raw| Decimal::from_raw(raw, token.decimals))
            .unwrap_or_default();

        let sides = [
            (pair.token0.clone(), pair.reserve0),
            (pair.token1.clone(), pair.reserve1),
        ];
        let mut segments = Vec::with_capacity(sides.len());
        let mut price = Decimal::zero();
        for (i, (constituent, reserve)) in sides.iter().enumerate() {
            let quote = self.price_standard(constituent, prior.segment(i), 0);
            if price.is_zero() && quote.is_priced() {
                let decimals = self.decimals_of(constituent);
                let value = Decimal::from_raw(*reserve, decimals).safe_mul(quote.price);
                price = value
                    .safe_mul(Decimal::from_u64(2))
                    .safe_div(supply);
            }
            segments.push(quote.hint);
        }

        if price.is_zero() {
            return Quote::unpriced();
        }
        Quote::new(price, Hint::Composite(segments))
    }
}
