//! Weighted-pool shares.

use super::{Hint, PricingPass, Quote};
use crate::chain::{CallResultExt, ChainReader};
use crate::domain::{Decimal, Token};
use tracing::debug;

/// Pool weights are fractions scaled to 1e18.
const WEIGHT_DECIMALS: u32 = 18;

impl<C: ChainReader + ?Sized> PricingPass<'_, C> {
    /// First priced constituent's balance value, grossed up by its weight,
    /// over the share supply.
    pub(crate) fn price_weighted_pool(&mut self, token: &Token, prior: &Hint) -> Quote {
        let Some(pool) = self.chain.weighted_pool(&token.id).probe("getNormalizedWeights") else {
            return Quote::unpriced();
        };
        let supply = self
            .chain
            .erc20_total_supply(&token.id)
            .probe("totalSupply")
            .map(|raw| Decimal::from_raw(raw, token.decimals))
            .unwrap_or_default();

        let mut segments = Vec::with_capacity(pool.tokens.len());
        let mut price = Decimal::zero();
        for (i, constituent) in pool.tokens.iter().enumerate() {
            let quote = self.price_standard(constituent, prior.segment(i), 0);
            if price.is_zero() && quote.is_priced() {
                let balance = pool.balances.get(i).copied().unwrap_or(0);
                let weight = pool.weights.get(i).copied().unwrap_or(0);
                let decimals = self.decimals_of(constituent);
                let value = Decimal::from_raw(balance, decimals).safe_mul(quote.price);
                price = value
                    .safe_div(Decimal::from_raw(weight, WEIGHT_DECIMALS))
                    .safe_div(supply);
            }
            segments.push(quote.hint);
        }

        if price.is_zero() {
            debug!(token = %token.id, "no weighted pool constituent priced");
            return Quote::unpriced();
        }
        Quote::new(price, Hint::Composite(segments))
    }
}
