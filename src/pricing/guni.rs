//! Managed two-asset liquidity vaults.

use super::{Hint, PricingPass, Quote};
use crate::chain::{CallResultExt, ChainReader};
use crate::domain::{Decimal, Token};

impl<C: ChainReader + ?Sized> PricingPass<'_, C> {
    /// Both underlying holdings must price; the share is worth their sum over supply.
    pub(crate) fn price_managed_vault(&mut self, token: &Token, prior: &Hint) -> Quote {
        let Some(vault) = self
            .chain
            .managed_vault(&token.id)
            .probe("getUnderlyingBalances")
        else {
            return Quote::unpriced();
        };

        let quote0 = self.price_standard(&vault.token0, prior.segment(0), 0);
        let quote1 = self.price_standard(&vault.token1, prior.segment(1), 0);
        if !quote0.is_priced() || !quote1.is_priced() {
            return Quote::unpriced();
        }

        let supply = self
            .chain
            .erc20_total_supply(&token.id)
            .probe("totalSupply")
            .map(|raw| Decimal::from_raw(raw, token.decimals))
            .unwrap_or_default();
        if supply.is_zero() {
            return Quote::unpriced();
        }

        let decimals0 = self.decimals_of(&vault.token0);
        let decimals1 = self.decimals_of(&vault.token1);
        let reserves = Decimal::from_raw(vault.amount0, decimals0).safe_mul(quote0.price)
            + Decimal::from_raw(vault.amount1, decimals1).safe_mul(quote1.price);
        let price = reserves.safe_div(supply);
        if price.is_zero() {
            return Quote::unpriced();
        }
        Quote::new(price, Hint::Composite(vec![quote0.hint, quote1.hint]))
    }
}
