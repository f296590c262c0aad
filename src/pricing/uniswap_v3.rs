//! Concentrated-liquidity venues.

use super::{Hint, PricingPass, Quote};
use crate::chain::{CallResultExt, ChainReader};
use crate::domain::{Address, Decimal};
use ethnum::U256;
use tracing::debug;

const Q48: u128 = 1 << 48;
const Q96: u128 = 1 << 96;
/// Width of the on-chain `sqrtPriceX96` slot.
const SQRT_PRICE_BITS: u32 = 160;

/// Price of one whole token0 in whole token1, from a Q64.96 square root price.
///
/// The integer part is at most 64 bits and the fraction is 96, one past the
/// decimal mantissa, so the fraction is split into 48-bit halves. Values wider
/// than uint160, or whose square overflows a decimal, are unpriced.
pub fn token0_price_in_token1(sqrt_price_x96: U256, decimals0: u32, decimals1: u32) -> Option<Decimal> {
    if sqrt_price_x96 == U256::ZERO || sqrt_price_x96.leading_zeros() < 256 - SQRT_PRICE_BITS {
        return None;
    }
    let whole = (sqrt_price_x96 >> 96u32).as_u128();
    let fraction = (sqrt_price_x96 & U256::from(Q96 - 1)).as_u128();

    let q48 = Decimal::from_raw(Q48, 0);
    let high = Decimal::from_raw(fraction >> 48, 0);
    let low = Decimal::from_raw(fraction & (Q48 - 1), 0);
    let ratio = Decimal::from_raw(whole, 0)
        .checked_add(high.checked_div(q48)?)?
        .checked_add(low.checked_div(q48)?.checked_div(q48)?)?;
    let raw_price = ratio.checked_mul(ratio)?;

    let price = if decimals0 >= decimals1 {
        raw_price.checked_mul(Decimal::pow10(decimals0 - decimals1))?
    } else {
        raw_price.checked_div(Decimal::pow10(decimals1 - decimals0))?
    };
    price.is_positive().then_some(price)
}

impl<C: ChainReader + ?Sized> PricingPass<'_, C> {
    fn v3_live(&self) -> bool {
        self.deployment
            .v3
            .as_ref()
            .is_some_and(|venue| self.now >= venue.deployed_at)
    }

    /// Price `token` in one known pool against `base`.
    pub(crate) fn price_in_v3_pool(
        &mut self,
        token: &Address,
        pool_addr: &Address,
        base: &Address,
        depth: u8,
    ) -> Option<Quote> {
        if !self.v3_live() {
            return None;
        }
        let pool = self.chain.v3_pool(pool_addr).probe("slot0")?;
        let token_is_0 = &pool.token0 == token && &pool.token1 == base;
        let token_is_1 = &pool.token1 == token && &pool.token0 == base;
        if !token_is_0 && !token_is_1 {
            return None;
        }
        let base_price = self.base_price(base, depth)?;

        let decimals0 = self.decimals_of(&pool.token0);
        let decimals1 = self.decimals_of(&pool.token1);
        let price0 = token0_price_in_token1(pool.sqrt_price_x96, decimals0, decimals1)?;
        let token_in_base = if token_is_0 {
            price0
        } else {
            Decimal::one().checked_div(price0)?
        };

        let held = self
            .chain
            .erc20_balance_of(base, pool_addr)
            .probe("balanceOf")?;
        let base_decimals = self.decimals_of(base);
        let liquidity = Decimal::from_raw(held, base_decimals).safe_mul(base_price);
        if !self.is_liquid(liquidity) {
            debug!(
                token = %token,
                pool = %pool_addr,
                liquidity = %liquidity,
                "pool below minimum liquidity"
            );
            return None;
        }

        let price = token_in_base.safe_mul(base_price);
        price.is_positive().then(|| {
            Quote::new(
                price,
                Hint::V3 {
                    pool: pool_addr.clone(),
                    base: base.clone(),
                },
            )
        })
    }

    pub(crate) fn scan_v3(&mut self, token: &Address, depth: u8) -> Option<Quote> {
        if !self.v3_live() {
            return None;
        }
        let venue = self.deployment.v3.clone()?;
        for base in self.candidate_bases(token, depth) {
            for fee in &venue.fee_tiers {
                let Some(Some(pool)) = self
                    .chain
                    .v3_get_pool(&venue.factory, token, &base, *fee)
                    .probe("getPool")
                else {
                    continue;
                };
                if pool.is_zero() {
                    continue;
                }
                if let Some(quote) = self.price_in_v3_pool(token, &pool, &base, depth) {
                    return Some(quote);
                }
            }
        }
        None
    }
}
