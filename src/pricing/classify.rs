//! Lazy token creation and venue-type classification.

use super::DEFAULT_DECIMALS;
use crate::chain::{CallResultExt, ChainReader};
use crate::config::Deployment;
use crate::domain::{Address, Timestamp, Token, TokenKind};
use crate::store::EntityStore;
use tracing::info;

/// Build a token record from whatever metadata the contract answers.
///
/// Every read here may plausibly fail: decimals default to 18, symbol and
/// name to empty, supply to zero.
pub fn create_token<C: ChainReader + ?Sized>(
    chain: &C,
    deployment: &Deployment,
    address: &Address,
    now: Timestamp,
) -> Token {
    let decimals = match deployment.stable(address) {
        Some(stable) => stable.decimals,
        None => chain
            .erc20_decimals(address)
            .probe("decimals")
            .unwrap_or(DEFAULT_DECIMALS),
    };
    let mut token = Token::new(address.clone(), decimals, TokenKind::Standard);
    token.symbol = chain.erc20_symbol(address).probe("symbol").unwrap_or_default();
    token.name = chain.erc20_name(address).probe("name").unwrap_or_default();
    token.total_supply = chain
        .erc20_total_supply(address)
        .probe("totalSupply")
        .unwrap_or(0);
    token.updated = now;

    classify(chain, deployment, &mut token);
    info!(
        token = %token.id,
        symbol = %token.symbol,
        kind = ?token.kind,
        "created token"
    );
    token
}

fn classify<C: ChainReader + ?Sized>(chain: &C, deployment: &Deployment, token: &mut Token) {
    if deployment.is_stable(&token.id) {
        token.kind = TokenKind::Stable;
        return;
    }
    if let Some(pair) = chain.v2_pair(&token.id).probe("token0") {
        token.kind = TokenKind::UniswapLiquidity;
        token.alias = pair_alias(chain, &pair.token0, &pair.token1);
        token.underlying = vec![pair.token0, pair.token1];
        return;
    }
    if let Some(pool) = chain.weighted_pool(&token.id).probe("getNormalizedWeights") {
        token.kind = TokenKind::BalancerWeighted;
        token.alias = pool
            .tokens
            .iter()
            .map(|t| symbol_of(chain, t))
            .collect::<Vec<_>>()
            .join("-");
        token.underlying = pool.tokens;
        return;
    }
    if let Some(vault) = chain.managed_vault(&token.id).probe("getUnderlyingBalances") {
        token.kind = TokenKind::GUniLiquidity;
        token.alias = pair_alias(chain, &vault.token0, &vault.token1);
        token.underlying = vec![vault.token0, vault.token1];
    }
}

fn symbol_of<C: ChainReader + ?Sized>(chain: &C, token: &Address) -> String {
    chain.erc20_symbol(token).probe("symbol").unwrap_or_default()
}

fn pair_alias<C: ChainReader + ?Sized>(chain: &C, token0: &Address, token1: &Address) -> String {
    format!("{}-{}", symbol_of(chain, token0), symbol_of(chain, token1))
}

/// Stored token, or a freshly classified one. The caller saves it.
pub fn load_or_create_token<S: EntityStore, C: ChainReader + ?Sized>(
    store: &S,
    chain: &C,
    deployment: &Deployment,
    address: &Address,
    now: Timestamp,
) -> Token {
    store
        .load::<Token>(address.as_str())
        .unwrap_or_else(|| create_token(chain, deployment, address, now))
}
