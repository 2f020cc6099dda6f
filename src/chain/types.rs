//! Token deployments and amount conversion.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use std::ops::Mul;

use crate::chain::Network;
use crate::util::money_amount::{MoneyAmount, MoneyAmountParseError};

/// Decimals of the native currency.
pub const ETH_DECIMALS: u8 = 18;

/// Where an asset lives on a network.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum AssetLocation {
    /// The chain's native currency (ETH on Base).
    Native,
    /// An ERC-20 token contract.
    Erc20(Address),
}

/// Information about an asset on a Base network.
///
/// ```
/// use telopay::chain::TokenDeployment;
/// use telopay::networks::{KnownNetworkBase, USDC};
/// use alloy_primitives::U256;
///
/// let usdc = USDC::base();
/// assert_eq!(usdc.decimals, 6);
/// assert_eq!(usdc.parse("10.50").unwrap(), U256::from(10_500_000u64));
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct TokenDeployment {
    /// The network this asset is deployed on.
    pub network: Network,
    pub location: AssetLocation,
    /// Number of decimal places (18 for ETH, 6 for USDC).
    pub decimals: u8,
}

impl TokenDeployment {
    pub fn native(network: Network) -> Self {
        Self {
            network,
            location: AssetLocation::Native,
            decimals: ETH_DECIMALS,
        }
    }

    pub fn erc20(network: Network, address: Address, decimals: u8) -> Self {
        Self {
            network,
            location: AssetLocation::Erc20(address),
            decimals,
        }
    }

    /// Token contract address, `None` for the native currency.
    pub fn address(&self) -> Option<Address> {
        match self.location {
            AssetLocation::Native => None,
            AssetLocation::Erc20(address) => Some(address),
        }
    }

    /// Parses a decimal amount string into base units.
    pub fn parse<V>(&self, v: V) -> Result<U256, MoneyAmountParseError>
    where
        V: TryInto<MoneyAmount>,
        MoneyAmountParseError: From<<V as TryInto<MoneyAmount>>::Error>,
    {
        let money_amount = v.try_into()?;
        to_base_units(&money_amount, self.decimals)
    }

    /// Converts a raw on-chain value into a decimal amount of this token.
    pub fn to_decimal(&self, raw: U256) -> Option<Decimal> {
        from_base_units(raw, self.decimals)
    }
}

/// Scales a decimal amount to integer base units of a token with `decimals` places.
///
/// Fails when the amount carries more fractional digits than the token supports.
pub fn to_base_units(amount: &MoneyAmount, decimals: u8) -> Result<U256, MoneyAmountParseError> {
    let scale = amount.scale();
    let token_scale = decimals as u32;
    if scale > token_scale {
        // "1.50" and "1.5" are the same amount; only significant digits count.
        let normalized = MoneyAmount(amount.0.normalize());
        if normalized.scale() > token_scale {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: normalized.scale(),
                token: token_scale,
            });
        }
        return to_base_units(&normalized, decimals);
    }
    let scale_diff = token_scale - scale;
    let multiplier = U256::from(10).pow(U256::from(scale_diff));
    let digits = amount.mantissa();
    Ok(U256::from(digits).mul(multiplier))
}

/// Converts integer base units into a decimal amount.
///
/// Returns `None` when the value does not fit a 96-bit decimal mantissa, which
/// for 18-decimal assets means more than ~79 billion whole units.
pub fn from_base_units(raw: U256, decimals: u8) -> Option<Decimal> {
    let raw = u128::try_from(raw).ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, decimals as u32).ok()
}

/// Formats base units with a fixed number of fractional digits.
pub fn format_units(raw: U256, decimals: u8, fraction_digits: u32) -> String {
    match from_base_units(raw, decimals) {
        Some(value) => {
            let rounded = value.round_dp(fraction_digits);
            format!("{:.*}", fraction_digits as usize, rounded)
        }
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(decimals: u8) -> TokenDeployment {
        TokenDeployment::erc20(Network::Base, Address::ZERO, decimals)
    }

    #[test]
    fn test_parse_whole_number() {
        assert_eq!(deployment(6).parse("100").unwrap(), U256::from(100_000_000u64));
    }

    #[test]
    fn test_parse_with_decimals() {
        assert_eq!(deployment(6).parse("1.50").unwrap(), U256::from(1_500_000u64));
    }

    #[test]
    fn test_parse_eth_minimum() {
        let eth = TokenDeployment::native(Network::Base);
        assert_eq!(eth.parse("0.0001").unwrap(), U256::from(100_000_000_000_000u64));
    }

    #[test]
    fn test_parse_precision_too_high() {
        let err = deployment(6).parse("1.0000001").unwrap_err();
        assert_eq!(err, MoneyAmountParseError::WrongPrecision { money: 7, token: 6 });
    }

    #[test]
    fn test_parse_trailing_zeros_beyond_precision() {
        assert_eq!(deployment(2).parse("1.500").unwrap(), U256::from(150u64));
    }

    #[test]
    fn test_parse_smallest_amount() {
        assert_eq!(deployment(6).parse("0.000001").unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_large_eth_amount() {
        let eth = TokenDeployment::native(Network::Base);
        let expected = U256::from(1_000_000u64) * U256::from(10).pow(U256::from(18));
        assert_eq!(eth.parse("1000000").unwrap(), expected);
    }

    #[test]
    fn test_from_base_units() {
        let value = from_base_units(U256::from(20_000_000_000_000_000u64), 18).unwrap();
        assert_eq!(value, Decimal::new(2, 2));
        assert!(from_base_units(U256::MAX, 18).is_none());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(20_000_000_000_000_000u64), 18, 6), "0.020000");
        assert_eq!(format_units(U256::from(1_234_567u64), 6, 6), "1.234567");
        assert_eq!(format_units(U256::ZERO, 6, 6), "0.000000");
    }
}
