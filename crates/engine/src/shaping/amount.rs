//! Amount-typed field splitting.
//!
//! Grounded in `sbds.storages.db.tables.operations.virtual.author_reward`'s
//! `amount_field`/`amount_symbol_field`, which split a `"123.456 SYM"` asset
//! string into a numeric amount and a closed-set symbol.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ShapingError;

/// Asset tickers recognised on the source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetSymbol {
    /// The chain's primary liquid token.
    Steem,
    /// The chain's debt-backed stable token.
    Sbd,
    /// Vesting shares (staked, illiquid token).
    Vests,
}

impl AssetSymbol {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Steem => "STEEM",
            Self::Sbd => "SBD",
            Self::Vests => "VESTS",
        }
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetSymbol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STEEM" => Ok(Self::Steem),
            "SBD" => Ok(Self::Sbd),
            "VESTS" => Ok(Self::Vests),
            _ => Err(()),
        }
    }
}

/// Splits an asset string like `"1.234 STEEM"` into its numeric amount and
/// symbol. Fails with [`ShapingError::MalformedAmount`] on anything that
/// doesn't parse as exactly a decimal quantity, one space, and a recognised
/// symbol.
pub fn split_amount(raw: &str) -> Result<(Decimal, AssetSymbol), ShapingError> {
    let malformed = || ShapingError::MalformedAmount(raw.to_owned());

    let (quantity, symbol) = raw.trim().split_once(' ').ok_or_else(malformed)?;
    let amount = Decimal::from_str(quantity).map_err(|_| malformed())?;
    let symbol: AssetSymbol = symbol.parse().map_err(|()| malformed())?;
    Ok((amount, symbol))
}
