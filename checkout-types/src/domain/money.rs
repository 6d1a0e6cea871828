//! Exact, currency-tagged monetary value.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::{DomainError, DomainResult};

/// Currencies accepted at checkout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    COP,
    USD,
    EUR,
}

impl Currency {
    /// Minor units in one major unit. Every supported currency uses cents.
    pub fn minor_units_per_major(&self) -> u32 {
        match self {
            Currency::COP | Currency::USD | Currency::EUR => 100,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::COP => "COP",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COP" => Ok(Currency::COP),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            other => Err(DomainError::InvalidEnumValue {
                kind: "currency",
                value: other.to_string(),
            }),
        }
    }
}

/// Non-negative monetary amount with embedded currency.
///
/// The amount is an exact decimal in major units. Every operation returns a
/// new value and re-checks the non-negative invariant, so a `Money` that
/// exists is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawMoney")]
pub struct Money {
    #[schema(value_type = String, example = "50000.00")]
    amount: Decimal,
    currency: Currency,
}

/// Unchecked wire shape; deserialization goes through [`Money::new`].
#[derive(Deserialize)]
struct RawMoney {
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<RawMoney> for Money {
    type Error = DomainError;

    fn try_from(raw: RawMoney) -> Result<Self, Self::Error> {
        Money::new(raw.amount, raw.currency)
    }
}

impl Money {
    /// Creates a new Money value.
    pub fn new(amount: Decimal, currency: Currency) -> DomainResult<Self> {
        if amount < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(amount));
        }
        Ok(Self { amount, currency })
    }

    /// Creates a Money value in the default currency (COP).
    pub fn cop(amount: Decimal) -> DomainResult<Self> {
        Self::new(amount, Currency::default())
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Builds a value from an integer count of minor units (cents).
    pub fn from_minor_units(units: i64, currency: Currency) -> DomainResult<Self> {
        let amount = Decimal::from(units) / Decimal::from(currency.minor_units_per_major());
        Self::new(amount, currency)
    }

    /// Converts to minor units, rounding half away from zero.
    ///
    /// This is the only place where monetary rounding happens.
    pub fn to_minor_units(&self) -> DomainResult<i64> {
        self.amount
            .checked_mul(Decimal::from(self.currency.minor_units_per_major()))
            .map(|units| units.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|units| units.to_i64())
            .ok_or(DomainError::InvalidAmount(self.amount))
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Checked addition - returns error if currencies don't match.
    pub fn checked_add(&self, other: Money) -> DomainResult<Money> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency,
                got: other.currency,
            });
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(DomainError::InvalidAmount(self.amount))?;
        Money::new(amount, self.currency)
    }

    /// Multiplies by a factor. The result goes back through [`Money::new`],
    /// so a negative factor fails with `InvalidAmount`.
    pub fn multiply(&self, factor: impl Into<Decimal>) -> DomainResult<Money> {
        let amount = self
            .amount
            .checked_mul(factor.into())
            .ok_or(DomainError::InvalidAmount(self.amount))?;
        Money::new(amount, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.amount)
    }
}
