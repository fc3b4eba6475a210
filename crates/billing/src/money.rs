//! Non-negative exact decimal money amount.

use core::fmt;
use core::str::FromStr;

use payhint_core::ValueObject;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};

/// A non-negative, arbitrary-scale decimal amount.
///
/// Equality, ordering and hashing are by numeric value: `100.0 == 100.00`.
/// The textual form keeps the scale it was built with, and that exact string
/// is what goes over the wire (never a float).
///
/// A "missing" operand cannot be expressed: every operation takes a `&Money`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Fails with `InvalidMoneyValue` when `amount` is negative.
    pub fn new(amount: Decimal) -> BillingResult<Self> {
        if amount < Decimal::ZERO {
            return Err(BillingError::invalid_money(format!(
                "money amount cannot be negative: {amount}"
            )));
        }
        Ok(Self(amount))
    }

    /// Build from an optional amount, treating `None` as a missing value.
    pub fn from_optional(amount: Option<Decimal>) -> BillingResult<Self> {
        match amount {
            Some(amount) => Self::new(amount),
            None => Err(BillingError::invalid_money("money amount is required")),
        }
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: &Money) -> BillingResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| BillingError::invalid_money(format!("overflow adding {other} to {self}")))
    }

    /// `self - other`; never clamps, fails when the result would be negative.
    pub fn subtract(&self, other: &Money) -> BillingResult<Money> {
        let result = self
            .0
            .checked_sub(other.0)
            .ok_or_else(|| BillingError::invalid_money(format!("overflow subtracting {other} from {self}")))?;
        if result < Decimal::ZERO {
            return Err(BillingError::invalid_money(format!(
                "cannot subtract {other} from {self}: result would be negative"
            )));
        }
        Ok(Money(result))
    }

    /// Sum of all amounts, starting from zero.
    pub fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a Money>) -> BillingResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.add(amount))
    }
}

/// Summing amounts that are already bounded by an invariant (e.g. payments
/// below their installment's amount due). Use [`Money::checked_sum`] for unchecked input.
impl<'a> core::iter::Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

impl core::iter::Sum<Money> for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

impl TryFrom<Decimal> for Money {
    type Error = BillingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl TryFrom<String> for Money {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str_exact(s.trim())
            .map_err(|e| BillingError::invalid_money(format!("{s:?} is not a decimal amount: {e}")))?;
        Money::new(amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
