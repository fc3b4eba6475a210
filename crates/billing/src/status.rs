//! Payment status shared by installments and invoices.

use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    PartiallyPaid,
    Paid,
    /// Nothing paid and the due date has passed.
    Late,
}

impl PaymentStatus {
    /// Derive the status from what is owed and what has been paid.
    ///
    /// `past_due` only matters while nothing has been paid: a partially paid
    /// obligation stays `PartiallyPaid`, and `Paid` is never demoted by time.
    pub fn derive(amount_due: &Money, amount_paid: &Money, past_due: bool) -> PaymentStatus {
        if amount_paid >= amount_due {
            PaymentStatus::Paid
        } else if !amount_paid.is_zero() {
            PaymentStatus::PartiallyPaid
        } else if past_due {
            PaymentStatus::Late
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn is_settled(self) -> bool {
        self == PaymentStatus::Paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn derivation_follows_remaining_amount() {
        let due = money("200.00");

        assert_eq!(PaymentStatus::derive(&due, &Money::ZERO, false), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::derive(&due, &Money::ZERO, true), PaymentStatus::Late);
        assert_eq!(PaymentStatus::derive(&due, &money("1"), true), PaymentStatus::PartiallyPaid);
        assert_eq!(PaymentStatus::derive(&due, &money("200"), true), PaymentStatus::Paid);
    }

    #[test]
    fn zero_obligation_is_paid() {
        assert_eq!(
            PaymentStatus::derive(&Money::ZERO, &Money::ZERO, true),
            PaymentStatus::Paid
        );
    }

    #[test]
    fn serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&PaymentStatus::PartiallyPaid).unwrap();
        assert_eq!(json, "\"PARTIALLY_PAID\"");
    }
}
