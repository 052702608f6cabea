//! Line items shared by quotes and invoices.

use backoffice_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// Largest amount a `NUMERIC(14, 2)` column holds: 999 999 999 999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// A line or document total that does not fit the amount columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("line total for product {product_id} exceeds the maximum amount {max}")]
    LineTooLarge { product_id: i64, max: Decimal },

    #[error("document total exceeds the maximum amount {max}")]
    TotalTooLarge { max: Decimal },
}

impl From<AmountError> for AppError {
    fn from(err: AmountError) -> Self {
        AppError::BadRequest(anyhow::anyhow!(err))
    }
}

fn within_limit(amount: Decimal) -> Option<Decimal> {
    (amount <= MAX_AMOUNT).then_some(amount)
}

/// Stored line on a quote or invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub item_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Priced line ready to be written. Totals are always derived from here.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl NewLineItem {
    pub fn total_price(&self) -> Result<Decimal, AmountError> {
        Decimal::from(self.quantity)
            .checked_mul(self.unit_price)
            .and_then(within_limit)
            .ok_or(AmountError::LineTooLarge {
                product_id: self.product_id,
                max: MAX_AMOUNT,
            })
    }
}

impl From<&LineItem> for NewLineItem {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// Document total: the sum of every line's quantity × unit price.
pub fn total_amount(items: &[NewLineItem]) -> Result<Decimal, AmountError> {
    items.iter().try_fold(Decimal::ZERO, |sum, item| {
        sum.checked_add(item.total_price()?)
            .and_then(within_limit)
            .ok_or(AmountError::TotalTooLarge { max: MAX_AMOUNT })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: i64, quantity: i32, unit_price: &str) -> NewLineItem {
        NewLineItem {
            product_id,
            quantity,
            unit_price: unit_price.parse().unwrap(),
        }
    }

    #[test]
    fn line_total_is_quantity_times_price() {
        assert_eq!(line(1, 2, "30").total_price(), Ok(Decimal::from(60)));
        assert_eq!(
            line(1, 3, "0.10").total_price(),
            Ok("0.30".parse::<Decimal>().unwrap())
        );
    }

    #[test]
    fn document_total_sums_lines() {
        let items = vec![line(1, 2, "30"), line(2, 1, "9.99"), line(3, 4, "0.25")];
        assert_eq!(total_amount(&items), Ok("70.99".parse::<Decimal>().unwrap()));
    }

    #[test]
    fn empty_document_totals_zero() {
        assert_eq!(total_amount(&[]), Ok(Decimal::ZERO));
    }

    #[test]
    fn max_amount_is_the_column_limit() {
        assert_eq!(MAX_AMOUNT, "999999999999.99".parse::<Decimal>().unwrap());
    }

    #[test]
    fn oversized_line_is_refused_instead_of_overflowing() {
        assert_eq!(
            line(7, 2, "50000000000000000000000000000").total_price(),
            Err(AmountError::LineTooLarge {
                product_id: 7,
                max: MAX_AMOUNT
            })
        );
        assert!(line(7, 2, "999999999999.99").total_price().is_err());
        assert!(line(7, 1, "999999999999.99").total_price().is_ok());
    }

    #[test]
    fn document_total_above_the_limit_is_refused() {
        let items = vec![line(1, 1, "999999999999.99"), line(2, 1, "0.01")];
        assert_eq!(
            total_amount(&items),
            Err(AmountError::TotalTooLarge { max: MAX_AMOUNT })
        );
    }
}
