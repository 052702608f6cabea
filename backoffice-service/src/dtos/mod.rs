//! Request and response bodies for the HTTP API.
//!
//! Field names are camelCase on the wire. Requests derive `Validate` and are
//! extracted with `ValidatedJson`.

pub mod catalog;
pub mod invoice;
pub mod line_item;
pub mod party;
pub mod quote;

pub use catalog::*;
pub use invoice::*;
pub use line_item::*;
pub use party::*;
pub use quote::*;

use backoffice_core::error::AppError;
use rust_decimal::Decimal;
use std::borrow::Cow;
use validator::ValidationError;

use crate::models::{PartyKind, MAX_AMOUNT};

fn money_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Monetary amounts are non-negative, at most `MAX_AMOUNT`, with at most
/// two decimal places.
pub fn check_money(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(money_error("negative_amount", "amount must not be negative"));
    }
    if *value > MAX_AMOUNT {
        return Err(money_error(
            "amount_too_large",
            "amount must not exceed 999999999999.99",
        ));
    }
    if value.normalize().scale() > 2 {
        return Err(money_error(
            "amount_precision",
            "amount must have at most two decimal places",
        ));
    }
    Ok(())
}

/// Amounts leave the API as decimal strings with exactly two places, the
/// same shape whichever store produced them.
pub(crate) fn wire_amount(mut value: Decimal) -> Decimal {
    value.rescale(2);
    value
}

/// Pick the party id matching the route: `clientId` on client routes,
/// `supplierId` on supplier routes.
pub fn party_reference(
    kind: PartyKind,
    client_id: Option<i64>,
    supplier_id: Option<i64>,
) -> Result<i64, AppError> {
    let (wanted, other) = match kind {
        PartyKind::Client => (client_id, supplier_id),
        PartyKind::Supplier => (supplier_id, client_id),
    };
    if other.is_some() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} documents take {} only",
            kind,
            kind.id_field()
        )));
    }
    wanted.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("{} is required", kind.id_field())))
}

/// Split a party id into the `clientId`/`supplierId` response fields.
pub fn party_fields(kind: PartyKind, party_id: i64) -> (Option<i64>, Option<i64>) {
    match kind {
        PartyKind::Client => (Some(party_id), None),
        PartyKind::Supplier => (None, Some(party_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_rejects_negative_and_sub_cent_amounts() {
        assert!(check_money(&Decimal::new(3000, 2)).is_ok());
        assert!(check_money(&Decimal::new(-1, 0)).is_err());
        assert!(check_money(&Decimal::new(1001, 3)).is_err());
        // Trailing zeros do not count as precision.
        assert!(check_money(&Decimal::new(1000, 3)).is_ok());
    }

    #[test]
    fn amounts_serialize_as_two_place_strings() {
        let json = serde_json::to_value(wire_amount(Decimal::from(60))).unwrap();
        assert_eq!(json, serde_json::json!("60.00"));
        assert_eq!(wire_amount(Decimal::new(1250, 3)).to_string(), "1.25");
    }

    #[test]
    fn money_is_capped_at_the_column_limit() {
        assert!(check_money(&MAX_AMOUNT).is_ok());
        assert!(check_money(&Decimal::new(10_000_000_000_000, 0)).is_err());
        assert!(check_money(&Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 0)).is_err());
    }

    #[test]
    fn party_reference_follows_route_kind() {
        assert_eq!(party_reference(PartyKind::Client, Some(4), None).unwrap(), 4);
        assert!(party_reference(PartyKind::Client, None, Some(4)).is_err());
        assert!(party_reference(PartyKind::Supplier, None, None).is_err());
        assert_eq!(party_fields(PartyKind::Supplier, 9), (None, Some(9)));
    }
}
