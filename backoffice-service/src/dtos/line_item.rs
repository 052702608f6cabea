use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{check_money, wire_amount};
use crate::models::LineItem;

/// One requested line. `unitPrice` falls back to the product's price.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_unit_price"))]
pub struct LineItemRequest {
    #[validate(range(min = 1, message = "productId must be positive"))]
    pub product_id: i64,

    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,

    pub unit_price: Option<Decimal>,
}

fn validate_unit_price(item: &LineItemRequest) -> Result<(), ValidationError> {
    match &item.unit_price {
        Some(price) => check_money(price),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl From<&LineItem> for LineItemResponse {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.item_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: wire_amount(item.unit_price),
            total_price: wire_amount(item.total_price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quantity_fails_validation() {
        let item: LineItemRequest =
            serde_json::from_str(r#"{"productId": 1, "quantity": 0}"#).unwrap();
        assert!(item.validate().is_err());
    }

    #[test]
    fn negative_unit_price_fails_validation() {
        let item: LineItemRequest =
            serde_json::from_str(r#"{"productId": 1, "quantity": 2, "unitPrice": -5}"#).unwrap();
        assert!(item.validate().is_err());
    }

    #[test]
    fn unit_price_is_optional() {
        let item: LineItemRequest =
            serde_json::from_str(r#"{"productId": 1, "quantity": 2}"#).unwrap();
        assert!(item.validate().is_ok());
        assert!(item.unit_price.is_none());
    }
}
