//! Product model.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::PartyKind;

/// Catalogue product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub description: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: i32,
    pub reorder_level: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Product {
    /// Margin on the selling price, in percent, rounded to two places.
    ///
    /// `None` when the product is given away (selling price zero).
    pub fn profit_margin(&self) -> Option<Decimal> {
        if self.selling_price.is_zero() {
            return None;
        }
        let margin = (self.selling_price - self.cost_price) / self.selling_price
            * Decimal::ONE_HUNDRED;
        Some(margin.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Stock at or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }

    /// Default unit price on a document for the given side: clients are
    /// quoted the selling price, suppliers quote us the cost price.
    pub fn default_unit_price(&self, kind: PartyKind) -> Decimal {
        match kind {
            PartyKind::Client => self.selling_price,
            PartyKind::Supplier => self.cost_price,
        }
    }
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub name: String,
    pub sku: Option<String>,
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub description: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: i32,
    pub reorder_level: i32,
}

/// Input for updating a product. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub description: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub reorder_level: Option<i32>,
}

/// Filter parameters for listing products.
#[derive(Debug, Clone, Default)]
pub struct ListProductsFilter {
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub low_stock_only: bool,
    /// Case-insensitive match on name or SKU.
    pub search: Option<String>,
}

/// Document lines that point at a product and block its deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductReferences {
    pub quote_items: i64,
    pub invoice_items: i64,
}

impl ProductReferences {
    pub fn is_referenced(&self) -> bool {
        self.quote_items > 0 || self.invoice_items > 0
    }
}
