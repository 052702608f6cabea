//! Category and product bodies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{check_money, wire_amount};
use crate::models::{
    Category, CreateCategory, CreateProduct, ListProductsFilter, Product, UpdateCategory,
    UpdateProduct,
};

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,

    pub description: Option<String>,
}

impl From<CreateCategoryRequest> for CreateCategory {
    fn from(req: CreateCategoryRequest) -> Self {
        Self {
            name: req.name.trim().to_string(),
            description: req.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
}

impl From<UpdateCategoryRequest> for UpdateCategory {
    fn from(req: UpdateCategoryRequest) -> Self {
        Self {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.category_id,
            name: category.name,
            description: category.description,
            created_utc: category.created_utc,
        }
    }
}

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 64, message = "sku must be 1-64 characters"))]
    pub sku: Option<String>,

    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub description: Option<String>,

    #[validate(custom(function = "check_money"))]
    pub cost_price: Decimal,

    #[validate(custom(function = "check_money"))]
    pub selling_price: Decimal,

    #[serde(default)]
    #[validate(range(min = 0, message = "stockQuantity must not be negative"))]
    pub stock_quantity: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "reorderLevel must not be negative"))]
    pub reorder_level: i32,
}

impl From<CreateProductRequest> for CreateProduct {
    fn from(req: CreateProductRequest) -> Self {
        Self {
            name: req.name.trim().to_string(),
            sku: req.sku,
            category_id: req.category_id,
            supplier_id: req.supplier_id,
            description: req.description,
            cost_price: req.cost_price,
            selling_price: req.selling_price,
            stock_quantity: req.stock_quantity,
            reorder_level: req.reorder_level,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_product_prices"))]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 64, message = "sku must be 1-64 characters"))]
    pub sku: Option<String>,

    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub description: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,

    #[validate(range(min = 0, message = "stockQuantity must not be negative"))]
    pub stock_quantity: Option<i32>,

    #[validate(range(min = 0, message = "reorderLevel must not be negative"))]
    pub reorder_level: Option<i32>,
}

fn validate_product_prices(req: &UpdateProductRequest) -> Result<(), ValidationError> {
    for price in [&req.cost_price, &req.selling_price].into_iter().flatten() {
        check_money(price)?;
    }
    Ok(())
}

impl From<UpdateProductRequest> for UpdateProduct {
    fn from(req: UpdateProductRequest) -> Self {
        Self {
            name: req.name.map(|n| n.trim().to_string()),
            sku: req.sku,
            category_id: req.category_id,
            supplier_id: req.supplier_id,
            description: req.description,
            cost_price: req.cost_price,
            selling_price: req.selling_price,
            stock_quantity: req.stock_quantity,
            reorder_level: req.reorder_level,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProductsQuery {
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub low_stock: Option<bool>,
    pub search: Option<String>,
}

impl From<ListProductsQuery> for ListProductsFilter {
    fn from(query: ListProductsQuery) -> Self {
        Self {
            category_id: query.category_id,
            supplier_id: query.supplier_id,
            low_stock_only: query.low_stock.unwrap_or(false),
            search: query.search.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub description: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    /// Percent of the selling price; null when the product sells for zero.
    pub profit_margin: Option<Decimal>,
    pub stock_quantity: i32,
    pub reorder_level: i32,
    pub low_stock: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            profit_margin: product.profit_margin().map(wire_amount),
            low_stock: product.is_low_stock(),
            id: product.product_id,
            name: product.name,
            sku: product.sku,
            category_id: product.category_id,
            supplier_id: product.supplier_id,
            description: product.description,
            cost_price: wire_amount(product.cost_price),
            selling_price: wire_amount(product.selling_price),
            stock_quantity: product.stock_quantity,
            reorder_level: product.reorder_level,
            created_utc: product.created_utc,
            updated_utc: product.updated_utc,
        }
    }
}
