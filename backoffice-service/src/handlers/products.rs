//! Product handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use backoffice_core::error::AppError;
use backoffice_core::extract::ValidatedJson;

use crate::dtos::{CreateProductRequest, ListProductsQuery, ProductResponse, UpdateProductRequest};
use crate::handlers::require_party;
use crate::models::{CreateProduct, ListProductsFilter, PartyKind, UpdateProduct};
use crate::services::metrics::record_guarded_delete;
use crate::startup::AppState;

/// Category and supplier references must point at existing records.
async fn check_links(
    state: &AppState,
    category_id: Option<i64>,
    supplier_id: Option<i64>,
) -> Result<(), AppError> {
    if let Some(id) = category_id {
        if state.store.get_category(id).await?.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "categoryId {} does not exist",
                id
            )));
        }
    }
    if let Some(id) = supplier_id {
        require_party(state, PartyKind::Supplier, id).await?;
    }
    Ok(())
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    check_links(&state, req.category_id, req.supplier_id).await?;

    let input: CreateProduct = req.into();
    let product = state.store.create_product(&input).await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let filter: ListProductsFilter = query.into();
    let products = state.store.list_products(&filter).await?;

    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| not_found(product_id))?;

    Ok(Json(product.into()))
}

/// PUT /api/products/:id
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    if state.store.get_product(product_id).await?.is_none() {
        return Err(not_found(product_id));
    }
    check_links(&state, req.category_id, req.supplier_id).await?;

    let input: UpdateProduct = req.into();
    let product = state
        .store
        .update_product(product_id, &input)
        .await?
        .ok_or_else(|| not_found(product_id))?;

    Ok(Json(product.into()))
}

/// DELETE /api/products/:id
///
/// Refused while any quote or invoice line references the product.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.get_product(product_id).await?.is_none() {
        return Err(not_found(product_id));
    }

    let refs = state.store.product_references(product_id).await?;
    if refs.is_referenced() {
        record_guarded_delete("product");
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Product {} is used by {} quote item(s) and {} invoice item(s)",
            product_id,
            refs.quote_items,
            refs.invoice_items
        )));
    }

    if !state.store.delete_product(product_id).await? {
        return Err(not_found(product_id));
    }

    tracing::info!(product_id = product_id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn not_found(product_id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Product {} not found", product_id))
}
