//! Category handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use backoffice_core::error::AppError;
use backoffice_core::extract::ValidatedJson;

use crate::dtos::{CategoryResponse, CreateCategoryRequest, UpdateCategoryRequest};
use crate::models::{CreateCategory, UpdateCategory};
use crate::services::metrics::record_guarded_delete;
use crate::startup::AppState;

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), AppError> {
    let input: CreateCategory = req.into();
    let category = state.store.create_category(&input).await?;

    Ok((StatusCode::CREATED, Json(category.into())))
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    let categories = state.store.list_categories().await?;

    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

/// GET /api/categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
) -> Result<Json<CategoryResponse>, AppError> {
    let category = state
        .store
        .get_category(category_id)
        .await?
        .ok_or_else(|| not_found(category_id))?;

    Ok(Json(category.into()))
}

/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateCategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    let input: UpdateCategory = req.into();
    let category = state
        .store
        .update_category(category_id, &input)
        .await?
        .ok_or_else(|| not_found(category_id))?;

    Ok(Json(category.into()))
}

/// DELETE /api/categories/:id
///
/// Refused while any product is filed under the category.
pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.get_category(category_id).await?.is_none() {
        return Err(not_found(category_id));
    }

    let products = state.store.count_category_products(category_id).await?;
    if products > 0 {
        record_guarded_delete("category");
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Category {} is used by {} product(s)",
            category_id,
            products
        )));
    }

    if !state.store.delete_category(category_id).await? {
        return Err(not_found(category_id));
    }

    tracing::info!(category_id = category_id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn not_found(category_id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Category {} not found", category_id))
}
