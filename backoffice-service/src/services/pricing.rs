//! Line item pricing.

use backoffice_core::error::AppError;

use crate::dtos::LineItemRequest;
use crate::models::{NewLineItem, PartyKind};
use crate::services::store::Store;

/// Resolve requested lines against the catalogue.
///
/// Every product must exist. A missing `unitPrice` takes the product's
/// selling price on client documents and its cost price on supplier ones.
pub async fn resolve_items(
    store: &dyn Store,
    kind: PartyKind,
    requests: &[LineItemRequest],
) -> Result<Vec<NewLineItem>, AppError> {
    let mut items = Vec::with_capacity(requests.len());
    for req in requests {
        let product = store.get_product(req.product_id).await?.ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Product {} does not exist",
                req.product_id
            ))
        })?;

        items.push(NewLineItem {
            product_id: product.product_id,
            quantity: req.quantity,
            unit_price: req
                .unit_price
                .unwrap_or_else(|| product.default_unit_price(kind)),
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateProduct;
    use crate::services::MemoryStore;
    use rust_decimal::Decimal;

    async fn store_with_product() -> (MemoryStore, i64) {
        let store = MemoryStore::new();
        let product = store
            .create_product(&CreateProduct {
                name: "Bolt".to_string(),
                sku: None,
                category_id: None,
                supplier_id: None,
                description: None,
                cost_price: Decimal::from(20),
                selling_price: Decimal::from(30),
                stock_quantity: 0,
                reorder_level: 0,
            })
            .await
            .unwrap();
        (store, product.product_id)
    }

    fn request(product_id: i64, unit_price: Option<Decimal>) -> LineItemRequest {
        LineItemRequest {
            product_id,
            quantity: 2,
            unit_price,
        }
    }

    #[tokio::test]
    async fn default_price_depends_on_party_kind() {
        let (store, id) = store_with_product().await;

        let client = resolve_items(&store, PartyKind::Client, &[request(id, None)])
            .await
            .unwrap();
        assert_eq!(client[0].unit_price, Decimal::from(30));

        let supplier = resolve_items(&store, PartyKind::Supplier, &[request(id, None)])
            .await
            .unwrap();
        assert_eq!(supplier[0].unit_price, Decimal::from(20));
    }

    #[tokio::test]
    async fn explicit_price_wins() {
        let (store, id) = store_with_product().await;
        let items = resolve_items(
            &store,
            PartyKind::Client,
            &[request(id, Some(Decimal::new(2550, 2)))],
        )
        .await
        .unwrap();
        assert_eq!(items[0].unit_price, Decimal::new(2550, 2));
        assert_eq!(items[0].total_price(), Ok(Decimal::from(51)));
    }

    #[tokio::test]
    async fn unknown_product_is_a_bad_request() {
        let (store, _) = store_with_product().await;
        let err = resolve_items(&store, PartyKind::Client, &[request(404, None)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
