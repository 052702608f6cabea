//! Quote bodies.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{party_fields, wire_amount, InvoiceResponse, LineItemRequest, LineItemResponse};
use crate::models::{ListQuotesFilter, Quote, QuoteDetail, QuoteStatus};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteRequest {
    pub client_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,

    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<LineItemRequest>,
}

/// Replaces terms and lines of a DRAFT quote.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuoteRequest {
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,

    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuoteStatusRequest {
    pub status: QuoteStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConvertQuoteRequest {
    pub delivery_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuotesQuery {
    pub status: Option<QuoteStatus>,
    pub party_id: Option<i64>,
}

impl From<ListQuotesQuery> for ListQuotesFilter {
    fn from(query: ListQuotesQuery) -> Self {
        Self {
            status: query.status,
            party_id: query.party_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<i64>,
    pub status: QuoteStatus,
    pub total_amount: Decimal,
    pub currency: String,
    pub date_created: DateTime<Utc>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub converted_invoice_id: Option<i64>,
    pub updated_utc: DateTime<Utc>,
    /// Omitted in list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<LineItemResponse>>,
}

impl QuoteResponse {
    pub fn summary(quote: Quote, currency: &str) -> Self {
        let (client_id, supplier_id) = party_fields(quote.party_kind, quote.party_id);
        Self {
            id: quote.quote_id,
            client_id,
            supplier_id,
            status: quote.status,
            total_amount: wire_amount(quote.total_amount),
            currency: currency.to_string(),
            date_created: quote.created_utc,
            valid_until: quote.valid_until,
            notes: quote.notes,
            converted_invoice_id: quote.converted_invoice_id,
            updated_utc: quote.updated_utc,
            items: None,
        }
    }

    pub fn detail(detail: QuoteDetail, currency: &str) -> Self {
        let items = detail.items.iter().map(LineItemResponse::from).collect();
        Self {
            items: Some(items),
            ..Self::summary(detail.quote, currency)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertQuoteResponse {
    pub invoice_id: i64,
    pub invoice: InvoiceResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_an_item() {
        let req: CreateQuoteRequest =
            serde_json::from_str(r#"{"clientId": 1, "items": []}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn nested_items_are_validated() {
        let req: CreateQuoteRequest = serde_json::from_str(
            r#"{"clientId": 1, "items": [{"productId": 1, "quantity": 0}]}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn unknown_status_is_rejected_at_parse_time() {
        assert!(serde_json::from_str::<QuoteStatusRequest>(r#"{"status": "SHIPPED"}"#).is_err());
    }

    #[test]
    fn list_query_maps_to_filter() {
        let filter = ListQuotesFilter::from(ListQuotesQuery {
            status: Some(QuoteStatus::Pending),
            party_id: Some(3),
        });
        assert_eq!(filter.status, Some(QuoteStatus::Pending));
        assert_eq!(filter.party_id, Some(3));
    }
}
