//! Invoice bodies.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use super::{party_fields, wire_amount, LineItemRequest, LineItemResponse};
use crate::models::{
    DeliveryStatus, Invoice, InvoiceDetail, InvoiceStatusUpdate, ListInvoicesFilter,
    PaymentStatus,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub client_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub delivery_date: Option<NaiveDate>,
    pub payment_status: Option<PaymentStatus>,
    pub delivery_status: Option<DeliveryStatus>,
    pub notes: Option<String>,

    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<LineItemRequest>,
}

/// Replaces terms and lines of an UNPAID invoice.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,

    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_status_change"))]
pub struct InvoiceStatusRequest {
    pub payment_status: Option<PaymentStatus>,
    pub delivery_status: Option<DeliveryStatus>,
}

fn validate_status_change(req: &InvoiceStatusRequest) -> Result<(), ValidationError> {
    if req.payment_status.is_none() && req.delivery_status.is_none() {
        let mut err = ValidationError::new("empty_status_change");
        err.message = Some(Cow::Borrowed(
            "paymentStatus or deliveryStatus is required",
        ));
        return Err(err);
    }
    Ok(())
}

impl From<InvoiceStatusRequest> for InvoiceStatusUpdate {
    fn from(req: InvoiceStatusRequest) -> Self {
        Self {
            payment_status: req.payment_status,
            delivery_status: req.delivery_status,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvoicesQuery {
    pub payment_status: Option<PaymentStatus>,
    pub delivery_status: Option<DeliveryStatus>,
    pub party_id: Option<i64>,
}

impl From<ListInvoicesQuery> for ListInvoicesFilter {
    fn from(query: ListInvoicesQuery) -> Self {
        Self {
            payment_status: query.payment_status,
            delivery_status: query.delivery_status,
            party_id: query.party_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<i64>,
    pub quote_id: Option<i64>,
    pub total_amount: Decimal,
    pub currency: String,
    pub date_created: DateTime<Utc>,
    pub delivery_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    pub notes: Option<String>,
    pub updated_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<LineItemResponse>>,
}

impl InvoiceResponse {
    pub fn summary(invoice: Invoice, currency: &str) -> Self {
        let (client_id, supplier_id) = party_fields(invoice.party_kind, invoice.party_id);
        Self {
            id: invoice.invoice_id,
            client_id,
            supplier_id,
            quote_id: invoice.quote_id,
            total_amount: wire_amount(invoice.total_amount),
            currency: currency.to_string(),
            date_created: invoice.created_utc,
            delivery_date: invoice.delivery_date,
            payment_status: invoice.payment_status,
            delivery_status: invoice.delivery_status,
            notes: invoice.notes,
            updated_utc: invoice.updated_utc,
            items: None,
        }
    }

    pub fn detail(detail: InvoiceDetail, currency: &str) -> Self {
        let items = detail.items.iter().map(LineItemResponse::from).collect();
        Self {
            items: Some(items),
            ..Self::summary(detail.invoice, currency)
        }
    }
}
