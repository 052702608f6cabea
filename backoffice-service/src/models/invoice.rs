//! Invoice model.
//!
//! Payment and delivery are independent tracks; neither constrains the other.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{LineItem, NewLineItem, PartyKind};

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Unpaid => "UNPAID",
        }
    }
}

/// Delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    InProcess,
    Sending,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::InProcess => "IN_PROCESS",
            DeliveryStatus::Sending => "SENDING",
            DeliveryStatus::Delivered => "DELIVERED",
        }
    }
}

/// Invoice header.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: i64,
    pub party_kind: PartyKind,
    pub party_id: i64,
    pub quote_id: Option<i64>,
    pub total_amount: Decimal,
    pub delivery_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    /// Lines and terms may change until the invoice is paid.
    pub fn is_editable(&self) -> bool {
        self.payment_status == PaymentStatus::Unpaid
    }
}

/// Invoice with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<LineItem>,
}

/// Input for creating an invoice, directly or from a quote.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub party_kind: PartyKind,
    pub party_id: i64,
    pub quote_id: Option<i64>,
    pub delivery_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// Replacement terms and lines for an unpaid invoice.
#[derive(Debug, Clone)]
pub struct UpdateInvoice {
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// Status change on either track. `None` leaves that track alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceStatusUpdate {
    pub payment_status: Option<PaymentStatus>,
    pub delivery_status: Option<DeliveryStatus>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub payment_status: Option<PaymentStatus>,
    pub delivery_status: Option<DeliveryStatus>,
    pub party_id: Option<i64>,
}
