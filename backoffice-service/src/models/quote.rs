//! Quote model and its status workflow.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use super::{LineItem, NewLineItem, PartyKind};

/// Quote status.
///
/// DRAFT → PENDING → CONFIRMED/REJECTED → APPROVED → CONVERTED.
/// CONVERTED is only reached through conversion to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Draft,
    Pending,
    Confirmed,
    Rejected,
    Approved,
    Converted,
}

/// Why a requested status change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Quote is {0} and can no longer change status")]
    Terminal(QuoteStatus),

    #[error("Quotes become CONVERTED only by converting them to an invoice")]
    ConversionOnly,

    #[error("Cannot move quote from {from} to {to}")]
    Illegal { from: QuoteStatus, to: QuoteStatus },
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 6] = [
        QuoteStatus::Draft,
        QuoteStatus::Pending,
        QuoteStatus::Confirmed,
        QuoteStatus::Rejected,
        QuoteStatus::Approved,
        QuoteStatus::Converted,
    ];

    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Pending => "PENDING",
            QuoteStatus::Confirmed => "CONFIRMED",
            QuoteStatus::Rejected => "REJECTED",
            QuoteStatus::Approved => "APPROVED",
            QuoteStatus::Converted => "CONVERTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Rejected | QuoteStatus::Converted)
    }

    /// Only drafts may have their lines and terms edited.
    pub fn is_editable(&self) -> bool {
        matches!(self, QuoteStatus::Draft)
    }

    pub fn is_convertible(&self) -> bool {
        matches!(self, QuoteStatus::Confirmed | QuoteStatus::Approved)
    }

    /// Statuses reachable through the status endpoint.
    pub fn allowed_targets(&self) -> &'static [QuoteStatus] {
        match self {
            QuoteStatus::Draft => &[QuoteStatus::Pending],
            QuoteStatus::Pending => &[
                QuoteStatus::Confirmed,
                QuoteStatus::Rejected,
                QuoteStatus::Draft,
            ],
            QuoteStatus::Confirmed => &[QuoteStatus::Approved, QuoteStatus::Rejected],
            QuoteStatus::Approved => &[QuoteStatus::Rejected],
            QuoteStatus::Rejected | QuoteStatus::Converted => &[],
        }
    }

    /// Validate a status change. Staying put is always allowed.
    ///
    /// With `enforce_order` off, any non-terminal quote may jump to any
    /// status except CONVERTED.
    pub fn check_transition(
        self,
        target: QuoteStatus,
        enforce_order: bool,
    ) -> Result<(), TransitionError> {
        if self == target {
            return Ok(());
        }
        if target == QuoteStatus::Converted {
            return Err(TransitionError::ConversionOnly);
        }
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        if enforce_order && !self.allowed_targets().contains(&target) {
            return Err(TransitionError::Illegal {
                from: self,
                to: target,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quote header.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub quote_id: i64,
    pub party_kind: PartyKind,
    pub party_id: i64,
    pub status: QuoteStatus,
    pub total_amount: Decimal,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub converted_invoice_id: Option<i64>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Quote with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteDetail {
    pub quote: Quote,
    pub items: Vec<LineItem>,
}

/// Input for creating a draft quote.
#[derive(Debug, Clone)]
pub struct CreateQuote {
    pub party_kind: PartyKind,
    pub party_id: i64,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// Replacement terms and lines for a draft quote.
#[derive(Debug, Clone)]
pub struct UpdateQuote {
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// Filter parameters for listing quotes.
#[derive(Debug, Clone, Default)]
pub struct ListQuotesFilter {
    pub status: Option<QuoteStatus>,
    pub party_id: Option<i64>,
}
