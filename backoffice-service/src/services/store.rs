//! Persistence seam.
//!
//! Handlers talk to a `Store`; `Database` backs it with PostgreSQL and
//! `MemoryStore` keeps everything in process. Both enforce the same
//! invariants: unique names/emails/SKUs, write-once quote conversion, and
//! compare-and-set status changes.

use async_trait::async_trait;
use backoffice_core::error::AppError;

use crate::models::{
    Category, CreateCategory, CreateInvoice, CreateParty, CreateProduct, CreateQuote, Invoice,
    InvoiceDetail, InvoiceStatusUpdate, ListInvoicesFilter, ListPartiesFilter,
    ListProductsFilter, ListQuotesFilter, Party, PartyKind, PartyReferences, Product,
    ProductReferences, Quote, QuoteDetail, QuoteStatus, UpdateCategory, UpdateInvoice,
    UpdateParty, UpdateProduct, UpdateQuote,
};

#[async_trait]
pub trait Store: Send + Sync {
    /// Backend label for logs and metrics.
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), AppError>;

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    async fn create_category(&self, input: &CreateCategory) -> Result<Category, AppError>;

    async fn get_category(&self, category_id: i64) -> Result<Option<Category>, AppError>;

    async fn list_categories(&self) -> Result<Vec<Category>, AppError>;

    async fn update_category(
        &self,
        category_id: i64,
        input: &UpdateCategory,
    ) -> Result<Option<Category>, AppError>;

    /// Number of products filed under the category.
    async fn count_category_products(&self, category_id: i64) -> Result<i64, AppError>;

    async fn delete_category(&self, category_id: i64) -> Result<bool, AppError>;

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError>;

    async fn get_product(&self, product_id: i64) -> Result<Option<Product>, AppError>;

    async fn list_products(&self, filter: &ListProductsFilter) -> Result<Vec<Product>, AppError>;

    async fn update_product(
        &self,
        product_id: i64,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError>;

    async fn product_references(&self, product_id: i64) -> Result<ProductReferences, AppError>;

    async fn delete_product(&self, product_id: i64) -> Result<bool, AppError>;

    // -------------------------------------------------------------------------
    // Clients and suppliers
    // -------------------------------------------------------------------------

    async fn create_party(&self, input: &CreateParty) -> Result<Party, AppError>;

    async fn get_party(&self, kind: PartyKind, party_id: i64) -> Result<Option<Party>, AppError>;

    async fn list_parties(
        &self,
        kind: PartyKind,
        filter: &ListPartiesFilter,
    ) -> Result<Vec<Party>, AppError>;

    async fn update_party(
        &self,
        kind: PartyKind,
        party_id: i64,
        input: &UpdateParty,
    ) -> Result<Option<Party>, AppError>;

    async fn party_references(
        &self,
        kind: PartyKind,
        party_id: i64,
    ) -> Result<PartyReferences, AppError>;

    async fn delete_party(&self, kind: PartyKind, party_id: i64) -> Result<bool, AppError>;

    // -------------------------------------------------------------------------
    // Quotes
    // -------------------------------------------------------------------------

    /// Create a DRAFT quote; the total is derived from `input.items`.
    async fn create_quote(&self, input: &CreateQuote) -> Result<QuoteDetail, AppError>;

    async fn get_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
    ) -> Result<Option<QuoteDetail>, AppError>;

    async fn list_quotes(
        &self,
        kind: PartyKind,
        filter: &ListQuotesFilter,
    ) -> Result<Vec<Quote>, AppError>;

    /// Replace terms and lines of a DRAFT quote.
    ///
    /// `Ok(None)` when the quote does not exist; `Conflict` when it is no
    /// longer a draft.
    async fn update_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
        input: &UpdateQuote,
    ) -> Result<Option<QuoteDetail>, AppError>;

    /// Move a quote from `from` to `to`.
    ///
    /// `Ok(None)` when the quote is missing or its status is no longer `from`.
    async fn set_quote_status(
        &self,
        kind: PartyKind,
        quote_id: i64,
        from: QuoteStatus,
        to: QuoteStatus,
    ) -> Result<Option<Quote>, AppError>;

    /// Atomically create `invoice` and mark the quote CONVERTED with the new
    /// invoice id, provided the quote is still in `from` and unconverted.
    ///
    /// `Conflict` when the precondition no longer holds.
    async fn convert_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
        from: QuoteStatus,
        invoice: &CreateInvoice,
    ) -> Result<InvoiceDetail, AppError>;

    /// Delete a quote that has not been converted.
    async fn delete_quote(&self, kind: PartyKind, quote_id: i64) -> Result<bool, AppError>;

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceDetail, AppError>;

    async fn get_invoice(
        &self,
        kind: PartyKind,
        invoice_id: i64,
    ) -> Result<Option<InvoiceDetail>, AppError>;

    async fn list_invoices(
        &self,
        kind: PartyKind,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError>;

    /// Replace terms and lines of an UNPAID invoice.
    ///
    /// `Ok(None)` when the invoice does not exist; `Conflict` when it is paid.
    async fn update_invoice(
        &self,
        kind: PartyKind,
        invoice_id: i64,
        input: &UpdateInvoice,
    ) -> Result<Option<InvoiceDetail>, AppError>;

    async fn update_invoice_status(
        &self,
        kind: PartyKind,
        invoice_id: i64,
        update: &InvoiceStatusUpdate,
    ) -> Result<Option<Invoice>, AppError>;

    /// Delete an unpaid invoice that did not come from a quote.
    async fn delete_invoice(&self, kind: PartyKind, invoice_id: i64) -> Result<bool, AppError>;
}
