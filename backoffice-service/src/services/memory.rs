//! In-process store.
//!
//! Mirrors the PostgreSQL constraints (unique keys, foreign keys, the
//! one-invoice-per-quote index) so both backends answer the same way.

use async_trait::async_trait;
use backoffice_core::error::AppError;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::models::{
    total_amount, Category, CreateCategory, CreateInvoice, CreateParty, CreateProduct,
    CreateQuote, Invoice, InvoiceDetail, InvoiceStatusUpdate, LineItem, ListInvoicesFilter,
    ListPartiesFilter, ListProductsFilter, ListQuotesFilter, NewLineItem, Party, PartyKind,
    PartyReferences, PaymentStatus, Product, ProductReferences, Quote, QuoteDetail, QuoteStatus,
    UpdateCategory, UpdateInvoice, UpdateParty, UpdateProduct, UpdateQuote,
};
use crate::services::store::Store;

#[derive(Debug, Default)]
struct Sequences {
    category: i64,
    party: i64,
    product: i64,
    quote: i64,
    invoice: i64,
    item: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

fn same_ignore_case(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

#[derive(Debug, Default)]
struct Tables {
    categories: BTreeMap<i64, Category>,
    parties: BTreeMap<i64, Party>,
    products: BTreeMap<i64, Product>,
    quotes: BTreeMap<i64, QuoteDetail>,
    invoices: BTreeMap<i64, InvoiceDetail>,
    seq: Sequences,
}

impl Tables {
    fn ensure_category_name_free(&self, name: &str, except: Option<i64>) -> Result<(), AppError> {
        let taken = self
            .categories
            .values()
            .any(|c| Some(c.category_id) != except && c.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Category '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    fn ensure_email_free(
        &self,
        kind: PartyKind,
        email: Option<&str>,
        except: Option<i64>,
    ) -> Result<(), AppError> {
        let taken = self.parties.values().any(|p| {
            p.kind == kind && Some(p.party_id) != except && same_ignore_case(p.email.as_deref(), email)
        });
        if taken {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A {} with email '{}' already exists",
                kind,
                email.unwrap_or_default()
            )));
        }
        Ok(())
    }

    fn ensure_sku_free(&self, sku: Option<&str>, except: Option<i64>) -> Result<(), AppError> {
        let Some(sku) = sku else {
            return Ok(());
        };
        let taken = self
            .products
            .values()
            .any(|p| Some(p.product_id) != except && p.sku.as_deref() == Some(sku));
        if taken {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Product with SKU '{}' already exists",
                sku
            )));
        }
        Ok(())
    }

    fn ensure_product_links(
        &self,
        category_id: Option<i64>,
        supplier_id: Option<i64>,
    ) -> Result<(), AppError> {
        if let Some(id) = category_id {
            if !self.categories.contains_key(&id) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Category {} does not exist",
                    id
                )));
            }
        }
        if let Some(id) = supplier_id {
            let is_supplier = self
                .parties
                .get(&id)
                .is_some_and(|p| p.kind == PartyKind::Supplier);
            if !is_supplier {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Supplier {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }

    fn ensure_document_links(&self, party_id: i64, items: &[NewLineItem]) -> Result<(), AppError> {
        if !self.parties.contains_key(&party_id) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Party {} does not exist",
                party_id
            )));
        }
        if let Some(missing) = items
            .iter()
            .find(|item| !self.products.contains_key(&item.product_id))
        {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Product {} does not exist",
                missing.product_id
            )));
        }
        Ok(())
    }

    fn build_items(&mut self, items: &[NewLineItem]) -> Result<Vec<LineItem>, AppError> {
        items
            .iter()
            .map(|item| -> Result<LineItem, AppError> {
                Ok(LineItem {
                    item_id: next_id(&mut self.seq.item),
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price()?,
                })
            })
            .collect()
    }

    fn insert_invoice(&mut self, input: &CreateInvoice) -> Result<InvoiceDetail, AppError> {
        self.ensure_document_links(input.party_id, &input.items)?;
        if let Some(quote_id) = input.quote_id {
            if self
                .invoices
                .values()
                .any(|d| d.invoice.quote_id == Some(quote_id))
            {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Quote {} already has an invoice",
                    quote_id
                )));
            }
        }
        let total = total_amount(&input.items)?;
        let items = self.build_items(&input.items)?;

        let now = Utc::now();
        let invoice = Invoice {
            invoice_id: next_id(&mut self.seq.invoice),
            party_kind: input.party_kind,
            party_id: input.party_id,
            quote_id: input.quote_id,
            total_amount: total,
            delivery_date: input.delivery_date,
            payment_status: input.payment_status,
            delivery_status: input.delivery_status,
            notes: input.notes.clone(),
            created_utc: now,
            updated_utc: now,
        };
        let detail = InvoiceDetail { invoice, items };
        self.invoices
            .insert(detail.invoice.invoice_id, detail.clone());
        Ok(detail)
    }

    fn party_mut(&mut self, kind: PartyKind, party_id: i64) -> Option<&mut Party> {
        self.parties
            .get_mut(&party_id)
            .filter(|p| p.kind == kind)
    }

    fn quote_mut(&mut self, kind: PartyKind, quote_id: i64) -> Option<&mut QuoteDetail> {
        self.quotes
            .get_mut(&quote_id)
            .filter(|d| d.quote.party_kind == kind)
    }

    fn invoice_mut(&mut self, kind: PartyKind, invoice_id: i64) -> Option<&mut InvoiceDetail> {
        self.invoices
            .get_mut(&invoice_id)
            .filter(|d| d.invoice.party_kind == kind)
    }
}

/// `Store` kept entirely in memory behind an async `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Category Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_category(&self, input: &CreateCategory) -> Result<Category, AppError> {
        let mut tables = self.tables.write().await;
        tables.ensure_category_name_free(&input.name, None)?;

        let category = Category {
            category_id: next_id(&mut tables.seq.category),
            name: input.name.clone(),
            description: input.description.clone(),
            created_utc: Utc::now(),
        };
        tables
            .categories
            .insert(category.category_id, category.clone());

        info!(category_id = category.category_id, "Category created");
        Ok(category)
    }

    async fn get_category(&self, category_id: i64) -> Result<Option<Category>, AppError> {
        Ok(self.tables.read().await.categories.get(&category_id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.category_id.cmp(&b.category_id)));
        Ok(categories)
    }

    async fn update_category(
        &self,
        category_id: i64,
        input: &UpdateCategory,
    ) -> Result<Option<Category>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&category_id) {
            return Ok(None);
        }
        if let Some(name) = input.name.as_deref() {
            tables.ensure_category_name_free(name, Some(category_id))?;
        }

        let Some(category) = tables.categories.get_mut(&category_id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            category.name = name.clone();
        }
        if let Some(description) = &input.description {
            category.description = Some(description.clone());
        }
        Ok(Some(category.clone()))
    }

    async fn count_category_products(&self, category_id: i64) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .values()
            .filter(|p| p.category_id == Some(category_id))
            .count() as i64)
    }

    #[instrument(skip(self))]
    async fn delete_category(&self, category_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .products
            .values()
            .any(|p| p.category_id == Some(category_id))
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Category {} is still referenced by products",
                category_id
            )));
        }
        Ok(tables.categories.remove(&category_id).is_some())
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let mut tables = self.tables.write().await;
        tables.ensure_sku_free(input.sku.as_deref(), None)?;
        tables.ensure_product_links(input.category_id, input.supplier_id)?;

        let now = Utc::now();
        let product = Product {
            product_id: next_id(&mut tables.seq.product),
            name: input.name.clone(),
            sku: input.sku.clone(),
            category_id: input.category_id,
            supplier_id: input.supplier_id,
            description: input.description.clone(),
            cost_price: input.cost_price,
            selling_price: input.selling_price,
            stock_quantity: input.stock_quantity,
            reorder_level: input.reorder_level,
            created_utc: now,
            updated_utc: now,
        };
        tables.products.insert(product.product_id, product.clone());

        info!(product_id = product.product_id, "Product created");
        Ok(product)
    }

    async fn get_product(&self, product_id: i64) -> Result<Option<Product>, AppError> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn list_products(&self, filter: &ListProductsFilter) -> Result<Vec<Product>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .values()
            .filter(|p| filter.category_id.is_none() || p.category_id == filter.category_id)
            .filter(|p| filter.supplier_id.is_none() || p.supplier_id == filter.supplier_id)
            .filter(|p| !filter.low_stock_only || p.is_low_stock())
            .filter(|p| match filter.search.as_deref() {
                Some(term) => {
                    contains_ignore_case(Some(&p.name), term)
                        || contains_ignore_case(p.sku.as_deref(), term)
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update_product(
        &self,
        product_id: i64,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.products.contains_key(&product_id) {
            return Ok(None);
        }
        tables.ensure_sku_free(input.sku.as_deref(), Some(product_id))?;
        tables.ensure_product_links(input.category_id, input.supplier_id)?;

        let Some(product) = tables.products.get_mut(&product_id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            product.name = name.clone();
        }
        if let Some(sku) = &input.sku {
            product.sku = Some(sku.clone());
        }
        if let Some(id) = input.category_id {
            product.category_id = Some(id);
        }
        if let Some(id) = input.supplier_id {
            product.supplier_id = Some(id);
        }
        if let Some(description) = &input.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = input.cost_price {
            product.cost_price = price;
        }
        if let Some(price) = input.selling_price {
            product.selling_price = price;
        }
        if let Some(qty) = input.stock_quantity {
            product.stock_quantity = qty;
        }
        if let Some(level) = input.reorder_level {
            product.reorder_level = level;
        }
        product.updated_utc = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn product_references(&self, product_id: i64) -> Result<ProductReferences, AppError> {
        let tables = self.tables.read().await;
        let count = |items: &[LineItem]| {
            items.iter().filter(|i| i.product_id == product_id).count() as i64
        };
        Ok(ProductReferences {
            quote_items: tables.quotes.values().map(|d| count(&d.items)).sum(),
            invoice_items: tables.invoices.values().map(|d| count(&d.items)).sum(),
        })
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, product_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let referenced = tables
            .quotes
            .values()
            .flat_map(|d| d.items.iter())
            .chain(tables.invoices.values().flat_map(|d| d.items.iter()))
            .any(|item| item.product_id == product_id);
        if referenced {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Product {} is still referenced by line items",
                product_id
            )));
        }
        Ok(tables.products.remove(&product_id).is_some())
    }

    // -------------------------------------------------------------------------
    // Party Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(kind = %input.kind))]
    async fn create_party(&self, input: &CreateParty) -> Result<Party, AppError> {
        let mut tables = self.tables.write().await;
        tables.ensure_email_free(input.kind, input.email.as_deref(), None)?;

        let now = Utc::now();
        let party = Party {
            party_id: next_id(&mut tables.seq.party),
            kind: input.kind,
            name: input.name.clone(),
            contact_name: input.contact_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            address: input.address.clone(),
            notes: input.notes.clone(),
            created_utc: now,
            updated_utc: now,
        };
        tables.parties.insert(party.party_id, party.clone());

        info!(party_id = party.party_id, kind = %party.kind, "Party created");
        Ok(party)
    }

    async fn get_party(&self, kind: PartyKind, party_id: i64) -> Result<Option<Party>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .parties
            .get(&party_id)
            .filter(|p| p.kind == kind)
            .cloned())
    }

    async fn list_parties(
        &self,
        kind: PartyKind,
        filter: &ListPartiesFilter,
    ) -> Result<Vec<Party>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .parties
            .values()
            .filter(|p| p.kind == kind)
            .filter(|p| match filter.search.as_deref() {
                Some(term) => {
                    contains_ignore_case(Some(&p.name), term)
                        || contains_ignore_case(p.email.as_deref(), term)
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update_party(
        &self,
        kind: PartyKind,
        party_id: i64,
        input: &UpdateParty,
    ) -> Result<Option<Party>, AppError> {
        let mut tables = self.tables.write().await;
        if tables.party_mut(kind, party_id).is_none() {
            return Ok(None);
        }
        if input.email.is_some() {
            tables.ensure_email_free(kind, input.email.as_deref(), Some(party_id))?;
        }

        let Some(party) = tables.party_mut(kind, party_id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            party.name = name.clone();
        }
        if let Some(v) = &input.contact_name {
            party.contact_name = Some(v.clone());
        }
        if let Some(v) = &input.email {
            party.email = Some(v.clone());
        }
        if let Some(v) = &input.phone {
            party.phone = Some(v.clone());
        }
        if let Some(v) = &input.address {
            party.address = Some(v.clone());
        }
        if let Some(v) = &input.notes {
            party.notes = Some(v.clone());
        }
        party.updated_utc = Utc::now();
        Ok(Some(party.clone()))
    }

    async fn party_references(
        &self,
        kind: PartyKind,
        party_id: i64,
    ) -> Result<PartyReferences, AppError> {
        let tables = self.tables.read().await;
        let products = match kind {
            PartyKind::Supplier => tables
                .products
                .values()
                .filter(|p| p.supplier_id == Some(party_id))
                .count() as i64,
            PartyKind::Client => 0,
        };
        Ok(PartyReferences {
            quotes: tables
                .quotes
                .values()
                .filter(|d| d.quote.party_kind == kind && d.quote.party_id == party_id)
                .count() as i64,
            invoices: tables
                .invoices
                .values()
                .filter(|d| d.invoice.party_kind == kind && d.invoice.party_id == party_id)
                .count() as i64,
            products,
        })
    }

    #[instrument(skip(self))]
    async fn delete_party(&self, kind: PartyKind, party_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.party_mut(kind, party_id).is_none() {
            return Ok(false);
        }
        let referenced = tables.quotes.values().any(|d| d.quote.party_id == party_id)
            || tables.invoices.values().any(|d| d.invoice.party_id == party_id)
            || tables
                .products
                .values()
                .any(|p| p.supplier_id == Some(party_id));
        if referenced {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "The {} {} is still referenced",
                kind,
                party_id
            )));
        }
        Ok(tables.parties.remove(&party_id).is_some())
    }

    // -------------------------------------------------------------------------
    // Quote Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(kind = %input.party_kind, party_id = input.party_id))]
    async fn create_quote(&self, input: &CreateQuote) -> Result<QuoteDetail, AppError> {
        let mut tables = self.tables.write().await;
        tables.ensure_document_links(input.party_id, &input.items)?;
        let total = total_amount(&input.items)?;
        let items = tables.build_items(&input.items)?;

        let now = Utc::now();
        let quote = Quote {
            quote_id: next_id(&mut tables.seq.quote),
            party_kind: input.party_kind,
            party_id: input.party_id,
            status: QuoteStatus::Draft,
            total_amount: total,
            valid_until: input.valid_until,
            notes: input.notes.clone(),
            converted_invoice_id: None,
            created_utc: now,
            updated_utc: now,
        };
        let detail = QuoteDetail { quote, items };
        tables.quotes.insert(detail.quote.quote_id, detail.clone());

        info!(
            quote_id = detail.quote.quote_id,
            total_amount = %detail.quote.total_amount,
            item_count = detail.items.len(),
            "Draft quote created"
        );
        Ok(detail)
    }

    async fn get_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
    ) -> Result<Option<QuoteDetail>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .quotes
            .get(&quote_id)
            .filter(|d| d.quote.party_kind == kind)
            .cloned())
    }

    async fn list_quotes(
        &self,
        kind: PartyKind,
        filter: &ListQuotesFilter,
    ) -> Result<Vec<Quote>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .quotes
            .values()
            .map(|d| &d.quote)
            .filter(|q| q.party_kind == kind)
            .filter(|q| filter.status.map_or(true, |s| q.status == s))
            .filter(|q| filter.party_id.map_or(true, |id| q.party_id == id))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, input))]
    async fn update_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
        input: &UpdateQuote,
    ) -> Result<Option<QuoteDetail>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables.quote_mut(kind, quote_id) else {
            return Ok(None);
        };
        if !current.quote.status.is_editable() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Only DRAFT quotes can be edited; quote {} is {}",
                quote_id,
                current.quote.status
            )));
        }
        let party_id = current.quote.party_id;
        tables.ensure_document_links(party_id, &input.items)?;
        let total = total_amount(&input.items)?;

        let items = tables.build_items(&input.items)?;
        let Some(detail) = tables.quote_mut(kind, quote_id) else {
            return Ok(None);
        };
        detail.quote.valid_until = input.valid_until;
        detail.quote.notes = input.notes.clone();
        detail.quote.total_amount = total;
        detail.quote.updated_utc = Utc::now();
        detail.items = items;

        info!(quote_id = quote_id, total_amount = %detail.quote.total_amount, "Draft quote updated");
        Ok(Some(detail.clone()))
    }

    #[instrument(skip(self))]
    async fn set_quote_status(
        &self,
        kind: PartyKind,
        quote_id: i64,
        from: QuoteStatus,
        to: QuoteStatus,
    ) -> Result<Option<Quote>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(detail) = tables.quote_mut(kind, quote_id) else {
            return Ok(None);
        };
        if detail.quote.status != from {
            return Ok(None);
        }
        detail.quote.status = to;
        detail.quote.updated_utc = Utc::now();

        info!(quote_id = quote_id, from = %from, to = %to, "Quote status changed");
        Ok(Some(detail.quote.clone()))
    }

    #[instrument(skip(self, invoice))]
    async fn convert_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
        from: QuoteStatus,
        invoice: &CreateInvoice,
    ) -> Result<InvoiceDetail, AppError> {
        let mut tables = self.tables.write().await;
        let quote = tables
            .quote_mut(kind, quote_id)
            .map(|d| d.quote.clone())
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id)))?;

        if let Some(existing) = quote.converted_invoice_id {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Quote {} is already converted to invoice {}",
                quote_id,
                existing
            )));
        }
        if quote.status != from {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Quote {} changed status to {} during conversion",
                quote_id,
                quote.status
            )));
        }

        let created = tables.insert_invoice(invoice)?;

        if let Some(detail) = tables.quote_mut(kind, quote_id) {
            detail.quote.status = QuoteStatus::Converted;
            detail.quote.converted_invoice_id = Some(created.invoice.invoice_id);
            detail.quote.updated_utc = Utc::now();
        }

        info!(
            quote_id = quote_id,
            invoice_id = created.invoice.invoice_id,
            "Quote converted to invoice"
        );
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn delete_quote(&self, kind: PartyKind, quote_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let deletable = tables
            .quote_mut(kind, quote_id)
            .map(|d| d.quote.status != QuoteStatus::Converted)
            .unwrap_or(false);
        if !deletable {
            return Ok(false);
        }
        Ok(tables.quotes.remove(&quote_id).is_some())
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(kind = %input.party_kind, party_id = input.party_id))]
    async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceDetail, AppError> {
        let mut tables = self.tables.write().await;
        let created = tables.insert_invoice(input)?;

        info!(
            invoice_id = created.invoice.invoice_id,
            total_amount = %created.invoice.total_amount,
            "Invoice created"
        );
        Ok(created)
    }

    async fn get_invoice(
        &self,
        kind: PartyKind,
        invoice_id: i64,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .get(&invoice_id)
            .filter(|d| d.invoice.party_kind == kind)
            .cloned())
    }

    async fn list_invoices(
        &self,
        kind: PartyKind,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .values()
            .map(|d| &d.invoice)
            .filter(|i| i.party_kind == kind)
            .filter(|i| filter.payment_status.map_or(true, |s| i.payment_status == s))
            .filter(|i| filter.delivery_status.map_or(true, |s| i.delivery_status == s))
            .filter(|i| filter.party_id.map_or(true, |id| i.party_id == id))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, input))]
    async fn update_invoice(
        &self,
        kind: PartyKind,
        invoice_id: i64,
        input: &UpdateInvoice,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables.invoice_mut(kind, invoice_id) else {
            return Ok(None);
        };
        if !current.invoice.is_editable() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice {} is paid and can no longer be edited",
                invoice_id
            )));
        }
        let party_id = current.invoice.party_id;
        tables.ensure_document_links(party_id, &input.items)?;
        let total = total_amount(&input.items)?;

        let items = tables.build_items(&input.items)?;
        let Some(detail) = tables.invoice_mut(kind, invoice_id) else {
            return Ok(None);
        };
        detail.invoice.delivery_date = input.delivery_date;
        detail.invoice.notes = input.notes.clone();
        detail.invoice.total_amount = total;
        detail.invoice.updated_utc = Utc::now();
        detail.items = items;
        Ok(Some(detail.clone()))
    }

    #[instrument(skip(self, update))]
    async fn update_invoice_status(
        &self,
        kind: PartyKind,
        invoice_id: i64,
        update: &InvoiceStatusUpdate,
    ) -> Result<Option<Invoice>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(detail) = tables.invoice_mut(kind, invoice_id) else {
            return Ok(None);
        };
        if let Some(status) = update.payment_status {
            detail.invoice.payment_status = status;
        }
        if let Some(status) = update.delivery_status {
            detail.invoice.delivery_status = status;
        }
        detail.invoice.updated_utc = Utc::now();

        info!(
            invoice_id = invoice_id,
            payment_status = detail.invoice.payment_status.as_str(),
            delivery_status = detail.invoice.delivery_status.as_str(),
            "Invoice status updated"
        );
        Ok(Some(detail.invoice.clone()))
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, kind: PartyKind, invoice_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let deletable = tables
            .invoice_mut(kind, invoice_id)
            .map(|d| d.invoice.payment_status == PaymentStatus::Unpaid && d.invoice.quote_id.is_none())
            .unwrap_or(false);
        if !deletable {
            return Ok(false);
        }
        Ok(tables.invoices.remove(&invoice_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryStatus, MAX_AMOUNT};
    use rust_decimal::Decimal;

    async fn seed(store: &MemoryStore) -> (Party, Product) {
        let client = store
            .create_party(&CreateParty {
                kind: PartyKind::Client,
                name: "Acme".to_string(),
                contact_name: None,
                email: Some("ops@acme.test".to_string()),
                phone: None,
                address: None,
                notes: None,
            })
            .await
            .unwrap();
        let product = store
            .create_product(&CreateProduct {
                name: "Bolt".to_string(),
                sku: Some("BLT-1".to_string()),
                category_id: None,
                supplier_id: None,
                description: None,
                cost_price: Decimal::from(20),
                selling_price: Decimal::from(30),
                stock_quantity: 5,
                reorder_level: 1,
            })
            .await
            .unwrap();
        (client, product)
    }

    fn lines(product_id: i64) -> Vec<NewLineItem> {
        vec![NewLineItem {
            product_id,
            quantity: 2,
            unit_price: Decimal::from(30),
        }]
    }

    fn invoice_for(quote: &Quote, items: Vec<NewLineItem>) -> CreateInvoice {
        CreateInvoice {
            party_kind: quote.party_kind,
            party_id: quote.party_id,
            quote_id: Some(quote.quote_id),
            delivery_date: None,
            payment_status: PaymentStatus::Unpaid,
            delivery_status: DeliveryStatus::InProcess,
            notes: None,
            items,
        }
    }

    async fn draft(store: &MemoryStore, client: &Party, product: &Product) -> QuoteDetail {
        store
            .create_quote(&CreateQuote {
                party_kind: PartyKind::Client,
                party_id: client.party_id,
                valid_until: None,
                notes: None,
                items: lines(product.product_id),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn quote_total_is_derived_from_items() {
        let store = MemoryStore::new();
        let (client, product) = seed(&store).await;

        let detail = draft(&store, &client, &product).await;

        assert_eq!(detail.quote.status, QuoteStatus::Draft);
        assert_eq!(detail.quote.total_amount, Decimal::from(60));
        assert_eq!(detail.items[0].total_price, Decimal::from(60));
    }

    #[tokio::test]
    async fn oversized_lines_are_refused_and_leave_no_quote() {
        let store = MemoryStore::new();
        let (client, product) = seed(&store).await;

        for (quantity, unit_price) in [
            (2, Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 0)),
            (2, MAX_AMOUNT),
        ] {
            let err = store
                .create_quote(&CreateQuote {
                    party_kind: PartyKind::Client,
                    party_id: client.party_id,
                    valid_until: None,
                    notes: None,
                    items: vec![NewLineItem {
                        product_id: product.product_id,
                        quantity,
                        unit_price,
                    }],
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }

        let quotes = store
            .list_quotes(PartyKind::Client, &ListQuotesFilter::default())
            .await
            .unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn product_supplier_must_be_a_supplier_party() {
        let store = MemoryStore::new();
        let (client, _) = seed(&store).await;

        let err = store
            .create_product(&CreateProduct {
                name: "Nut".to_string(),
                sku: None,
                category_id: None,
                supplier_id: Some(client.party_id),
                description: None,
                cost_price: Decimal::from(1),
                selling_price: Decimal::from(2),
                stock_quantity: 0,
                reorder_level: 0,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn quotes_are_scoped_by_party_kind() {
        let store = MemoryStore::new();
        let (client, product) = seed(&store).await;
        let detail = draft(&store, &client, &product).await;

        let other = store
            .get_quote(PartyKind::Supplier, detail.quote.quote_id)
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn status_change_is_compare_and_set() {
        let store = MemoryStore::new();
        let (client, product) = seed(&store).await;
        let id = draft(&store, &client, &product).await.quote.quote_id;

        let moved = store
            .set_quote_status(PartyKind::Client, id, QuoteStatus::Draft, QuoteStatus::Pending)
            .await
            .unwrap();
        assert_eq!(moved.unwrap().status, QuoteStatus::Pending);

        let stale = store
            .set_quote_status(PartyKind::Client, id, QuoteStatus::Draft, QuoteStatus::Pending)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn conversion_is_write_once() {
        let store = MemoryStore::new();
        let (client, product) = seed(&store).await;
        let detail = draft(&store, &client, &product).await;
        let id = detail.quote.quote_id;
        store
            .set_quote_status(PartyKind::Client, id, QuoteStatus::Draft, QuoteStatus::Confirmed)
            .await
            .unwrap();

        let input = invoice_for(&detail.quote, lines(product.product_id));
        let created = store
            .convert_quote(PartyKind::Client, id, QuoteStatus::Confirmed, &input)
            .await
            .unwrap();

        let err = store
            .convert_quote(PartyKind::Client, id, QuoteStatus::Confirmed, &input)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let quote = store.get_quote(PartyKind::Client, id).await.unwrap().unwrap();
        assert_eq!(quote.quote.status, QuoteStatus::Converted);
        assert_eq!(
            quote.quote.converted_invoice_id,
            Some(created.invoice.invoice_id)
        );
        let invoices = store
            .list_invoices(PartyKind::Client, &ListInvoicesFilter::default())
            .await
            .unwrap();
        assert_eq!(invoices.len(), 1);
    }

    #[tokio::test]
    async fn only_drafts_can_be_edited() {
        let store = MemoryStore::new();
        let (client, product) = seed(&store).await;
        let id = draft(&store, &client, &product).await.quote.quote_id;
        store
            .set_quote_status(PartyKind::Client, id, QuoteStatus::Draft, QuoteStatus::Pending)
            .await
            .unwrap();

        let err = store
            .update_quote(
                PartyKind::Client,
                id,
                &UpdateQuote {
                    valid_until: None,
                    notes: None,
                    items: lines(product.product_id),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn referenced_records_cannot_be_deleted() {
        let store = MemoryStore::new();
        let (client, product) = seed(&store).await;
        draft(&store, &client, &product).await;

        let refs = store.product_references(product.product_id).await.unwrap();
        assert_eq!(refs.quote_items, 1);
        assert!(store.delete_product(product.product_id).await.is_err());
        assert!(store
            .delete_party(PartyKind::Client, client.party_id)
            .await
            .is_err());
        assert!(store.get_product(product.product_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_keys_conflict() {
        let store = MemoryStore::new();
        seed(&store).await;

        let err = store
            .create_party(&CreateParty {
                kind: PartyKind::Client,
                name: "Acme again".to_string(),
                contact_name: None,
                email: Some("OPS@acme.test".to_string()),
                phone: None,
                address: None,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Same email on the supplier side is fine.
        store
            .create_party(&CreateParty {
                kind: PartyKind::Supplier,
                name: "Acme supply".to_string(),
                contact_name: None,
                email: Some("ops@acme.test".to_string()),
                phone: None,
                address: None,
                notes: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_product_in_items_is_rejected() {
        let store = MemoryStore::new();
        let (client, _) = seed(&store).await;

        let err = store
            .create_quote(&CreateQuote {
                party_kind: PartyKind::Client,
                party_id: client.party_id,
                valid_until: None,
                notes: None,
                items: lines(999),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
