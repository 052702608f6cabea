//! PostgreSQL store for backoffice-service.

use async_trait::async_trait;
use backoffice_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::models::{
    total_amount, Category, CreateCategory, CreateInvoice, CreateParty, CreateProduct,
    CreateQuote, Invoice, InvoiceDetail, InvoiceStatusUpdate, LineItem, ListInvoicesFilter,
    ListPartiesFilter, ListProductsFilter, ListQuotesFilter, NewLineItem, Party, PartyKind,
    PartyReferences, Product, ProductReferences, Quote, QuoteDetail, QuoteStatus,
    UpdateCategory, UpdateInvoice, UpdateParty, UpdateProduct, UpdateQuote,
};
use crate::services::metrics::QueryTimer;
use crate::services::store::Store;

const BACKEND: &str = "postgres";

const CATEGORY_COLUMNS: &str = "category_id, name, description, created_utc";

const PARTY_COLUMNS: &str = "party_id, kind, name, contact_name, email, phone, address, notes, \
     created_utc, updated_utc";

const PRODUCT_COLUMNS: &str = "product_id, name, sku, category_id, supplier_id, description, \
     cost_price, selling_price, stock_quantity, reorder_level, created_utc, updated_utc";

const QUOTE_COLUMNS: &str = "quote_id, party_kind, party_id, status, total_amount, valid_until, \
     notes, converted_invoice_id, created_utc, updated_utc";

const INVOICE_COLUMNS: &str = "invoice_id, party_kind, party_id, quote_id, total_amount, \
     delivery_date, payment_status, delivery_status, notes, created_utc, updated_utc";

const ITEM_COLUMNS: &str = "item_id, product_id, quantity, unit_price, total_price";

/// Which document a set of line items belongs to.
#[derive(Debug, Clone, Copy)]
enum ItemTable {
    Quote,
    Invoice,
}

impl ItemTable {
    fn table(self) -> &'static str {
        match self {
            ItemTable::Quote => "quote_items",
            ItemTable::Invoice => "invoice_items",
        }
    }

    fn parent_column(self) -> &'static str {
        match self {
            ItemTable::Quote => "quote_id",
            ItemTable::Invoice => "invoice_id",
        }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Map constraint violations on writes to client errors.
fn write_error(context: &str, conflict: String, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!(conflict))
        }
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::BadRequest(anyhow::anyhow!("{}: referenced record does not exist", context))
        }
        _ => db_error(context, e),
    }
}

/// Map a foreign-key violation on a write with no unique key of its own.
fn reference_error(context: &str, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::BadRequest(anyhow::anyhow!("{}: referenced record does not exist", context))
        }
        _ => db_error(context, e),
    }
}

/// Map constraint violations on deletes: a dangling reference is a conflict.
fn delete_error(context: &str, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::Conflict(anyhow::anyhow!("{}: record is still referenced", context))
        }
        _ => db_error(context, e),
    }
}

/// `%term%` for ILIKE, with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "backoffice-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn fetch_items(
        conn: &mut PgConnection,
        table: ItemTable,
        parent_id: i64,
    ) -> Result<Vec<LineItem>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY sort_order, item_id",
            ITEM_COLUMNS,
            table.table(),
            table.parent_column()
        );
        sqlx::query_as::<_, LineItem>(&sql)
            .bind(parent_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to get line items", e))
    }

    async fn insert_items(
        conn: &mut PgConnection,
        table: ItemTable,
        parent_id: i64,
        items: &[NewLineItem],
    ) -> Result<Vec<LineItem>, AppError> {
        let sql = format!(
            "INSERT INTO {} ({}, product_id, quantity, unit_price, total_price, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            table.table(),
            table.parent_column(),
            ITEM_COLUMNS
        );

        let mut inserted = Vec::with_capacity(items.len());
        for (sort_order, item) in items.iter().enumerate() {
            let total_price = item.total_price()?;
            let line = sqlx::query_as::<_, LineItem>(&sql)
                .bind(parent_id)
                .bind(item.product_id)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(total_price)
                .bind(sort_order as i32)
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| reference_error("Failed to add line item", e))?;
            inserted.push(line);
        }
        Ok(inserted)
    }

    async fn replace_items(
        conn: &mut PgConnection,
        table: ItemTable,
        parent_id: i64,
        items: &[NewLineItem],
    ) -> Result<Vec<LineItem>, AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            table.table(),
            table.parent_column()
        );
        sqlx::query(&sql)
            .bind(parent_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to clear line items", e))?;

        Self::insert_items(conn, table, parent_id, items).await
    }

    async fn insert_invoice(
        conn: &mut PgConnection,
        input: &CreateInvoice,
    ) -> Result<InvoiceDetail, AppError> {
        let total = total_amount(&input.items)?;
        let sql = format!(
            "INSERT INTO invoices (party_kind, party_id, quote_id, total_amount, delivery_date, \
                 payment_status, delivery_status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {}",
            INVOICE_COLUMNS
        );

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(input.party_kind.as_str())
            .bind(input.party_id)
            .bind(input.quote_id)
            .bind(total)
            .bind(input.delivery_date)
            .bind(input.payment_status.as_str())
            .bind(input.delivery_status.as_str())
            .bind(&input.notes)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                write_error(
                    "Failed to create invoice",
                    format!(
                        "Quote {} already has an invoice",
                        input.quote_id.unwrap_or_default()
                    ),
                    e,
                )
            })?;

        let items =
            Self::insert_items(conn, ItemTable::Invoice, invoice.invoice_id, &input.items).await?;

        Ok(InvoiceDetail { invoice, items })
    }
}

#[async_trait]
impl Store for Database {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Category Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_category(&self, input: &CreateCategory) -> Result<Category, AppError> {
        let timer = QueryTimer::start(BACKEND, "create_category");

        let sql = format!(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING {}",
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    "Failed to create category",
                    format!("Category '{}' already exists", input.name),
                    e,
                )
            })?;

        timer.observe_duration();

        info!(category_id = category.category_id, "Category created");

        Ok(category)
    }

    #[instrument(skip(self))]
    async fn get_category(&self, category_id: i64) -> Result<Option<Category>, AppError> {
        let timer = QueryTimer::start(BACKEND, "get_category");

        let sql = format!(
            "SELECT {} FROM categories WHERE category_id = $1",
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get category", e))?;

        timer.observe_duration();

        Ok(category)
    }

    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let timer = QueryTimer::start(BACKEND, "list_categories");

        let sql = format!(
            "SELECT {} FROM categories ORDER BY name, category_id",
            CATEGORY_COLUMNS
        );
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list categories", e))?;

        timer.observe_duration();

        Ok(categories)
    }

    #[instrument(skip(self, input))]
    async fn update_category(
        &self,
        category_id: i64,
        input: &UpdateCategory,
    ) -> Result<Option<Category>, AppError> {
        let timer = QueryTimer::start(BACKEND, "update_category");

        let sql = format!(
            "UPDATE categories \
             SET name = COALESCE($2, name), description = COALESCE($3, description) \
             WHERE category_id = $1 \
             RETURNING {}",
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(category_id)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    "Failed to update category",
                    format!(
                        "Category '{}' already exists",
                        input.name.as_deref().unwrap_or_default()
                    ),
                    e,
                )
            })?;

        timer.observe_duration();

        Ok(category)
    }

    #[instrument(skip(self))]
    async fn count_category_products(&self, category_id: i64) -> Result<i64, AppError> {
        let timer = QueryTimer::start(BACKEND, "count_category_products");

        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE category_id = $1")
                .bind(category_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("Failed to count category products", e))?;

        timer.observe_duration();

        Ok(count)
    }

    #[instrument(skip(self))]
    async fn delete_category(&self, category_id: i64) -> Result<bool, AppError> {
        let timer = QueryTimer::start(BACKEND, "delete_category");

        let result = sqlx::query("DELETE FROM categories WHERE category_id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await
            .map_err(|e| delete_error("Failed to delete category", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = QueryTimer::start(BACKEND, "create_product");

        let sql = format!(
            "INSERT INTO products (name, sku, category_id, supplier_id, description, cost_price, \
                 selling_price, stock_quantity, reorder_level) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {}",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(&input.name)
            .bind(&input.sku)
            .bind(input.category_id)
            .bind(input.supplier_id)
            .bind(&input.description)
            .bind(input.cost_price)
            .bind(input.selling_price)
            .bind(input.stock_quantity)
            .bind(input.reorder_level)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    "Failed to create product",
                    format!(
                        "Product with SKU '{}' already exists",
                        input.sku.as_deref().unwrap_or_default()
                    ),
                    e,
                )
            })?;

        timer.observe_duration();

        info!(product_id = product.product_id, "Product created");

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn get_product(&self, product_id: i64) -> Result<Option<Product>, AppError> {
        let timer = QueryTimer::start(BACKEND, "get_product");

        let sql = format!(
            "SELECT {} FROM products WHERE product_id = $1",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get product", e))?;

        timer.observe_duration();

        Ok(product)
    }

    #[instrument(skip(self, filter))]
    async fn list_products(&self, filter: &ListProductsFilter) -> Result<Vec<Product>, AppError> {
        let timer = QueryTimer::start(BACKEND, "list_products");

        let search = filter.search.as_deref().map(like_pattern);
        let sql = format!(
            "SELECT {} FROM products \
             WHERE ($1::bigint IS NULL OR category_id = $1) \
               AND ($2::bigint IS NULL OR supplier_id = $2) \
               AND ($3::bool = FALSE OR stock_quantity <= reorder_level) \
               AND ($4::varchar IS NULL OR name ILIKE $4 OR sku ILIKE $4) \
             ORDER BY product_id",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(filter.category_id)
            .bind(filter.supplier_id)
            .bind(filter.low_stock_only)
            .bind(search)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list products", e))?;

        timer.observe_duration();

        Ok(products)
    }

    #[instrument(skip(self, input))]
    async fn update_product(
        &self,
        product_id: i64,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let timer = QueryTimer::start(BACKEND, "update_product");

        let sql = format!(
            "UPDATE products \
             SET name = COALESCE($2, name), \
                 sku = COALESCE($3, sku), \
                 category_id = COALESCE($4, category_id), \
                 supplier_id = COALESCE($5, supplier_id), \
                 description = COALESCE($6, description), \
                 cost_price = COALESCE($7, cost_price), \
                 selling_price = COALESCE($8, selling_price), \
                 stock_quantity = COALESCE($9, stock_quantity), \
                 reorder_level = COALESCE($10, reorder_level), \
                 updated_utc = NOW() \
             WHERE product_id = $1 \
             RETURNING {}",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(product_id)
            .bind(&input.name)
            .bind(&input.sku)
            .bind(input.category_id)
            .bind(input.supplier_id)
            .bind(&input.description)
            .bind(input.cost_price)
            .bind(input.selling_price)
            .bind(input.stock_quantity)
            .bind(input.reorder_level)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    "Failed to update product",
                    format!(
                        "Product with SKU '{}' already exists",
                        input.sku.as_deref().unwrap_or_default()
                    ),
                    e,
                )
            })?;

        timer.observe_duration();

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn product_references(&self, product_id: i64) -> Result<ProductReferences, AppError> {
        let timer = QueryTimer::start(BACKEND, "product_references");

        let (quote_items, invoice_items) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM quote_items WHERE product_id = $1),
                (SELECT COUNT(*) FROM invoice_items WHERE product_id = $1)
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count product references", e))?;

        timer.observe_duration();

        Ok(ProductReferences {
            quote_items,
            invoice_items,
        })
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, product_id: i64) -> Result<bool, AppError> {
        let timer = QueryTimer::start(BACKEND, "delete_product");

        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| delete_error("Failed to delete product", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Party Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(kind = %input.kind))]
    async fn create_party(&self, input: &CreateParty) -> Result<Party, AppError> {
        let timer = QueryTimer::start(BACKEND, "create_party");

        let sql = format!(
            "INSERT INTO parties (kind, name, contact_name, email, phone, address, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {}",
            PARTY_COLUMNS
        );
        let party = sqlx::query_as::<_, Party>(&sql)
            .bind(input.kind.as_str())
            .bind(&input.name)
            .bind(&input.contact_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.address)
            .bind(&input.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    "Failed to create party",
                    format!(
                        "A {} with email '{}' already exists",
                        input.kind,
                        input.email.as_deref().unwrap_or_default()
                    ),
                    e,
                )
            })?;

        timer.observe_duration();

        info!(party_id = party.party_id, kind = %party.kind, "Party created");

        Ok(party)
    }

    #[instrument(skip(self))]
    async fn get_party(&self, kind: PartyKind, party_id: i64) -> Result<Option<Party>, AppError> {
        let timer = QueryTimer::start(BACKEND, "get_party");

        let sql = format!(
            "SELECT {} FROM parties WHERE party_id = $1 AND kind = $2",
            PARTY_COLUMNS
        );
        let party = sqlx::query_as::<_, Party>(&sql)
            .bind(party_id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get party", e))?;

        timer.observe_duration();

        Ok(party)
    }

    #[instrument(skip(self, filter))]
    async fn list_parties(
        &self,
        kind: PartyKind,
        filter: &ListPartiesFilter,
    ) -> Result<Vec<Party>, AppError> {
        let timer = QueryTimer::start(BACKEND, "list_parties");

        let search = filter.search.as_deref().map(like_pattern);
        let sql = format!(
            "SELECT {} FROM parties \
             WHERE kind = $1 \
               AND ($2::varchar IS NULL OR name ILIKE $2 OR email ILIKE $2) \
             ORDER BY party_id",
            PARTY_COLUMNS
        );
        let parties = sqlx::query_as::<_, Party>(&sql)
            .bind(kind.as_str())
            .bind(search)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list parties", e))?;

        timer.observe_duration();

        Ok(parties)
    }

    #[instrument(skip(self, input))]
    async fn update_party(
        &self,
        kind: PartyKind,
        party_id: i64,
        input: &UpdateParty,
    ) -> Result<Option<Party>, AppError> {
        let timer = QueryTimer::start(BACKEND, "update_party");

        let sql = format!(
            "UPDATE parties \
             SET name = COALESCE($3, name), \
                 contact_name = COALESCE($4, contact_name), \
                 email = COALESCE($5, email), \
                 phone = COALESCE($6, phone), \
                 address = COALESCE($7, address), \
                 notes = COALESCE($8, notes), \
                 updated_utc = NOW() \
             WHERE party_id = $1 AND kind = $2 \
             RETURNING {}",
            PARTY_COLUMNS
        );
        let party = sqlx::query_as::<_, Party>(&sql)
            .bind(party_id)
            .bind(kind.as_str())
            .bind(&input.name)
            .bind(&input.contact_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.address)
            .bind(&input.notes)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    "Failed to update party",
                    format!(
                        "A {} with email '{}' already exists",
                        kind,
                        input.email.as_deref().unwrap_or_default()
                    ),
                    e,
                )
            })?;

        timer.observe_duration();

        Ok(party)
    }

    #[instrument(skip(self))]
    async fn party_references(
        &self,
        kind: PartyKind,
        party_id: i64,
    ) -> Result<PartyReferences, AppError> {
        let timer = QueryTimer::start(BACKEND, "party_references");

        let (quotes, invoices, products) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM quotes WHERE party_kind = $2 AND party_id = $1),
                (SELECT COUNT(*) FROM invoices WHERE party_kind = $2 AND party_id = $1),
                (SELECT COUNT(*) FROM products WHERE supplier_id = $1 AND $2 = 'SUPPLIER')
            "#,
        )
        .bind(party_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count party references", e))?;

        timer.observe_duration();

        Ok(PartyReferences {
            quotes,
            invoices,
            products,
        })
    }

    #[instrument(skip(self))]
    async fn delete_party(&self, kind: PartyKind, party_id: i64) -> Result<bool, AppError> {
        let timer = QueryTimer::start(BACKEND, "delete_party");

        let result = sqlx::query("DELETE FROM parties WHERE party_id = $1 AND kind = $2")
            .bind(party_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| delete_error("Failed to delete party", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Quote Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(kind = %input.party_kind, party_id = input.party_id))]
    async fn create_quote(&self, input: &CreateQuote) -> Result<QuoteDetail, AppError> {
        let timer = QueryTimer::start(BACKEND, "create_quote");
        let total = total_amount(&input.items)?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let sql = format!(
            "INSERT INTO quotes (party_kind, party_id, status, total_amount, valid_until, notes) \
             VALUES ($1, $2, 'DRAFT', $3, $4, $5) \
             RETURNING {}",
            QUOTE_COLUMNS
        );
        let quote = sqlx::query_as::<_, Quote>(&sql)
            .bind(input.party_kind.as_str())
            .bind(input.party_id)
            .bind(total)
            .bind(input.valid_until)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("Failed to create quote", "Duplicate quote".to_string(), e))?;

        let items = Self::insert_items(&mut tx, ItemTable::Quote, quote.quote_id, &input.items)
            .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            quote_id = quote.quote_id,
            total_amount = %quote.total_amount,
            item_count = items.len(),
            "Draft quote created"
        );

        Ok(QuoteDetail { quote, items })
    }

    #[instrument(skip(self))]
    async fn get_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
    ) -> Result<Option<QuoteDetail>, AppError> {
        let timer = QueryTimer::start(BACKEND, "get_quote");

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| db_error("Failed to acquire connection", e))?;

        let sql = format!(
            "SELECT {} FROM quotes WHERE quote_id = $1 AND party_kind = $2",
            QUOTE_COLUMNS
        );
        let quote = sqlx::query_as::<_, Quote>(&sql)
            .bind(quote_id)
            .bind(kind.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to get quote", e))?;

        let detail = match quote {
            Some(quote) => {
                let items = Self::fetch_items(&mut conn, ItemTable::Quote, quote_id).await?;
                Some(QuoteDetail { quote, items })
            }
            None => None,
        };

        timer.observe_duration();

        Ok(detail)
    }

    #[instrument(skip(self, filter))]
    async fn list_quotes(
        &self,
        kind: PartyKind,
        filter: &ListQuotesFilter,
    ) -> Result<Vec<Quote>, AppError> {
        let timer = QueryTimer::start(BACKEND, "list_quotes");

        let status = filter.status.map(|s| s.as_str());
        let sql = format!(
            "SELECT {} FROM quotes \
             WHERE party_kind = $1 \
               AND ($2::varchar IS NULL OR status = $2) \
               AND ($3::bigint IS NULL OR party_id = $3) \
             ORDER BY quote_id",
            QUOTE_COLUMNS
        );
        let quotes = sqlx::query_as::<_, Quote>(&sql)
            .bind(kind.as_str())
            .bind(status)
            .bind(filter.party_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list quotes", e))?;

        timer.observe_duration();

        Ok(quotes)
    }

    #[instrument(skip(self, input))]
    async fn update_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
        input: &UpdateQuote,
    ) -> Result<Option<QuoteDetail>, AppError> {
        let timer = QueryTimer::start(BACKEND, "update_quote");
        let total = total_amount(&input.items)?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let sql = format!(
            "UPDATE quotes \
             SET valid_until = $3, notes = $4, total_amount = $5, updated_utc = NOW() \
             WHERE quote_id = $1 AND party_kind = $2 AND status = 'DRAFT' \
             RETURNING {}",
            QUOTE_COLUMNS
        );
        let quote = sqlx::query_as::<_, Quote>(&sql)
            .bind(quote_id)
            .bind(kind.as_str())
            .bind(input.valid_until)
            .bind(&input.notes)
            .bind(total)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to update quote", e))?;

        let Some(quote) = quote else {
            let status = sqlx::query_scalar::<_, QuoteStatus>(
                "SELECT status FROM quotes WHERE quote_id = $1 AND party_kind = $2",
            )
            .bind(quote_id)
            .bind(kind.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to get quote status", e))?;
            tx.rollback().await.ok();

            return match status {
                Some(status) => Err(AppError::Conflict(anyhow::anyhow!(
                    "Only DRAFT quotes can be edited; quote {} is {}",
                    quote_id,
                    status
                ))),
                None => Ok(None),
            };
        };

        let items =
            Self::replace_items(&mut tx, ItemTable::Quote, quote_id, &input.items).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(quote_id = quote_id, total_amount = %quote.total_amount, "Draft quote updated");

        Ok(Some(QuoteDetail { quote, items }))
    }

    #[instrument(skip(self))]
    async fn set_quote_status(
        &self,
        kind: PartyKind,
        quote_id: i64,
        from: QuoteStatus,
        to: QuoteStatus,
    ) -> Result<Option<Quote>, AppError> {
        let timer = QueryTimer::start(BACKEND, "set_quote_status");

        let sql = format!(
            "UPDATE quotes SET status = $4, updated_utc = NOW() \
             WHERE quote_id = $1 AND party_kind = $2 AND status = $3 \
             RETURNING {}",
            QUOTE_COLUMNS
        );
        let quote = sqlx::query_as::<_, Quote>(&sql)
            .bind(quote_id)
            .bind(kind.as_str())
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update quote status", e))?;

        timer.observe_duration();

        if quote.is_some() {
            info!(quote_id = quote_id, from = %from, to = %to, "Quote status changed");
        }

        Ok(quote)
    }

    #[instrument(skip(self, invoice))]
    async fn convert_quote(
        &self,
        kind: PartyKind,
        quote_id: i64,
        from: QuoteStatus,
        invoice: &CreateInvoice,
    ) -> Result<InvoiceDetail, AppError> {
        let timer = QueryTimer::start(BACKEND, "convert_quote");

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Lock the quote row so concurrent conversions serialize here.
        let sql = format!(
            "SELECT {} FROM quotes WHERE quote_id = $1 AND party_kind = $2 FOR UPDATE",
            QUOTE_COLUMNS
        );
        let quote = sqlx::query_as::<_, Quote>(&sql)
            .bind(quote_id)
            .bind(kind.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to lock quote", e))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id)))?;

        if let Some(existing) = quote.converted_invoice_id {
            tx.rollback().await.ok();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Quote {} is already converted to invoice {}",
                quote_id,
                existing
            )));
        }
        if quote.status != from {
            tx.rollback().await.ok();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Quote {} changed status to {} during conversion",
                quote_id,
                quote.status
            )));
        }

        let created = Self::insert_invoice(&mut tx, invoice).await?;

        sqlx::query(
            r#"
            UPDATE quotes
            SET status = 'CONVERTED', converted_invoice_id = $2, updated_utc = NOW()
            WHERE quote_id = $1 AND converted_invoice_id IS NULL
            "#,
        )
        .bind(quote_id)
        .bind(created.invoice.invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to mark quote converted", e))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            quote_id = quote_id,
            invoice_id = created.invoice.invoice_id,
            "Quote converted to invoice"
        );

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn delete_quote(&self, kind: PartyKind, quote_id: i64) -> Result<bool, AppError> {
        let timer = QueryTimer::start(BACKEND, "delete_quote");

        let result = sqlx::query(
            "DELETE FROM quotes WHERE quote_id = $1 AND party_kind = $2 AND status <> 'CONVERTED'",
        )
        .bind(quote_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| delete_error("Failed to delete quote", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(kind = %input.party_kind, party_id = input.party_id))]
    async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceDetail, AppError> {
        let timer = QueryTimer::start(BACKEND, "create_invoice");

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let created = Self::insert_invoice(&mut tx, input).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = created.invoice.invoice_id,
            total_amount = %created.invoice.total_amount,
            "Invoice created"
        );

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_invoice(
        &self,
        kind: PartyKind,
        invoice_id: i64,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = QueryTimer::start(BACKEND, "get_invoice");

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| db_error("Failed to acquire connection", e))?;

        let sql = format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1 AND party_kind = $2",
            INVOICE_COLUMNS
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .bind(kind.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to get invoice", e))?;

        let detail = match invoice {
            Some(invoice) => {
                let items = Self::fetch_items(&mut conn, ItemTable::Invoice, invoice_id).await?;
                Some(InvoiceDetail { invoice, items })
            }
            None => None,
        };

        timer.observe_duration();

        Ok(detail)
    }

    #[instrument(skip(self, filter))]
    async fn list_invoices(
        &self,
        kind: PartyKind,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = QueryTimer::start(BACKEND, "list_invoices");

        let sql = format!(
            "SELECT {} FROM invoices \
             WHERE party_kind = $1 \
               AND ($2::varchar IS NULL OR payment_status = $2) \
               AND ($3::varchar IS NULL OR delivery_status = $3) \
               AND ($4::bigint IS NULL OR party_id = $4) \
             ORDER BY invoice_id",
            INVOICE_COLUMNS
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(kind.as_str())
            .bind(filter.payment_status.map(|s| s.as_str()))
            .bind(filter.delivery_status.map(|s| s.as_str()))
            .bind(filter.party_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list invoices", e))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self, input))]
    async fn update_invoice(
        &self,
        kind: PartyKind,
        invoice_id: i64,
        input: &UpdateInvoice,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = QueryTimer::start(BACKEND, "update_invoice");
        let total = total_amount(&input.items)?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let sql = format!(
            "UPDATE invoices \
             SET delivery_date = $3, notes = $4, total_amount = $5, updated_utc = NOW() \
             WHERE invoice_id = $1 AND party_kind = $2 AND payment_status = 'UNPAID' \
             RETURNING {}",
            INVOICE_COLUMNS
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .bind(kind.as_str())
            .bind(input.delivery_date)
            .bind(&input.notes)
            .bind(total)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to update invoice", e))?;

        let Some(invoice) = invoice else {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT invoice_id FROM invoices WHERE invoice_id = $1 AND party_kind = $2",
            )
            .bind(invoice_id)
            .bind(kind.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to get invoice", e))?
            .is_some();
            tx.rollback().await.ok();

            return if exists {
                Err(AppError::Conflict(anyhow::anyhow!(
                    "Invoice {} is paid and can no longer be edited",
                    invoice_id
                )))
            } else {
                Ok(None)
            };
        };

        let items =
            Self::replace_items(&mut tx, ItemTable::Invoice, invoice_id, &input.items).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(Some(InvoiceDetail { invoice, items }))
    }

    #[instrument(skip(self, update))]
    async fn update_invoice_status(
        &self,
        kind: PartyKind,
        invoice_id: i64,
        update: &InvoiceStatusUpdate,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = QueryTimer::start(BACKEND, "update_invoice_status");

        let sql = format!(
            "UPDATE invoices \
             SET payment_status = COALESCE($3, payment_status), \
                 delivery_status = COALESCE($4, delivery_status), \
                 updated_utc = NOW() \
             WHERE invoice_id = $1 AND party_kind = $2 \
             RETURNING {}",
            INVOICE_COLUMNS
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .bind(kind.as_str())
            .bind(update.payment_status.map(|s| s.as_str()))
            .bind(update.delivery_status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update invoice status", e))?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(
                invoice_id = inv.invoice_id,
                payment_status = inv.payment_status.as_str(),
                delivery_status = inv.delivery_status.as_str(),
                "Invoice status updated"
            );
        }

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, kind: PartyKind, invoice_id: i64) -> Result<bool, AppError> {
        let timer = QueryTimer::start(BACKEND, "delete_invoice");

        let result = sqlx::query(
            r#"
            DELETE FROM invoices
            WHERE invoice_id = $1 AND party_kind = $2
              AND payment_status = 'UNPAID' AND quote_id IS NULL
            "#,
        )
        .bind(invoice_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| delete_error("Failed to delete invoice", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("bolt"), "%bolt%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn item_tables_point_at_their_parent() {
        assert_eq!(ItemTable::Quote.table(), "quote_items");
        assert_eq!(ItemTable::Quote.parent_column(), "quote_id");
        assert_eq!(ItemTable::Invoice.table(), "invoice_items");
        assert_eq!(ItemTable::Invoice.parent_column(), "invoice_id");
    }

    #[test]
    fn line_item_errors_never_claim_a_duplicate() {
        let err = reference_error("Failed to add line item", sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::DatabaseError(_)));
        assert!(!err.to_string().contains("Duplicate"));
    }
}
