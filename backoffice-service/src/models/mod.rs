//! Domain models for backoffice-service.

mod category;
mod invoice;
mod line_item;
mod party;
mod product;
mod quote;

pub use category::{Category, CreateCategory, UpdateCategory};
pub use invoice::{
    CreateInvoice, DeliveryStatus, Invoice, InvoiceDetail, InvoiceStatusUpdate,
    ListInvoicesFilter, PaymentStatus, UpdateInvoice,
};
pub use line_item::{total_amount, AmountError, LineItem, NewLineItem, MAX_AMOUNT};
pub use party::{CreateParty, ListPartiesFilter, Party, PartyKind, PartyReferences, UpdateParty};
pub use product::{
    CreateProduct, ListProductsFilter, Product, ProductReferences, UpdateProduct,
};
pub use quote::{
    CreateQuote, ListQuotesFilter, Quote, QuoteDetail, QuoteStatus, TransitionError,
    UpdateQuote,
};
