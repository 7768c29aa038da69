//! Domain models for facturation-service.

mod client;
mod invoice;
mod line_item;
mod payment;
mod quote;
mod settings;

pub use client::{Client, ClientStatus, ClientType, CreateClient, UpdateClient};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceStatus, InvoiceType, InvoiceWithItems, ListInvoicesFilter,
    PaymentStatus, UpdateInvoice,
};
pub use line_item::{InvoiceItem, QuoteItem};
pub use payment::{
    CreatePayment, OverdueSummary, Payment, PaymentMethod, PaymentWithInvoice, TreasuryStats,
};
pub use quote::{
    CreateQuote, ListQuotesFilter, Quote, QuoteStatus, QuoteWithItems, UpdateQuote,
};
pub use settings::{DocumentSettings, UpdateDocumentSettings};
