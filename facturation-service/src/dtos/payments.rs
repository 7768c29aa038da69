use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::reconciliation::Balance;
use crate::models::{
    CreatePayment, OverdueSummary, Payment, PaymentMethod, PaymentWithInvoice, TreasuryStats,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub invoice_id: Uuid,
    pub amount: Money,
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

impl CreatePaymentRequest {
    pub fn into_model(self) -> CreatePayment {
        CreatePayment {
            invoice_id: self.invoice_id,
            amount: self.amount,
            method: self.method.unwrap_or(PaymentMethod::BankTransfer),
            reference: self.reference,
            notes: self.notes,
            payment_date: self.payment_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: Uuid,
    pub invoice_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub amount: Money,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            invoice_id: payment.invoice_id,
            invoice_number: None,
            amount: payment.amount,
            method: payment.method,
            reference: payment.reference,
            notes: payment.notes,
            payment_date: payment.payment_date,
            created_at: payment.created_at,
        }
    }
}

impl From<PaymentWithInvoice> for PaymentResponse {
    fn from(value: PaymentWithInvoice) -> Self {
        Self {
            invoice_number: Some(value.invoice_number),
            ..Self::from(value.payment)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoicePaymentsResponse {
    pub payments: Vec<PaymentResponse>,
    pub summary: Balance,
}

#[derive(Debug, Serialize)]
pub struct OverdueResponse {
    pub count: i64,
    pub amount: Money,
}

impl From<OverdueSummary> for OverdueResponse {
    fn from(summary: OverdueSummary) -> Self {
        Self {
            count: summary.count,
            amount: summary.amount,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub collected_this_month: Money,
    pub invoiced_this_month: Money,
    pub outstanding: Money,
    pub overdue: OverdueResponse,
    pub recent_payments: Vec<PaymentResponse>,
}

impl From<TreasuryStats> for StatsResponse {
    fn from(stats: TreasuryStats) -> Self {
        Self {
            collected_this_month: stats.collected_this_month,
            invoiced_this_month: stats.invoiced_this_month,
            outstanding: stats.outstanding,
            overdue: stats.overdue.into(),
            recent_payments: stats
                .recent_payments
                .into_iter()
                .map(PaymentResponse::from)
                .collect(),
        }
    }
}
