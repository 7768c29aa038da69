//! Document numbers: `{PREFIX}-{YEAR}-{SEQ:04}`.
//!
//! Invoices, credit notes and quotes each have their own sequence per user
//! and per calendar year. Sequences start at 1 every January.

use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Invoice,
    CreditNote,
    Quote,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "FAC",
            DocumentKind::CreditNote => "AV",
            DocumentKind::Quote => "DEV",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::CreditNote => "credit_note",
            DocumentKind::Quote => "quote",
        }
    }

    fn code(&self) -> u64 {
        match self {
            DocumentKind::Invoice => 1,
            DocumentKind::CreditNote => 2,
            DocumentKind::Quote => 3,
        }
    }

    /// Key for `pg_advisory_xact_lock`, stable for a given (user, kind, year).
    pub fn lock_key(&self, user_id: Uuid, year: i32) -> i64 {
        let (high, low) = user_id.as_u64_pair();
        let mixed = high ^ low.rotate_left(17) ^ (self.code() << 56) ^ ((year as u64) << 40);
        mixed as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentNumber {
    pub kind: DocumentKind,
    pub year: i32,
    pub seq: i32,
}

impl DocumentNumber {
    pub fn new(kind: DocumentKind, year: i32, seq: i32) -> Self {
        Self { kind, year, seq }
    }

    /// The number following the highest sequence already used this year.
    pub fn next(kind: DocumentKind, year: i32, highest: Option<i32>) -> Self {
        Self::new(kind, year, highest.unwrap_or(0) + 1)
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:04}", self.kind.prefix(), self.year, self.seq)
    }
}
