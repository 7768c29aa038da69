//! Facturation Service - invoices, credit notes, quotes and payment reconciliation
//! for French freelancers.

pub mod config;
pub mod domain;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::AppState;
