//! Line and document totals.

use rust_decimal::Decimal;

use super::error::DomainError;
use super::money::Money;

/// A line item as submitted by the caller, before totals are computed.
#[derive(Debug, Clone, PartialEq)]
pub struct LineDraft {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    /// Percentage in `[0, 100]`.
    pub discount: Decimal,
    pub vat_rate: Option<Decimal>,
}

/// A line item with its computed total, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Decimal,
    pub vat_rate: Option<Decimal>,
    pub total: Money,
    pub sort_order: i32,
}

impl PricedLine {
    /// The same line with price and total negated, as printed on a credit note.
    pub fn negated(&self) -> Self {
        Self {
            unit_price: -self.unit_price,
            total: -self.total,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub vat_rate: Decimal,
    pub vat_amount: Money,
    pub total: Money,
}

impl DocumentTotals {
    pub fn negated(&self) -> Self {
        Self {
            subtotal: -self.subtotal,
            vat_rate: self.vat_rate,
            vat_amount: -self.vat_amount,
            total: -self.total,
        }
    }
}

/// Quantities are stored as `NUMERIC(12, 3)`.
const QUANTITY_SCALE: u32 = 3;
const QUANTITY_LIMIT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
/// Discounts and VAT rates are stored as `NUMERIC(5, 2)`.
const RATE_SCALE: u32 = 2;

/// Number of significant decimal places, ignoring trailing zeros.
fn decimal_places(value: Decimal) -> u32 {
    value.normalize().scale()
}

pub fn validate_vat_rate(rate: Decimal) -> Result<(), DomainError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(
            "Le taux de TVA doit être compris entre 0 et 100",
        ));
    }
    if decimal_places(rate) > RATE_SCALE {
        return Err(DomainError::validation(
            "Le taux de TVA accepte au plus 2 décimales",
        ));
    }
    Ok(())
}

fn validate_line(position: usize, line: &LineDraft) -> Result<(), DomainError> {
    let n = position + 1;
    if line.description.trim().is_empty() {
        return Err(DomainError::validation(format!(
            "Ligne {n} : la description est obligatoire"
        )));
    }
    if line.quantity <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "Ligne {n} : la quantité doit être positive"
        )));
    }
    if line.quantity >= QUANTITY_LIMIT {
        return Err(DomainError::validation(format!(
            "Ligne {n} : la quantité doit être inférieure à 1 000 000 000"
        )));
    }
    if decimal_places(line.quantity) > QUANTITY_SCALE {
        return Err(DomainError::validation(format!(
            "Ligne {n} : la quantité accepte au plus 3 décimales"
        )));
    }
    if !line.unit_price.is_positive() {
        return Err(DomainError::validation(format!(
            "Ligne {n} : le prix unitaire doit être positif"
        )));
    }
    if line.discount < Decimal::ZERO || line.discount > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(format!(
            "Ligne {n} : la remise doit être comprise entre 0 et 100"
        )));
    }
    if decimal_places(line.discount) > RATE_SCALE {
        return Err(DomainError::validation(format!(
            "Ligne {n} : la remise accepte au plus 2 décimales"
        )));
    }
    if let Some(rate) = line.vat_rate {
        validate_vat_rate(rate)?;
    }
    Ok(())
}

/// Validate submitted lines and compute each line total.
///
/// At least one line is required. The sort order follows submission order.
pub fn price_lines(lines: Vec<LineDraft>) -> Result<Vec<PricedLine>, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("Au moins une ligne est requise"));
    }

    lines
        .into_iter()
        .enumerate()
        .map(|(position, line)| -> Result<PricedLine, DomainError> {
            validate_line(position, &line)?;
            let total = line.unit_price.extend(line.quantity, line.discount)?;
            Ok(PricedLine {
                description: line.description.trim().to_string(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount: line.discount,
                vat_rate: line.vat_rate,
                total,
                sort_order: position as i32,
            })
        })
        .collect()
}

/// Subtotal is the sum of line totals; VAT is applied once on the subtotal.
pub fn document_totals(lines: &[PricedLine], vat_rate: Decimal) -> Result<DocumentTotals, DomainError> {
    validate_vat_rate(vat_rate)?;
    let subtotal = lines
        .iter()
        .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.total))
        .ok_or_else(|| DomainError::validation("Montant hors limites"))?;
    let vat_amount = subtotal.percentage(vat_rate)?;
    let total = subtotal
        .checked_add(vat_amount)
        .ok_or_else(|| DomainError::validation("Montant hors limites"))?;
    Ok(DocumentTotals {
        subtotal,
        vat_rate,
        vat_amount,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: &str) -> Decimal {
        v.parse().unwrap()
    }

    fn line(description: &str, quantity: &str, cents: i64, discount: &str) -> LineDraft {
        LineDraft {
            description: description.to_string(),
            quantity: dec(quantity),
            unit_price: Money::from_cents(cents),
            discount: dec(discount),
            vat_rate: None,
        }
    }

    #[test]
    fn consulting_days_at_twenty_percent() {
        let lines = price_lines(vec![line("Consulting", "5", 45_000, "0")]).unwrap();
        let totals = document_totals(&lines, dec("20")).unwrap();

        assert_eq!(lines[0].total.cents(), 225_000);
        assert_eq!(totals.subtotal.cents(), 225_000);
        assert_eq!(totals.vat_amount.cents(), 45_000);
        assert_eq!(totals.total.cents(), 270_000);
    }

    #[test]
    fn discount_is_applied_per_line() {
        let lines = price_lines(vec![
            line("Audit", "2", 50_000, "10"),
            line("Formation", "1", 30_000, "0"),
        ])
        .unwrap();
        let totals = document_totals(&lines, dec("20")).unwrap();

        assert_eq!(lines[0].total.cents(), 90_000);
        assert_eq!(lines[1].sort_order, 1);
        assert_eq!(totals.subtotal.cents(), 120_000);
        assert_eq!(totals.total.cents(), 144_000);
    }

    #[test]
    fn vat_rounds_half_up_on_subtotal() {
        // 0.05 at 10% = 0.005 -> 0.01
        let lines = price_lines(vec![line("Timbre", "1", 5, "0")]).unwrap();
        let totals = document_totals(&lines, dec("10")).unwrap();
        assert_eq!(totals.vat_amount.cents(), 1);
        assert_eq!(totals.total.cents(), 6);
    }

    #[test]
    fn zero_rate_keeps_total_equal_to_subtotal() {
        let lines = price_lines(vec![line("Auto-entrepreneur", "3", 10_000, "0")]).unwrap();
        let totals = document_totals(&lines, Decimal::ZERO).unwrap();
        assert_eq!(totals.total, totals.subtotal);
        assert!(totals.vat_amount.is_zero());
    }

    #[test]
    fn rejects_empty_and_invalid_lines() {
        assert!(price_lines(vec![]).is_err());
        assert!(price_lines(vec![line(" ", "1", 100, "0")]).is_err());
        assert!(price_lines(vec![line("x", "0", 100, "0")]).is_err());
        assert!(price_lines(vec![line("x", "1", -100, "0")]).is_err());
        assert!(price_lines(vec![line("x", "1", 0, "0")]).is_err());
        assert!(price_lines(vec![line("x", "1", 100, "101")]).is_err());
        assert!(document_totals(&[], dec("120")).is_err());
    }

    #[test]
    fn quantity_must_fit_the_stored_precision() {
        assert!(price_lines(vec![line("x", "0.0004", 10_000_000, "0")]).is_err());
        assert!(price_lines(vec![line("x", "1.0005", 100_000, "0")]).is_err());
        assert!(price_lines(vec![line("x", "1000000000", 1, "0")]).is_err());
        assert!(price_lines(vec![line("x", "999999999.999", 1, "0")]).is_ok());
        assert!(price_lines(vec![line("x", "1.2500", 100, "0")]).is_ok());
    }

    #[test]
    fn discount_and_vat_accept_two_decimals() {
        assert!(price_lines(vec![line("x", "1", 100, "12.5")]).is_ok());
        assert!(price_lines(vec![line("x", "1", 100, "12.555")]).is_err());

        let lines = price_lines(vec![line("x", "1", 100_000, "0")]).unwrap();
        assert!(document_totals(&lines, dec("5.5")).is_ok());
        assert!(document_totals(&lines, dec("5.555")).is_err());

        let mut with_line_rate = line("x", "1", 100, "0");
        with_line_rate.vat_rate = Some(dec("5.555"));
        assert!(price_lines(vec![with_line_rate]).is_err());
    }

    #[test]
    fn negation_mirrors_amounts() {
        let lines = price_lines(vec![line("Consulting", "5", 45_000, "0")]).unwrap();
        let totals = document_totals(&lines, dec("20")).unwrap().negated();
        let negated = lines[0].negated();

        assert_eq!(totals.total.cents(), -270_000);
        assert_eq!(totals.vat_rate, dec("20"));
        assert_eq!(negated.unit_price.cents(), -45_000);
        assert_eq!(negated.total.cents(), -225_000);
        assert_eq!(negated.quantity, dec("5"));
    }
}
