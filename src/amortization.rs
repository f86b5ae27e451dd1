//! Flat add-on interest financing calculator.
//!
//! Interest is charged on the financed amount for the whole term and spread
//! evenly across installments:
//!
//! ```text
//! installment = financed × (1 + rate × term) / term
//! total       = installment × term
//! ```
//!
//! All arithmetic stays in [`BigDecimal`] at full precision. Rounding to
//! cents (half-up) happens only in [`FinancingResult::quote`].

use crate::errors::InvalidInputError;
use crate::models::{FinancingInputs, FinancingQuote, FinancingResult};
use bigdecimal::{BigDecimal, RoundingMode, Zero};
use serde_json::Number;

/// Terms offered by the simulation page.
pub const STANDARD_TERMS: [u32; 6] = [12, 24, 36, 48, 60, 72];

const CURRENCY_SCALE: i64 = 2;

/// Computes financed amount, installment and total for one term.
///
/// Returns an [`InvalidInputError`] naming the first offending field when
/// any input is out of range. Inputs are never clamped.
pub fn compute_installment(
    principal: &BigDecimal,
    down_payment: &BigDecimal,
    term_months: u32,
    monthly_rate_percent: &BigDecimal,
) -> Result<FinancingResult, InvalidInputError> {
    validate_amounts(principal, down_payment, monthly_rate_percent)?;
    validate_term(term_months)?;

    Ok(compute_unchecked(
        principal,
        down_payment,
        term_months,
        monthly_rate_percent,
    ))
}

/// Same as [`compute_installment`], taking the request shape. Returns the
/// validated term along with the result.
pub fn compute_for(
    inputs: &FinancingInputs,
) -> Result<(u32, FinancingResult), InvalidInputError> {
    validate_amounts(
        &inputs.principal,
        &inputs.down_payment,
        &inputs.monthly_rate_percent,
    )?;
    let term_months = parse_term(&inputs.term_months)?;

    Ok((
        term_months,
        compute_unchecked(
            &inputs.principal,
            &inputs.down_payment,
            term_months,
            &inputs.monthly_rate_percent,
        ),
    ))
}

/// Narrows a term sent over the wire to a whole number of months.
pub fn parse_term(raw: &Number) -> Result<u32, InvalidInputError> {
    let term_months = raw
        .as_u64()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            InvalidInputError::new(
                "termMonths",
                format!("must be a whole number of months, got {}", raw),
            )
        })?;
    validate_term(term_months)?;
    Ok(term_months)
}

/// Computes one result per term, all from the same unrounded inputs.
pub fn installment_options(
    principal: &BigDecimal,
    down_payment: &BigDecimal,
    monthly_rate_percent: &BigDecimal,
    terms: &[u32],
) -> Result<Vec<(u32, FinancingResult)>, InvalidInputError> {
    validate_amounts(principal, down_payment, monthly_rate_percent)?;
    if terms.is_empty() {
        return Err(InvalidInputError::new(
            "termMonths",
            "at least one term is required",
        ));
    }
    for &term in terms {
        validate_term(term)?;
    }

    Ok(terms
        .iter()
        .map(|&term| {
            (
                term,
                compute_unchecked(principal, down_payment, term, monthly_rate_percent),
            )
        })
        .collect())
}

fn compute_unchecked(
    principal: &BigDecimal,
    down_payment: &BigDecimal,
    term_months: u32,
    monthly_rate_percent: &BigDecimal,
) -> FinancingResult {
    let term = BigDecimal::from(term_months);
    let financed_amount = principal - down_payment;
    let rate_decimal = monthly_rate_percent / &BigDecimal::from(100);
    let factor = BigDecimal::from(1) + &rate_decimal * &term;
    let installment_amount = &financed_amount * &factor / &term;
    let total_amount = &installment_amount * &term;

    FinancingResult {
        financed_amount,
        installment_amount,
        total_amount,
    }
}

fn validate_amounts(
    principal: &BigDecimal,
    down_payment: &BigDecimal,
    monthly_rate_percent: &BigDecimal,
) -> Result<(), InvalidInputError> {
    if principal < &BigDecimal::zero() {
        return Err(InvalidInputError::new("principal", "must not be negative"));
    }
    if down_payment < &BigDecimal::zero() {
        return Err(InvalidInputError::new("downPayment", "must not be negative"));
    }
    if down_payment > principal {
        return Err(InvalidInputError::new(
            "downPayment",
            "must not exceed the principal",
        ));
    }
    if monthly_rate_percent < &BigDecimal::zero() {
        return Err(InvalidInputError::new(
            "monthlyRatePercent",
            "must not be negative",
        ));
    }
    Ok(())
}

fn validate_term(term_months: u32) -> Result<(), InvalidInputError> {
    if term_months < 1 {
        return Err(InvalidInputError::new(
            "termMonths",
            "must be at least one month",
        ));
    }
    Ok(())
}

/// Rounds a currency value to cents, half-up.
pub fn round_currency(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(CURRENCY_SCALE, RoundingMode::HalfUp)
}

impl FinancingResult {
    /// Interest charged over the whole term.
    pub fn interest_amount(&self) -> BigDecimal {
        &self.total_amount - &self.financed_amount
    }

    /// Presentation view: every figure rounded to cents.
    pub fn quote(&self, term_months: u32) -> FinancingQuote {
        FinancingQuote {
            term_months,
            financed_amount: round_currency(&self.financed_amount),
            installment_amount: round_currency(&self.installment_amount),
            total_amount: round_currency(&self.total_amount),
            interest_amount: round_currency(&self.interest_amount()),
        }
    }
}
