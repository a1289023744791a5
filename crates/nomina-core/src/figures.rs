//! Payroll figures: the calculation-engine input consumed by the ledger.
//!
//! The ledger never re-derives these amounts. They arrive from an external
//! calculation engine, are validated structurally, and are then frozen into
//! receipt rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::ValidationError;

/// Which side of the payslip a concept belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineKind {
    /// Money paid to the employee (salary, bonus, overtime).
    Perception,
    /// Money withheld (ISR, IMSS, loans).
    Deduction,
}

impl LineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LineKind::Perception => "perception",
            LineKind::Deduction => "deduction",
        }
    }

    pub fn parse(s: &str) -> Result<Self, crate::error::CoreError> {
        match s {
            "perception" => Ok(LineKind::Perception),
            "deduction" => Ok(LineKind::Deduction),
            other => Err(crate::error::CoreError::UnknownLineKind(other.to_string())),
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One perception or deduction line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayConcept {
    /// Concept code (e.g. "P001" salary, "D001" ISR). Diff key across versions.
    pub code: String,
    /// Human-readable concept name.
    pub name: String,
    /// Amount, always non-negative; the side determines the sign.
    pub amount: Decimal,
}

impl PayConcept {
    pub fn new(code: impl Into<String>, name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            amount,
        }
    }
}

/// The full figure set for one receipt version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayFigures {
    /// Days worked in the period.
    pub worked_days: Decimal,
    /// Ordered perception lines.
    pub perceptions: Vec<PayConcept>,
    /// Ordered deduction lines.
    pub deductions: Vec<PayConcept>,
}

impl PayFigures {
    pub fn new(
        worked_days: Decimal,
        perceptions: Vec<PayConcept>,
        deductions: Vec<PayConcept>,
    ) -> Self {
        Self {
            worked_days,
            perceptions,
            deductions,
        }
    }

    /// Sum of all perception amounts.
    pub fn total_perceptions(&self) -> Decimal {
        self.perceptions.iter().map(|c| c.amount).sum()
    }

    /// Sum of all deduction amounts.
    pub fn total_deductions(&self) -> Decimal {
        self.deductions.iter().map(|c| c.amount).sum()
    }

    /// Net pay: perceptions minus deductions.
    pub fn net_pay(&self) -> Decimal {
        self.total_perceptions() - self.total_deductions()
    }

    /// Structural validation, applied before any mutation.
    ///
    /// Arithmetic correctness is the calculation engine's responsibility;
    /// this only rejects malformed input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let max_days = Decimal::from(31);
        if self.worked_days < Decimal::ZERO || self.worked_days > max_days {
            return Err(ValidationError::WorkedDaysOutOfRange(self.worked_days));
        }

        if self.perceptions.is_empty() {
            return Err(ValidationError::EmptyPerceptions);
        }

        for side in [&self.perceptions, &self.deductions] {
            let mut seen = HashSet::new();
            for (index, concept) in side.iter().enumerate() {
                if concept.code.trim().is_empty() {
                    return Err(ValidationError::EmptyConceptCode { index });
                }
                if concept.amount < Decimal::ZERO {
                    return Err(ValidationError::NegativeAmount {
                        code: concept.code.clone(),
                        amount: concept.amount,
                    });
                }
                if !seen.insert(concept.code.as_str()) {
                    return Err(ValidationError::DuplicateConceptCode {
                        code: concept.code.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn salary_figures() -> PayFigures {
        PayFigures::new(
            Decimal::from(15),
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(10_000))],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_200))],
        )
    }

    #[test]
    fn test_totals_and_net_pay() {
        let figures = salary_figures();
        assert_eq!(figures.total_perceptions(), Decimal::from(10_000));
        assert_eq!(figures.total_deductions(), Decimal::from(1_200));
        assert_eq!(figures.net_pay(), Decimal::from(8_800));
    }

    #[test]
    fn test_valid_figures_pass() {
        assert!(salary_figures().validate().is_ok());
    }

    #[test]
    fn test_worked_days_out_of_range() {
        let mut figures = salary_figures();
        figures.worked_days = Decimal::from(32);
        assert!(matches!(
            figures.validate(),
            Err(ValidationError::WorkedDaysOutOfRange(_))
        ));

        figures.worked_days = Decimal::from(-1);
        assert!(matches!(
            figures.validate(),
            Err(ValidationError::WorkedDaysOutOfRange(_))
        ));
    }

    #[test]
    fn test_empty_perceptions_rejected() {
        let figures = PayFigures::new(Decimal::from(15), vec![], vec![]);
        assert!(matches!(
            figures.validate(),
            Err(ValidationError::EmptyPerceptions)
        ));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut figures = salary_figures();
        figures.deductions[0].amount = Decimal::from(-5);
        assert!(matches!(
            figures.validate(),
            Err(ValidationError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let mut figures = salary_figures();
        figures
            .perceptions
            .push(PayConcept::new("P001", "Sueldo bis", Decimal::ONE));
        assert!(matches!(
            figures.validate(),
            Err(ValidationError::DuplicateConceptCode { .. })
        ));
    }

    #[test]
    fn test_empty_code_rejected() {
        let mut figures = salary_figures();
        figures.perceptions[0].code = "  ".into();
        assert!(matches!(
            figures.validate(),
            Err(ValidationError::EmptyConceptCode { index: 0 })
        ));
    }
}
