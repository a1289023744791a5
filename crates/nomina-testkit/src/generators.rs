//! Proptest strategies and random data generators for payroll figures.

use proptest::prelude::*;
use rand::Rng;
use rust_decimal::Decimal;

use nomina_core::{PayConcept, PayFigures};

/// Common perception concept codes seen in Mexican payroll.
pub const PERCEPTION_CODES: &[(&str, &str)] = &[
    ("P001", "Sueldo"),
    ("P002", "Bono de puntualidad"),
    ("P003", "Horas extra"),
    ("P004", "Prima vacacional"),
    ("P005", "Aguinaldo"),
];

/// Common deduction concept codes.
pub const DEDUCTION_CODES: &[(&str, &str)] = &[
    ("D001", "ISR"),
    ("D002", "IMSS"),
    ("D003", "Prestamo personal"),
    ("D004", "Fondo de ahorro"),
];

/// A strategy producing a valid concept from the given code table.
fn concept_strategy(codes: &'static [(&'static str, &'static str)]) -> impl Strategy<Value = PayConcept> {
    (0..codes.len(), 0u64..1_000_000).prop_map(move |(idx, cents)| {
        let (code, name) = codes[idx];
        PayConcept::new(code, name, Decimal::new(cents as i64, 2))
    })
}

/// A strategy producing structurally valid figures: 0..=31 worked days, at
/// least one perception, unique codes per side, non-negative amounts.
pub fn figures_strategy() -> impl Strategy<Value = PayFigures> {
    (
        0u32..=31,
        proptest::collection::vec(concept_strategy(PERCEPTION_CODES), 1..=PERCEPTION_CODES.len()),
        proptest::collection::vec(concept_strategy(DEDUCTION_CODES), 0..=DEDUCTION_CODES.len()),
    )
        .prop_map(|(days, perceptions, deductions)| {
            PayFigures::new(
                Decimal::from(days),
                dedup_by_code(perceptions),
                dedup_by_code(deductions),
            )
        })
}

fn dedup_by_code(mut concepts: Vec<PayConcept>) -> Vec<PayConcept> {
    let mut seen = std::collections::HashSet::new();
    concepts.retain(|c| seen.insert(c.code.clone()));
    concepts
}

/// Random valid figures from a plain RNG, for non-proptest tests.
pub fn random_figures(rng: &mut impl Rng) -> PayFigures {
    let salary = Decimal::new(rng.gen_range(500_000..5_000_000), 2);
    let isr = Decimal::new(rng.gen_range(50_000..500_000), 2);
    PayFigures::new(
        Decimal::from(rng.gen_range(1u32..=15)),
        vec![PayConcept::new("P001", "Sueldo", salary)],
        vec![PayConcept::new("D001", "ISR", isr)],
    )
}
