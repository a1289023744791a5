//! # Nomina Testkit
//!
//! Testing utilities for the nomina workspace: in-memory fixtures wired to
//! every service, and proptest strategies for valid payroll figures.

pub mod fixtures;
pub mod generators;

pub use fixtures::TestFixture;
pub use generators::{figures_strategy, random_figures, DEDUCTION_CODES, PERCEPTION_CODES};
