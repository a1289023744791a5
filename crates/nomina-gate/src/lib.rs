//! # Nomina Gate
//!
//! The stamping gate: a period-scoped, one-way authorization switch that
//! must be explicitly thrown before any receipt may be sent to the external
//! stamping authority.
//!
//! ## Key Operations
//!
//! - [`StampingGate::authorize`] - throw the switch (checked, audited, atomic)
//! - [`StampingGate::revoke`] - retract it, only while nothing is stamped yet
//! - [`StampingGate::can_user_authorize`] - structured capability check

pub mod error;
pub mod gate;

pub use error::{GateError, Result};
pub use gate::StampingGate;
