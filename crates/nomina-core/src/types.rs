//! Strong identifier types for the nomina ledger.
//!
//! All identifiers are UUID newtypes to prevent misuse at compile time:
//! a `ReceiptId` can never be passed where a `PeriodId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Get the inner UUID.
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// The nil identifier (used as a sentinel in tests).
            pub const NIL: Self = Self(Uuid::nil());
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

uuid_id! {
    /// Identifier of one payroll receipt row (one version in a lineage).
    ReceiptId
}

uuid_id! {
    /// Identifier of a pay period.
    PeriodId
}

uuid_id! {
    /// Identifier of an employee.
    EmployeeId
}

uuid_id! {
    /// Identifier of a stored fiscal document (metadata row, not content).
    DocumentId
}

uuid_id! {
    /// Identifier of a version snapshot.
    SnapshotId
}

uuid_id! {
    /// Identifier of a stamping authorization record.
    AuthorizationId
}

uuid_id! {
    /// Identifier of a user (actor) in audit and authorization records.
    UserId
}

uuid_id! {
    /// Identifier of a company (employer).
    CompanyId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_types() {
        let receipt = ReceiptId::new();
        let period = PeriodId::new();
        // Same inner representation, different types; equality is per-type.
        assert_ne!(receipt.as_uuid(), period.as_uuid());
    }

    #[test]
    fn test_display_roundtrip() {
        let id = ReceiptId::new();
        let text = id.to_string();
        let parsed = ReceiptId::from_uuid(text.parse().unwrap());
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_nil_sentinel() {
        assert_eq!(UserId::NIL.as_uuid(), Uuid::nil());
    }
}
