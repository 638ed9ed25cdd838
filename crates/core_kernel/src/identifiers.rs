//! Strongly-typed identifiers for domain entities
//!
//! Newtype wrappers around UUIDs keep a boleto id from ever being passed
//! where a receivable id is expected. Displayed ids carry a short prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Tenancy and access
define_id!(TenantId, "TEN");
define_id!(UserId, "USR");

// Sales domain identifiers
define_id!(CustomerId, "CUS");
define_id!(ProductId, "PRD");
define_id!(OrderId, "ORD");
define_id!(OrderItemId, "ORDI");

// Finance domain identifiers
define_id!(BankAccountId, "BNK");
define_id!(FinancialEntryId, "FIN");
define_id!(ReceivableId, "REC");
define_id!(BoletoId, "BOL");
define_id!(ClosingId, "CLS");

// People and loyalty
define_id!(EmployeeId, "EMP");
define_id!(PayrollId, "PAYR");
define_id!(LoyaltyAccountId, "LOY");
define_id!(ReferralId, "REF");

// Investments, fiscal and messaging
define_id!(SimulationId, "SIM");
define_id!(FiscalInvoiceId, "NFE");
define_id!(MessageId, "MSG");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boleto_id_display() {
        let id = BoletoId::new();
        assert!(id.to_string().starts_with("BOL-"));
    }

    #[test]
    fn test_id_parsing_with_and_without_prefix() {
        let original = OrderId::new_v7();
        let parsed: OrderId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);

        let bare: OrderId = original.as_uuid().to_string().parse().unwrap();
        assert_eq!(original, bare);
    }

    #[test]
    fn test_prefix_of_other_type_is_rejected() {
        let receivable = ReceivableId::new();
        let parsed = receivable.to_string().parse::<BoletoId>();
        assert!(parsed.is_err());
    }
}
