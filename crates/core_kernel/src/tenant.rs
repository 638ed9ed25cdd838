//! Tenant context
//!
//! Every store (tenant) shares the same database. All reads and writes are
//! scoped by the tenant carried in the authenticated request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::identifiers::{TenantId, UserId};

/// Access roles inside a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Store owner, may do everything including reopening closed periods
    Admin,
    /// Treasury: receivables, boletos, bank accounts, closings
    Finance,
    /// Counter and route sales: customers and orders
    Sales,
    /// People management: employees and payroll
    Hr,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Finance => "finance",
            Role::Sales => "sales",
            Role::Hr => "hr",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "finance" => Ok(Role::Finance),
            "sales" => Ok(Role::Sales),
            "hr" => Ok(Role::Hr),
            other => Err(CoreError::validation(format!("Unknown role: {other}"))),
        }
    }
}

/// The authenticated caller: which store, which user, which roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, user_id: UserId, roles: Vec<Role>) -> Self {
        Self { tenant_id, user_id, roles }
    }

    /// Admins implicitly hold every role
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| *r == role || *r == Role::Admin)
    }

    /// Fails with a `Forbidden` error naming the missing role
    pub fn require(&self, role: Role) -> Result<(), CoreError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!("role '{role}' required")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_holds_every_role() {
        let ctx = TenantContext::new(TenantId::new(), UserId::new(), vec![Role::Admin]);
        assert!(ctx.has_role(Role::Finance));
        assert!(ctx.require(Role::Hr).is_ok());
    }

    #[test]
    fn test_missing_role() {
        let ctx = TenantContext::new(TenantId::new(), UserId::new(), vec![Role::Sales]);
        assert!(ctx.require(Role::Finance).is_err());
        assert_eq!("finance".parse::<Role>().unwrap(), Role::Finance);
    }
}
