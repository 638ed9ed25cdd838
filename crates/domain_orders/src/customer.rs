//! Customers of the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, CustomerId, Money, TaxDocument, TenantId};
use crate::error::OrderError;

/// How a customer buys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    /// Restaurants, bakeries, resellers: always wholesale prices
    Wholesale,
    /// Walk-in and delivery consumers
    Retail,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Wholesale => "wholesale",
            CustomerType::Retail => "retail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "wholesale" => Some(CustomerType::Wholesale),
            "retail" => Some(CustomerType::Retail),
            _ => None,
        }
    }
}

/// A customer registered with a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub tenant_id: TenantId,
    pub name: String,
    pub customer_type: CustomerType,
    /// CPF or CNPJ; required for boletos and NF-e
    pub document: Option<TaxDocument>,
    /// WhatsApp number as typed by the operator
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Maximum open balance for boleto/store-credit sales
    pub credit_limit: Money,
    /// Code this customer shares with friends
    pub referral_code: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, customer_type: CustomerType) -> Self {
        Self {
            id: CustomerId::new_v7(),
            tenant_id,
            name: name.into(),
            customer_type,
            document: None,
            phone: None,
            email: None,
            credit_limit: Money::zero(Currency::BRL),
            referral_code: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_document(mut self, document: TaxDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_credit_limit(mut self, limit: Money) -> Self {
        self.credit_limit = limit;
        self
    }

    pub fn with_referral_code(mut self, code: impl Into<String>) -> Self {
        self.referral_code = Some(code.into());
        self
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Checks whether a new credit sale fits under the customer's limit
    ///
    /// `open_balance` is the sum of the customer's unpaid receivables.
    pub fn check_credit(&self, open_balance: Money, requested: Money) -> Result<(), OrderError> {
        if !self.active {
            return Err(OrderError::InactiveCustomer);
        }
        let available = self.credit_limit.checked_sub(&open_balance)?;
        if requested > available {
            return Err(OrderError::CreditLimitExceeded { available, requested });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_check() {
        let customer = Customer::new(TenantId::new(), "Padaria Pão Quente", CustomerType::Wholesale)
            .with_credit_limit(Money::brl(dec!(5000)));

        assert!(customer.check_credit(Money::brl(dec!(4000)), Money::brl(dec!(1000))).is_ok());
        assert!(matches!(
            customer.check_credit(Money::brl(dec!(4000)), Money::brl(dec!(1000.01))),
            Err(OrderError::CreditLimitExceeded { .. })
        ));
    }
}
