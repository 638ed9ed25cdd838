//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{Cpf, Money, TaxDocument, TenantId};
use domain_finance::{BankAccount, BankAccountKind};
use domain_hr::Employee;
use domain_orders::{Customer, CustomerType, Order, OrderError, PaymentMethod, Product};
use fake::faker::name::raw::Name;
use fake::locales::PT_BR;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::{CatalogFixtures, DocumentFixtures, IdFixtures, MoneyFixtures, TemporalFixtures};

/// A random Brazilian full name
pub fn fake_name() -> String {
    Name(PT_BR).fake()
}

/// Builder for customers
pub struct TestCustomerBuilder {
    tenant_id: TenantId,
    name: String,
    customer_type: CustomerType,
    document: Option<TaxDocument>,
    phone: Option<String>,
    credit_limit: Money,
    referral_code: Option<String>,
}

impl Default for TestCustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCustomerBuilder {
    /// A wholesale company buyer with a credit line and a WhatsApp number
    pub fn new() -> Self {
        Self {
            tenant_id: IdFixtures::tenant_id(),
            name: fake_name(),
            customer_type: CustomerType::Wholesale,
            document: Some(DocumentFixtures::company_document()),
            phone: Some(DocumentFixtures::phone().to_string()),
            credit_limit: MoneyFixtures::brl_credit_limit(),
            referral_code: None,
        }
    }

    /// A retail walk-in customer without credit
    pub fn retail() -> Self {
        Self::new()
            .with_customer_type(CustomerType::Retail)
            .with_document(DocumentFixtures::person_document())
            .with_credit_limit(MoneyFixtures::brl_zero())
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_customer_type(mut self, customer_type: CustomerType) -> Self {
        self.customer_type = customer_type;
        self
    }

    pub fn with_document(mut self, document: TaxDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn without_phone(mut self) -> Self {
        self.phone = None;
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

    pub fn build(self) -> Customer {
        let mut customer = Customer::new(self.tenant_id, self.name, self.customer_type)
            .with_credit_limit(self.credit_limit);
        if let Some(document) = self.document {
            customer = customer.with_document(document);
        }
        if let Some(phone) = self.phone {
            customer = customer.with_phone(phone);
        }
        if let Some(code) = self.referral_code {
            customer = customer.with_referral_code(code);
        }
        customer
    }
}

/// Builder for catalog products
pub struct TestProductBuilder {
    product: Product,
}

impl Default for TestProductBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProductBuilder {
    /// Starts from the rice fixture
    pub fn new() -> Self {
        Self {
            product: CatalogFixtures::rice(IdFixtures::tenant_id()),
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.product.tenant_id = tenant_id;
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.product.sku = sku.into();
        self
    }

    pub fn with_prices(mut self, retail: Money, wholesale: Money) -> Self {
        self.product.retail_price = retail;
        self.product.wholesale_price = wholesale;
        self
    }

    pub fn with_wholesale_min_qty(mut self, quantity: Decimal) -> Self {
        self.product.wholesale_min_qty = quantity;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.product.active = false;
        self
    }

    pub fn build(self) -> Product {
        self.product
    }
}

/// Builder for orders
///
/// Lines are added on build, so the builder holds products rather than items.
pub struct TestOrderBuilder {
    tenant_id: TenantId,
    customer: Option<Customer>,
    payment_method: PaymentMethod,
    lines: Vec<(Product, Decimal)>,
    discount: Option<Money>,
    delivery_fee: Option<Money>,
}

impl Default for TestOrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestOrderBuilder {
    /// A Pix order for 20 packs of rice
    pub fn new() -> Self {
        let tenant_id = IdFixtures::tenant_id();
        Self {
            tenant_id,
            customer: None,
            payment_method: PaymentMethod::Pix,
            lines: vec![(CatalogFixtures::rice(tenant_id), dec!(20))],
            discount: None,
            delivery_fee: None,
        }
    }

    /// Moves the order and its default lines to another tenant
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        for (product, _) in &mut self.lines {
            product.tenant_id = tenant_id;
        }
        self
    }

    pub fn for_customer(mut self, customer: Customer) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn with_payment(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    /// Boleto in `installments` parcels, 30 days apart, the first in 30 days
    pub fn with_boleto_installments(self, installments: u32) -> Self {
        self.with_payment(PaymentMethod::Boleto {
            installments,
            first_due_in_days: 30,
            interval_days: 30,
        })
    }

    /// Replaces the default lines
    pub fn with_lines(mut self, lines: Vec<(Product, Decimal)>) -> Self {
        self.lines = lines;
        self
    }

    pub fn add_line(mut self, product: Product, quantity: Decimal) -> Self {
        self.lines.push((product, quantity));
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = Some(discount);
        self
    }

    pub fn with_delivery_fee(mut self, fee: Money) -> Self {
        self.delivery_fee = Some(fee);
        self
    }

    /// Builds a draft order
    pub fn build(self) -> Result<Order, OrderError> {
        let customer = self
            .customer
            .unwrap_or_else(|| TestCustomerBuilder::new().with_tenant(self.tenant_id).build());
        let mut order = Order::new(self.tenant_id, customer.id, customer.customer_type, self.payment_method);
        for (product, quantity) in &self.lines {
            order.add_item(product, *quantity)?;
        }
        if let Some(fee) = self.delivery_fee {
            order.set_delivery_fee(fee)?;
        }
        if let Some(discount) = self.discount {
            order.apply_discount(discount)?;
        }
        Ok(order)
    }

    /// Builds and confirms the order at `now` with the default store rules
    pub fn build_confirmed(self, now: DateTime<Utc>) -> Result<Order, OrderError> {
        let mut order = self.build()?;
        order.confirm(now, &TemporalFixtures::rules())?;
        Ok(order)
    }
}

/// Builder for employees
pub struct TestEmployeeBuilder {
    tenant_id: TenantId,
    name: String,
    cpf: Cpf,
    role: String,
    base_salary: Money,
    hire_date: NaiveDate,
    dependents: u32,
    termination_date: Option<NaiveDate>,
}

impl Default for TestEmployeeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEmployeeBuilder {
    pub fn new() -> Self {
        Self {
            tenant_id: IdFixtures::tenant_id(),
            name: fake_name(),
            cpf: DocumentFixtures::cpf(),
            role: "Repositor".to_string(),
            base_salary: MoneyFixtures::brl_salary(),
            hire_date: TemporalFixtures::hire_date(),
            dependents: 0,
            termination_date: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_cpf(mut self, cpf: Cpf) -> Self {
        self.cpf = cpf;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_salary(mut self, salary: Money) -> Self {
        self.base_salary = salary;
        self
    }

    pub fn hired_on(mut self, date: NaiveDate) -> Self {
        self.hire_date = date;
        self
    }

    pub fn with_dependents(mut self, dependents: u32) -> Self {
        self.dependents = dependents;
        self
    }

    pub fn terminated_on(mut self, date: NaiveDate) -> Self {
        self.termination_date = Some(date);
        self
    }

    pub fn build(self) -> Employee {
        let mut employee = Employee::new(
            self.tenant_id,
            self.name,
            self.cpf,
            self.role,
            self.base_salary,
            self.hire_date,
        )
        .with_dependents(self.dependents);
        if let Some(date) = self.termination_date {
            employee.terminate(date);
        }
        employee
    }
}

/// Builder for bank accounts
pub struct TestBankAccountBuilder {
    tenant_id: TenantId,
    name: String,
    kind: BankAccountKind,
    opening_balance: Money,
    bank: Option<(String, String, String)>,
}

impl Default for TestBankAccountBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBankAccountBuilder {
    /// A checking account at Bradesco, ready to collect boletos
    pub fn new() -> Self {
        Self {
            tenant_id: IdFixtures::tenant_id(),
            name: "Bradesco PJ".to_string(),
            kind: BankAccountKind::Checking,
            opening_balance: MoneyFixtures::brl_opening_balance(),
            bank: Some(("237".to_string(), "1234".to_string(), "0012345".to_string())),
        }
    }

    /// The store's cash drawer, which cannot collect boletos
    pub fn cash_drawer() -> Self {
        Self {
            name: "Caixa loja".to_string(),
            kind: BankAccountKind::Cash,
            opening_balance: MoneyFixtures::brl_zero(),
            bank: None,
            ..Self::new()
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_kind(mut self, kind: BankAccountKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_opening_balance(mut self, balance: Money) -> Self {
        self.opening_balance = balance;
        self
    }

    pub fn build(self) -> BankAccount {
        let account = BankAccount::new(self.tenant_id, self.name, self.kind, self.opening_balance);
        match self.bank {
            Some((bank_code, agency, number)) => account.with_bank(bank_code, agency, number),
            None => account,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_builder_defaults() {
        let customer = TestCustomerBuilder::new().build();
        assert_eq!(customer.customer_type, CustomerType::Wholesale);
        assert!(!customer.name.is_empty());
        assert!(customer.credit_limit.is_positive());
        assert!(customer.phone.is_some());

        let retail = TestCustomerBuilder::retail().build();
        assert_eq!(retail.customer_type, CustomerType::Retail);
        assert!(retail.credit_limit.is_zero());
    }

    #[test]
    fn test_order_builder_prices_wholesale() {
        let order = TestOrderBuilder::new().build().expect("order");
        // 20 x 24.50
        assert_eq!(order.total, Money::brl(dec!(490.00)));
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn test_order_builder_confirms_before_cutoff() {
        let order = TestOrderBuilder::new()
            .build_confirmed(TemporalFixtures::weekday_morning())
            .expect("confirmed order");
        assert_eq!(order.delivery_date, NaiveDate::from_ymd_opt(2026, 3, 11));
    }

    #[test]
    fn test_employee_builder_terminated() {
        let employee = TestEmployeeBuilder::new()
            .terminated_on(NaiveDate::from_ymd_opt(2026, 2, 14).unwrap())
            .build();
        assert!(!employee.active);
        assert!(employee.termination_date.is_some());
    }

    #[test]
    fn test_bank_account_builder() {
        let account = TestBankAccountBuilder::new().build();
        assert_eq!(account.bank_code, "237");
        let drawer = TestBankAccountBuilder::cash_drawer().build();
        assert!(drawer.bank_code.is_empty());
        assert_eq!(drawer.kind, BankAccountKind::Cash);
    }
}
