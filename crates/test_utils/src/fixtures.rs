//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the back office.
//! These fixtures are designed to be consistent and predictable for unit tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{
    BankAccountId, BusinessCalendar, Cnpj, Cpf, Currency, CustomerId, Money, OrderId, Rate,
    TaxDocument, TenantId, Timezone,
};
use domain_orders::{BusinessRules, Product, Unit};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A round BRL amount
    pub fn brl_100() -> Money {
        Money::brl(dec!(100.00))
    }

    /// Typical wholesale order total, above the wholesale minimum
    pub fn brl_wholesale_order() -> Money {
        Money::brl(dec!(1250.00))
    }

    /// Customer credit limit for store-credit and boleto sales
    pub fn brl_credit_limit() -> Money {
        Money::brl(dec!(5000.00))
    }

    /// Monthly base salary for a store clerk
    pub fn brl_salary() -> Money {
        Money::brl(dec!(2500.00))
    }

    /// Opening balance of the collecting bank account
    pub fn brl_opening_balance() -> Money {
        Money::brl(dec!(10000.00))
    }

    pub fn brl_zero() -> Money {
        Money::zero(Currency::BRL)
    }

    /// A USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }

    /// Default boleto fine, 2%
    pub fn fine_rate() -> Rate {
        Rate::from_percentage(dec!(2))
    }
}

/// Fixture for Brazilian tax documents with valid check digits
pub struct DocumentFixtures;

impl DocumentFixtures {
    pub fn cpf_str() -> &'static str {
        "529.982.247-25"
    }

    pub fn cnpj_str() -> &'static str {
        "11.222.333/0001-81"
    }

    pub fn cpf() -> Cpf {
        Cpf::parse(Self::cpf_str()).expect("fixture CPF is valid")
    }

    pub fn cnpj() -> Cnpj {
        Cnpj::parse(Self::cnpj_str()).expect("fixture CNPJ is valid")
    }

    /// Document of a company buyer
    pub fn company_document() -> TaxDocument {
        TaxDocument::Cnpj(Self::cnpj())
    }

    /// Document of a person buyer
    pub fn person_document() -> TaxDocument {
        TaxDocument::Cpf(Self::cpf())
    }

    /// A CPF whose last digit is wrong
    pub fn invalid_cpf_str() -> &'static str {
        "529.982.247-26"
    }

    /// São Paulo mobile number
    pub fn phone() -> &'static str {
        "11987654321"
    }
}

/// Fixture for temporal test data
///
/// Times are UTC; São Paulo is UTC-3 all year.
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Tuesday 2026-03-10, 09:00 in São Paulo, before the order cutoff
    pub fn weekday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    /// Tuesday 2026-03-10, 16:00 in São Paulo, after the order cutoff
    pub fn weekday_afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 19, 0, 0).unwrap()
    }

    /// Tuesday 2026-03-10, 20:30 in São Paulo, after store hours
    pub fn late_evening() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 23, 30, 0).unwrap()
    }

    /// Wednesday 2026-03-11 at 02:00 UTC, still Tuesday in São Paulo
    pub fn utc_past_midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 11, 2, 0, 0).unwrap()
    }

    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    pub fn hire_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    /// First day of the payroll month used across tests
    pub fn payroll_month() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    /// Store calendar in São Paulo, closed on Sundays
    pub fn calendar() -> BusinessCalendar {
        BusinessCalendar::new(Timezone::default())
    }

    /// Store rules with default cutoff and edit window
    pub fn rules() -> BusinessRules {
        BusinessRules::new(Self::calendar())
    }
}

/// Fixture for catalog products
pub struct CatalogFixtures;

impl CatalogFixtures {
    /// Rice 5kg pack, wholesale price from 10 units
    pub fn rice(tenant_id: TenantId) -> Product {
        Product::new(
            tenant_id,
            "ARROZ-5KG",
            "Arroz tipo 1 5kg",
            Unit::Pack,
            Money::brl(dec!(27.90)),
            Money::brl(dec!(24.50)),
            dec!(10),
        )
        .with_ncm("10063021")
    }

    /// Beans 1kg, wholesale price from 12 units
    pub fn beans(tenant_id: TenantId) -> Product {
        Product::new(
            tenant_id,
            "FEIJAO-1KG",
            "Feijão carioca 1kg",
            Unit::Pack,
            Money::brl(dec!(8.49)),
            Money::brl(dec!(7.20)),
            dec!(12),
        )
        .with_ncm("07133399")
    }

    /// Soybean oil 900ml box of 20
    pub fn oil_box(tenant_id: TenantId) -> Product {
        Product::new(
            tenant_id,
            "OLEO-CX20",
            "Óleo de soja 900ml caixa com 20",
            Unit::Box,
            Money::brl(dec!(159.00)),
            Money::brl(dec!(142.00)),
            dec!(2),
        )
        .with_ncm("15079011")
    }

    /// Loose tomatoes sold by weight
    pub fn tomato_kg(tenant_id: TenantId) -> Product {
        Product::new(
            tenant_id,
            "TOMATE-KG",
            "Tomate italiano",
            Unit::Kg,
            Money::brl(dec!(7.99)),
            Money::brl(dec!(6.49)),
            dec!(20),
        )
        .with_ncm("07020000")
    }
}

/// Fixture for IDs
pub struct IdFixtures;

impl IdFixtures {
    /// Returns a deterministic tenant ID for testing
    pub fn tenant_id() -> TenantId {
        TenantId::from_uuid(Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap())
    }

    /// Returns a deterministic customer ID for testing
    pub fn customer_id() -> CustomerId {
        CustomerId::from_uuid(Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap())
    }

    /// Returns a deterministic order ID for testing
    pub fn order_id() -> OrderId {
        OrderId::from_uuid(Uuid::parse_str("00000000-0000-0000-0000-000000000003").unwrap())
    }

    /// Returns a deterministic bank account ID for testing
    pub fn bank_account_id() -> BankAccountId {
        BankAccountId::from_uuid(Uuid::parse_str("00000000-0000-0000-0000-000000000004").unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_fixtures() {
        assert!(MoneyFixtures::brl_100().is_positive());
        assert!(MoneyFixtures::brl_zero().is_zero());
        assert_eq!(MoneyFixtures::usd_100().currency(), Currency::USD);
    }

    #[test]
    fn test_document_fixtures_are_valid() {
        assert_eq!(DocumentFixtures::cpf().digits(), "52998224725");
        assert_eq!(DocumentFixtures::cnpj().digits(), "11222333000181");
        assert!(Cpf::parse(DocumentFixtures::invalid_cpf_str()).is_err());
        assert!(DocumentFixtures::company_document().is_company());
    }

    #[test]
    fn test_temporal_fixtures_local_dates() {
        let calendar = TemporalFixtures::calendar();
        assert_eq!(calendar.local_date(TemporalFixtures::weekday_morning()), TemporalFixtures::today());
        assert_eq!(calendar.local_date(TemporalFixtures::utc_past_midnight()), TemporalFixtures::today());
    }

    #[test]
    fn test_catalog_fixtures_have_cheaper_wholesale() {
        let tenant = IdFixtures::tenant_id();
        for product in [
            CatalogFixtures::rice(tenant),
            CatalogFixtures::beans(tenant),
            CatalogFixtures::oil_box(tenant),
            CatalogFixtures::tomato_kg(tenant),
        ] {
            assert!(product.wholesale_price.amount() < product.retail_price.amount());
            assert!(product.ncm.is_some());
        }
    }
}
