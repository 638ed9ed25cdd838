//! Catalogue products and price tiers

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, ProductId, TenantId};
use crate::customer::CustomerType;

/// Unit of sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Unit,
    Kg,
    Box,
    Pack,
    Liter,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Unit => "unit",
            Unit::Kg => "kg",
            Unit::Box => "box",
            Unit::Pack => "pack",
            Unit::Liter => "liter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unit" => Some(Unit::Unit),
            "kg" => Some(Unit::Kg),
            "box" => Some(Unit::Box),
            "pack" => Some(Unit::Pack),
            "liter" => Some(Unit::Liter),
            _ => None,
        }
    }

    /// Whether fractional quantities make sense (weighed goods)
    pub fn is_fractional(&self) -> bool {
        matches!(self, Unit::Kg | Unit::Liter)
    }
}

/// Which price list an item was charged from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Retail,
    Wholesale,
}

impl PriceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Retail => "retail",
            PriceTier::Wholesale => "wholesale",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "retail" => Some(PriceTier::Retail),
            "wholesale" => Some(PriceTier::Wholesale),
            _ => None,
        }
    }
}

/// A product in the tenant's catalogue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub sku: String,
    pub name: String,
    pub unit: Unit,
    pub retail_price: Money,
    pub wholesale_price: Money,
    /// Quantity from which retail customers also get the wholesale price
    pub wholesale_min_qty: Decimal,
    /// Mercosur nomenclature code, needed on fiscal invoices
    pub ncm: Option<String>,
    pub active: bool,
}

impl Product {
    pub fn new(
        tenant_id: TenantId,
        sku: impl Into<String>,
        name: impl Into<String>,
        unit: Unit,
        retail_price: Money,
        wholesale_price: Money,
        wholesale_min_qty: Decimal,
    ) -> Self {
        Self {
            id: ProductId::new_v7(),
            tenant_id,
            sku: sku.into(),
            name: name.into(),
            unit,
            retail_price,
            wholesale_price,
            wholesale_min_qty,
            ncm: None,
            active: true,
        }
    }

    pub fn with_ncm(mut self, ncm: impl Into<String>) -> Self {
        self.ncm = Some(ncm.into());
        self
    }

    /// Unit price charged for a quantity bought by a customer type
    pub fn price_for(&self, customer_type: CustomerType, quantity: Decimal) -> (PriceTier, Money) {
        let wholesale = customer_type == CustomerType::Wholesale
            || (!self.wholesale_min_qty.is_zero() && quantity >= self.wholesale_min_qty);

        if wholesale {
            (PriceTier::Wholesale, self.wholesale_price)
        } else {
            (PriceTier::Retail, self.retail_price)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rice() -> Product {
        Product::new(
            TenantId::new(),
            "ARROZ-5KG",
            "Arroz tipo 1 5kg",
            Unit::Pack,
            Money::brl(dec!(29.90)),
            Money::brl(dec!(25.50)),
            dec!(10),
        )
    }

    #[test]
    fn test_retail_below_threshold() {
        let (tier, price) = rice().price_for(CustomerType::Retail, dec!(9));
        assert_eq!(tier, PriceTier::Retail);
        assert_eq!(price.amount(), dec!(29.90));
    }

    #[test]
    fn test_retail_reaching_threshold_gets_wholesale() {
        let (tier, price) = rice().price_for(CustomerType::Retail, dec!(10));
        assert_eq!(tier, PriceTier::Wholesale);
        assert_eq!(price.amount(), dec!(25.50));
    }

    #[test]
    fn test_wholesale_customer_always_wholesale() {
        let (tier, _) = rice().price_for(CustomerType::Wholesale, dec!(1));
        assert_eq!(tier, PriceTier::Wholesale);
    }
}
