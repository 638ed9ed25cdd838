//! Regressive income tax on fixed income

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::Rate;

/// Rate applied to gross interest by holding period
///
/// | days held | rate  |
/// |-----------|-------|
/// | ≤ 180     | 22.5% |
/// | ≤ 360     | 20%   |
/// | ≤ 720     | 17.5% |
/// | > 720     | 15%   |
pub fn regressive_tax_rate(days_held: u32) -> Rate {
    let pct: Decimal = match days_held {
        0..=180 => dec!(22.5),
        181..=360 => dec!(20),
        361..=720 => dec!(17.5),
        _ => dec!(15),
    };
    Rate::from_percentage(pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_edges() {
        assert_eq!(regressive_tax_rate(180).as_percentage(), dec!(22.5));
        assert_eq!(regressive_tax_rate(181).as_percentage(), dec!(20));
        assert_eq!(regressive_tax_rate(720).as_percentage(), dec!(17.5));
        assert_eq!(regressive_tax_rate(721).as_percentage(), dec!(15));
    }
}
