//! FEBRABAN boleto barcode and digitable line
//!
//! Barcode layout (44 digits):
//!
//! ```text
//! 0..3   bank code
//! 3      currency (9 = real)
//! 4      general check digit (mod 11)
//! 5..9   due factor
//! 9..19  amount in cents
//! 19..44 free field (agency, carteira, nosso número, account)
//! ```
//!
//! The digitable line (47 digits) regroups the same digits into three fields
//! with their own mod-10 check digits, followed by the general check digit,
//! the due factor and the amount.

use chrono::NaiveDate;

use core_kernel::Money;
use crate::error::FinanceError;

/// Base date of the due factor
fn factor_base() -> NaiveDate {
    NaiveDate::from_ymd_opt(1997, 10, 7).unwrap_or(NaiveDate::MIN)
}

/// Four-digit due factor
///
/// Counts days since 1997-10-07. After 9999 (2025-02-21) the factor wraps
/// back to 1000, so 2025-02-22 is 1000 again.
pub fn due_factor(due_date: NaiveDate) -> Result<u32, FinanceError> {
    let days = (due_date - factor_base()).num_days();
    if days < 1000 {
        return Err(FinanceError::InvalidBoletoData(format!(
            "due date {due_date} is before the factor range"
        )));
    }
    Ok((((days - 1000) % 9000) + 1000) as u32)
}

/// Mod-11 general check digit, weights 2 to 9 from the right
pub fn mod11(digits: &str) -> u32 {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| d * (2 + (i as u32 % 8)))
        .sum();
    match 11 - (sum % 11) {
        0 | 10 | 11 => 1,
        dv => dv,
    }
}

/// Mod-10 field check digit, weights 2 and 1 from the right
pub fn mod10(digits: &str) -> u32 {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            let product = if i % 2 == 0 { d * 2 } else { d };
            product / 10 + product % 10
        })
        .sum();
    (10 - sum % 10) % 10
}

fn only_digits(value: &str, field: &str, width: usize) -> Result<String, FinanceError> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > width {
        return Err(FinanceError::InvalidBoletoData(format!(
            "{field} must have 1 to {width} digits, got {value:?}"
        )));
    }
    Ok(format!("{digits:0>width$}"))
}

/// Builds the 25-digit free field: agency(4) carteira(2) nosso número(11) account(7) 0
pub fn free_field(agency: &str, carteira: &str, our_number: &str, account: &str) -> Result<String, FinanceError> {
    Ok(format!(
        "{}{}{}{}0",
        only_digits(agency, "agency", 4)?,
        only_digits(carteira, "carteira", 2)?,
        only_digits(our_number, "nosso número", 11)?,
        only_digits(account, "account", 7)?,
    ))
}

/// Builds the 44-digit barcode
pub fn barcode(bank_code: &str, due_date: NaiveDate, amount: &Money, free_field: &str) -> Result<String, FinanceError> {
    let bank = only_digits(bank_code, "bank code", 3)?;
    if free_field.len() != 25 || !free_field.chars().all(|c| c.is_ascii_digit()) {
        return Err(FinanceError::InvalidBoletoData("free field must have 25 digits".to_string()));
    }
    let cents = amount.round_to_currency().to_minor();
    if !(0..=9_999_999_999).contains(&cents) {
        return Err(FinanceError::InvalidBoletoData(format!("amount {amount} out of range")));
    }
    let factor = due_factor(due_date)?;

    let tail = format!("{factor:04}{cents:010}{free_field}");
    let dv = mod11(&format!("{bank}9{tail}"));
    Ok(format!("{bank}9{dv}{tail}"))
}

/// Checks length and the general check digit of a barcode
pub fn validate_barcode(barcode: &str) -> Result<(), FinanceError> {
    if barcode.len() != 44 || !barcode.chars().all(|c| c.is_ascii_digit()) {
        return Err(FinanceError::InvalidBoletoData("barcode must have 44 digits".to_string()));
    }
    let without_dv = format!("{}{}", &barcode[..4], &barcode[5..]);
    let expected = mod11(&without_dv);
    if barcode[4..5] != expected.to_string() {
        return Err(FinanceError::InvalidBoletoData("barcode check digit mismatch".to_string()));
    }
    Ok(())
}

/// Converts a barcode into the 47-digit digitable line
pub fn digitable_line(barcode: &str) -> Result<String, FinanceError> {
    validate_barcode(barcode)?;
    let free = &barcode[19..44];

    let field1 = format!("{}{}", &barcode[..4], &free[..5]);
    let field2 = &free[5..15];
    let field3 = &free[15..25];

    Ok(format!(
        "{field1}{}{field2}{}{field3}{}{}{}",
        mod10(&field1),
        mod10(field2),
        mod10(field3),
        &barcode[4..5],
        &barcode[5..19],
    ))
}

/// Formats a digitable line the way it is printed on the slip
pub fn format_digitable_line(line: &str) -> String {
    if line.len() != 47 {
        return line.to_string();
    }
    format!(
        "{}.{} {}.{} {}.{} {} {}",
        &line[0..5],
        &line[5..10],
        &line[10..15],
        &line[15..21],
        &line[21..26],
        &line[26..32],
        &line[32..33],
        &line[33..47],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_due_factor_reset() {
        assert_eq!(due_factor(date(2000, 7, 3)).unwrap(), 1000);
        assert_eq!(due_factor(date(2025, 2, 21)).unwrap(), 9999);
        assert_eq!(due_factor(date(2025, 2, 22)).unwrap(), 1000);
        assert_eq!(due_factor(date(2025, 3, 10)).unwrap(), 1016);
        assert!(due_factor(date(1999, 1, 1)).is_err());
    }

    #[test]
    fn test_barcode_and_digitable_line() {
        let free = free_field("1234", "09", "42", "56789").unwrap();
        assert_eq!(free, "1234090000000004200567890");

        let code = barcode("237", date(2024, 6, 13), &Money::brl(dec!(33.34)), &free).unwrap();
        assert_eq!(code, "23797974600000033341234090000000004200567890");

        let line = digitable_line(&code).unwrap();
        assert_eq!(line, "23791234059000000000142005678901797460000003334");
        assert_eq!(
            format_digitable_line(&line),
            "23791.23405 90000.000001 42005.678901 7 97460000003334"
        );
    }

    #[test]
    fn test_tampered_barcode_rejected() {
        let tampered = "23797974600000033351234090000000004200567890";
        assert!(validate_barcode(tampered).is_err());
    }
}
