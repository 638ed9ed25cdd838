//! NF-e / NFC-e access key ("chave de acesso")
//!
//! ```text
//!  cUF AAMM CNPJ           mod série número    tpEmis cNF      DV
//!  35  2405 11222333000181 55  001   000000123 1      12345678 5
//! ```

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::Cnpj;
use crate::error::FiscalError;
use crate::invoice::FiscalModel;

const LENGTH: usize = 44;

/// A validated 44-digit access key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

impl AccessKey {
    /// Assembles the key and appends its check digit
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        uf_code: u8,
        issued_at: DateTime<Utc>,
        issuer: &Cnpj,
        model: FiscalModel,
        series: u16,
        number: u32,
        emission_type: u8,
        numeric_code: u32,
    ) -> Result<Self, FiscalError> {
        if !(11..=53).contains(&uf_code) {
            return Err(FiscalError::InvalidAccessKey(format!("unknown UF code {uf_code}")));
        }
        if series > 999 || number == 0 || number > 999_999_999 {
            return Err(FiscalError::InvalidAccessKey(format!(
                "series {series} / number {number} out of range"
            )));
        }
        if numeric_code > 99_999_999 {
            return Err(FiscalError::InvalidAccessKey(format!(
                "numeric code {numeric_code} has more than 8 digits"
            )));
        }

        let body = format!(
            "{:02}{:02}{:02}{}{:02}{:03}{:09}{}{:08}",
            uf_code,
            issued_at.year() % 100,
            issued_at.month(),
            issuer.digits(),
            model.code(),
            series,
            number,
            emission_type % 10,
            numeric_code,
        );
        let dv = check_digit(&body);
        Ok(Self(format!("{body}{dv}")))
    }

    /// Parses a key typed or scanned by a user, ignoring spaces
    pub fn parse(input: &str) -> Result<Self, FiscalError> {
        let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() != LENGTH || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(FiscalError::InvalidAccessKey(format!(
                "expected {LENGTH} digits, got '{input}'"
            )));
        }
        let expected = check_digit(&digits[..LENGTH - 1]);
        if digits[LENGTH - 1..] != expected.to_string() {
            return Err(FiscalError::InvalidAccessKey("check digit does not match".to_string()));
        }
        Ok(Self(digits))
    }

    pub fn digits(&self) -> &str {
        &self.0
    }

    pub fn uf_code(&self) -> &str {
        &self.0[0..2]
    }

    pub fn issuer_cnpj(&self) -> &str {
        &self.0[6..20]
    }

    pub fn model(&self) -> Option<FiscalModel> {
        FiscalModel::from_code(&self.0[20..22])
    }

    pub fn number(&self) -> u32 {
        self.0[25..34].parse().unwrap_or(0)
    }
}

/// Mod-11 with weights 2..9 from the right; remainders 0 and 1 give 0
pub fn check_digit(digits: &str) -> u32 {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| d * (2 + (i as u32 % 8)))
        .sum();
    match sum % 11 {
        0 | 1 => 0,
        r => 11 - r,
    }
}

impl fmt::Display for AccessKey {
    /// Groups of four, as printed on the DANFE
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<&str> = self
            .0
            .as_bytes()
            .chunks(4)
            .filter_map(|chunk| std::str::from_utf8(chunk).ok())
            .collect();
        write!(f, "{}", groups.join(" "))
    }
}

impl TryFrom<String> for AccessKey {
    type Error = FiscalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccessKey::parse(&value)
    }
}

impl From<AccessKey> for String {
    fn from(key: AccessKey) -> String {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "35240511222333000181550010000001231123456785";

    fn issuer() -> Cnpj {
        Cnpj::parse("11.222.333/0001-81").unwrap()
    }

    #[test]
    fn test_build_sample_key() {
        let issued = Utc.with_ymd_and_hms(2024, 5, 14, 15, 0, 0).unwrap();
        let key = AccessKey::build(35, issued, &issuer(), FiscalModel::NFe, 1, 123, 1, 12_345_678).unwrap();

        assert_eq!(key.digits(), SAMPLE);
        assert_eq!(key.uf_code(), "35");
        assert_eq!(key.issuer_cnpj(), "11222333000181");
        assert_eq!(key.model(), Some(FiscalModel::NFe));
        assert_eq!(key.number(), 123);
    }

    #[test]
    fn test_parse_rejects_wrong_digit() {
        assert!(AccessKey::parse(SAMPLE).is_ok());
        let tampered = format!("{}4", &SAMPLE[..43]);
        assert!(AccessKey::parse(&tampered).is_err());
        assert!(AccessKey::parse("3524").is_err());
    }

    #[test]
    fn test_display_groups() {
        let key = AccessKey::parse(SAMPLE).unwrap();
        assert!(key.to_string().starts_with("3524 0511 2223"));
        assert_eq!(key.to_string().len(), 44 + 10);
    }
}
