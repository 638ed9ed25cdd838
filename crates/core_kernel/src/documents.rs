//! Brazilian taxpayer documents
//!
//! CPF identifies people (11 digits) and CNPJ identifies companies
//! (14 digits). Both end in two mod-11 check digits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Invalid length for {kind}: expected {expected} digits, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid {0}: repeated digits")]
    RepeatedDigits(&'static str),

    #[error("Invalid {0}: check digits do not match")]
    CheckDigitMismatch(&'static str),
}

fn digits_of(input: &str) -> Vec<u32> {
    input.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn cpf_check_digit(digits: &[u32]) -> u32 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (weight_start - i as u32))
        .sum();
    let rest = (sum * 10) % 11;
    if rest == 10 { 0 } else { rest }
}

fn cnpj_check_digit(digits: &[u32]) -> u32 {
    const WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    let offset = WEIGHTS.len() - digits.len();
    let sum: u32 = digits
        .iter()
        .zip(&WEIGHTS[offset..])
        .map(|(d, w)| d * w)
        .sum();
    let rest = sum % 11;
    if rest < 2 { 0 } else { 11 - rest }
}

fn validate(
    kind: &'static str,
    input: &str,
    expected: usize,
    check: fn(&[u32]) -> u32,
) -> Result<String, DocumentError> {
    let digits = digits_of(input);
    if digits.len() != expected {
        return Err(DocumentError::InvalidLength {
            kind,
            expected,
            actual: digits.len(),
        });
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return Err(DocumentError::RepeatedDigits(kind));
    }

    let first = check(&digits[..expected - 2]);
    let second = check(&digits[..expected - 1]);
    if digits[expected - 2] != first || digits[expected - 1] != second {
        return Err(DocumentError::CheckDigitMismatch(kind));
    }

    Ok(digits.iter().map(|d| char::from_digit(*d, 10).unwrap_or('0')).collect())
}

/// Cadastro de Pessoas Físicas
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cpf(String);

impl Cpf {
    /// Parses a CPF, accepting punctuation such as `529.982.247-25`
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        validate("CPF", input, 11, cpf_check_digit).map(Cpf)
    }

    /// The bare 11 digits
    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        write!(f, "{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
    }
}

/// Cadastro Nacional da Pessoa Jurídica
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cnpj(String);

impl Cnpj {
    /// Parses a CNPJ, accepting punctuation such as `11.222.333/0001-81`
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        validate("CNPJ", input, 14, cnpj_check_digit).map(Cnpj)
    }

    pub fn digits(&self) -> &str {
        &self.0
    }

    /// The 8-digit root shared by every branch of the company
    pub fn root(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Cnpj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        write!(
            f,
            "{}.{}.{}/{}-{}",
            &d[0..2], &d[2..5], &d[5..8], &d[8..12], &d[12..14]
        )
    }
}

macro_rules! string_conversions {
    ($name:ident) => {
        impl TryFrom<String> for $name {
            type Error = DocumentError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $name::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(doc: $name) -> String {
                doc.0
            }
        }

        impl FromStr for $name {
            type Err = DocumentError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::parse(s)
            }
        }
    };
}

string_conversions!(Cpf);
string_conversions!(Cnpj);

/// Either kind of taxpayer document, as stored on customers and invoices
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "number", rename_all = "UPPERCASE")]
pub enum TaxDocument {
    Cpf(Cpf),
    Cnpj(Cnpj),
}

impl TaxDocument {
    /// Detects the document type by digit count
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        match digits_of(input).len() {
            11 => Cpf::parse(input).map(TaxDocument::Cpf),
            14 => Cnpj::parse(input).map(TaxDocument::Cnpj),
            actual => Err(DocumentError::InvalidLength {
                kind: "CPF/CNPJ",
                expected: 11,
                actual,
            }),
        }
    }

    pub fn digits(&self) -> &str {
        match self {
            TaxDocument::Cpf(cpf) => cpf.digits(),
            TaxDocument::Cnpj(cnpj) => cnpj.digits(),
        }
    }

    pub fn is_company(&self) -> bool {
        matches!(self, TaxDocument::Cnpj(_))
    }
}

impl fmt::Display for TaxDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxDocument::Cpf(cpf) => cpf.fmt(f),
            TaxDocument::Cnpj(cnpj) => cnpj.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cpf() {
        let cpf = Cpf::parse("529.982.247-25").unwrap();
        assert_eq!(cpf.digits(), "52998224725");
        assert_eq!(cpf.to_string(), "529.982.247-25");
    }

    #[test]
    fn test_invalid_cpf_check_digit() {
        assert_eq!(
            Cpf::parse("529.982.247-26"),
            Err(DocumentError::CheckDigitMismatch("CPF"))
        );
    }

    #[test]
    fn test_repeated_digits_rejected() {
        assert_eq!(Cpf::parse("111.111.111-11"), Err(DocumentError::RepeatedDigits("CPF")));
    }

    #[test]
    fn test_valid_cnpj() {
        let cnpj = Cnpj::parse("11.222.333/0001-81").unwrap();
        assert_eq!(cnpj.to_string(), "11.222.333/0001-81");
        assert_eq!(cnpj.root(), "11222333");
    }

    #[test]
    fn test_tax_document_detects_kind() {
        assert!(TaxDocument::parse("11222333000181").unwrap().is_company());
        assert!(!TaxDocument::parse("52998224725").unwrap().is_company());
        assert!(TaxDocument::parse("123").is_err());
    }
}
