//! Brazilian mobile numbers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MessagingError;

const COUNTRY_CODE: &str = "55";

/// A phone number normalized to digits with the 55 country code
///
/// `(11) 99999-9999`, `+55 11 99999-9999` and `11999999999` all become
/// `5511999999999`, which is what the gateway expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse_br(input: &str) -> Result<Self, MessagingError> {
        let mut digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

        // Trunk prefix, e.g. 0 11 99999-9999; 0x is never an area code
        if digits.starts_with('0') && matches!(digits.len(), 11 | 12) && !digits[1..].starts_with('0') {
            digits.remove(0);
        }
        let national = match digits.len() {
            10 | 11 => digits,
            12 | 13 if digits.starts_with(COUNTRY_CODE) => digits[2..].to_string(),
            _ => return Err(MessagingError::InvalidPhone(input.to_string())),
        };

        let area = &national[..2];
        if area.starts_with('0') || area.ends_with('0') {
            return Err(MessagingError::InvalidPhone(format!("{input}: invalid area code {area}")));
        }
        let subscriber = &national[2..];
        if national.len() == 11 && !subscriber.starts_with('9') {
            return Err(MessagingError::InvalidPhone(format!("{input}: mobile numbers start with 9")));
        }
        // Landlines start with 2 to 5
        if national.len() == 10 && !matches!(subscriber.as_bytes()[0], b'2'..=b'5') {
            return Err(MessagingError::InvalidPhone(format!("{input}: landline numbers start with 2 to 5")));
        }
        Ok(Self(format!("{COUNTRY_CODE}{national}")))
    }

    /// Digits with country code, as sent to the gateway
    pub fn digits(&self) -> &str {
        &self.0
    }

    pub fn area_code(&self) -> &str {
        &self.0[2..4]
    }

    pub fn is_mobile(&self) -> bool {
        self.0.len() == 13
    }

    /// WhatsApp JID for this number
    pub fn jid(&self) -> String {
        format!("{}@s.whatsapp.net", self.0)
    }

    /// Parses the number part of a JID such as `5511999999999@s.whatsapp.net`
    pub fn from_jid(jid: &str) -> Result<Self, MessagingError> {
        let number = jid.split('@').next().unwrap_or_default();
        Self::parse_br(number)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let national = &self.0[2..];
        let (area, rest) = national.split_at(2);
        let split = rest.len() - 4;
        write!(f, "+55 ({}) {}-{}", area, &rest[..split], &rest[split..])
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = MessagingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PhoneNumber::parse_br(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> String {
        phone.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_formats() {
        for input in [
            "(11) 99999-8888",
            "+55 11 99999-8888",
            "5511999998888",
            "11999998888",
            "011 99999-8888",
        ] {
            assert_eq!(PhoneNumber::parse_br(input).unwrap().digits(), "5511999998888", "{input}");
        }
    }

    #[test]
    fn test_landline() {
        let phone = PhoneNumber::parse_br("(21) 3333-4444").unwrap();
        assert_eq!(phone.digits(), "552133334444");
        assert!(!phone.is_mobile());
        assert_eq!(phone.to_string(), "+55 (21) 3333-4444");
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(PhoneNumber::parse_br("12345").is_err());
        assert!(PhoneNumber::parse_br("(01) 99999-8888").is_err());
        assert!(PhoneNumber::parse_br("(11) 89999-8888").is_err());
    }

    #[test]
    fn test_zero_area_is_not_a_trunk_prefix() {
        // 01 99999-8888 must not be read as the landline (19) 9999-8888
        assert!(PhoneNumber::parse_br("01999998888").is_err());
        assert!(PhoneNumber::parse_br("(19) 9999-8888").is_err());
        assert_eq!(PhoneNumber::parse_br("0 19 3333-4444").unwrap().digits(), "551933334444");
        assert!(PhoneNumber::parse_br("0 01 3333-4444").is_err());
    }

    #[test]
    fn test_jid_round_trip() {
        let phone = PhoneNumber::parse_br("11999998888").unwrap();
        assert_eq!(phone.jid(), "5511999998888@s.whatsapp.net");
        assert_eq!(PhoneNumber::from_jid(&phone.jid()).unwrap(), phone);
        assert_eq!(phone.to_string(), "+55 (11) 99999-8888");
    }
}
