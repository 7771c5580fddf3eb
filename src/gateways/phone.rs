//! Moroccan mobile number handling.
//!
//! Three spellings of the same national number are accepted:
//! `+212661234567`, `0661234567` and `212661234567`. The local part is nine
//! digits and starts with 5, 6 or 7. Adapters re-render the number in the
//! form their gateway expects.

use regex::Regex;
use std::sync::OnceLock;

static PHONE_RE: OnceLock<Regex> = OnceLock::new();

fn phone_re() -> &'static Regex {
    PHONE_RE.get_or_init(|| Regex::new(r"^(?:\+212|212|0)([5-7][0-9]{8})$").expect("valid regex"))
}

/// A validated Moroccan mobile number, stored as its nine-digit local part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Msisdn {
    local: String,
}

impl Msisdn {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        phone_re().captures(trimmed).map(|caps| Self {
            local: caps[1].to_string(),
        })
    }

    /// `+212661234567`
    pub fn international(&self) -> String {
        format!("+212{}", self.local)
    }

    /// `212661234567`
    pub fn unprefixed(&self) -> String {
        format!("212{}", self.local)
    }

    /// `0661234567`
    pub fn local(&self) -> String {
        format!("0{}", self.local)
    }

    /// Degenerate numbers (all one digit, or an ascending digit run) are
    /// structurally valid but worth flagging to the risk engine.
    pub fn is_degenerate(&self) -> bool {
        let digits: Vec<u8> = self.local.bytes().map(|b| b - b'0').collect();
        let all_same = digits.iter().all(|d| *d == digits[0]);
        let sequential_suffix = digits[1..].windows(2).all(|w| w[1] == w[0] + 1);
        all_same || sequential_suffix
    }
}

impl std::fmt::Display for Msisdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.international())
    }
}

pub fn is_valid(raw: &str) -> bool {
    Msisdn::parse(raw).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_three_national_spellings() {
        assert!(is_valid("+212661234567"));
        assert!(is_valid("0661234567"));
        assert!(is_valid("212661234567"));
    }

    #[test]
    fn rejects_foreign_and_malformed_numbers() {
        assert!(!is_valid("123456789"));
        assert!(!is_valid("+33123456789"));
        assert!(!is_valid("+21266123456")); // local part one digit short
        assert!(!is_valid("+2126612345678")); // one digit long
        assert!(!is_valid("0861234567")); // 8 is not a mobile prefix
    }

    #[test]
    fn renders_all_gateway_forms() {
        let msisdn = Msisdn::parse("0661234567").expect("valid number");
        assert_eq!(msisdn.international(), "+212661234567");
        assert_eq!(msisdn.unprefixed(), "212661234567");
        assert_eq!(msisdn.local(), "0661234567");
    }

    #[test]
    fn flags_degenerate_numbers_without_rejecting_them() {
        let same = Msisdn::parse("+212666666666").expect("valid number");
        assert!(same.is_degenerate());

        let ascending = Msisdn::parse("+212512345678").expect("valid number");
        assert!(ascending.is_degenerate());

        let normal = Msisdn::parse("+212661234567").expect("valid number");
        assert!(!normal.is_degenerate());
    }
}
