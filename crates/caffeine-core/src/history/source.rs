use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A named, reusable caffeine item such as "Coffee".
///
/// Identity is the case-insensitive name; the history store keeps names
/// unique under that comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaffeineSource {
    pub name: String,
    #[serde(rename = "amount")]
    pub amount_mg: u32,
}

impl CaffeineSource {
    pub fn new(name: impl Into<String>, amount_mg: u32) -> Self {
        Self {
            name: name.into(),
            amount_mg,
        }
    }

    /// Case-insensitive name comparison.
    pub fn same_name(&self, other: &str) -> bool {
        names_match(&self.name, other)
    }
}

pub(crate) fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Check a user-entered dose amount. Returns it as milligrams.
pub fn validate_amount(amount_mg: i64) -> Result<u32, ValidationError> {
    if amount_mg <= 0 {
        return Err(ValidationError::NonPositiveAmount(amount_mg));
    }
    u32::try_from(amount_mg).map_err(|_| ValidationError::AmountTooLarge(amount_mg))
}

/// Check user input for a source before it reaches the store.
pub fn validate_source(name: &str, amount_mg: i64) -> Result<u32, ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }
    validate_amount(amount_mg)
}

/// Showcase list written on first launch.
pub fn default_sources() -> Vec<CaffeineSource> {
    vec![
        CaffeineSource::new("1 Espresso Shot", 64),
        CaffeineSource::new("Green Tea", 35),
        CaffeineSource::new("Red Bull", 80),
        CaffeineSource::new("Grey Bull", 80),
        CaffeineSource::new("Pink Bull", 80),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_compare_case_insensitively() {
        let coffee = CaffeineSource::new("Coffee", 95);
        assert!(coffee.same_name("COFFEE"));
        assert!(!coffee.same_name("Coffee "));
    }

    #[test]
    fn validation_rejects_blank_and_non_positive() {
        assert_eq!(validate_source("   ", 10), Err(ValidationError::BlankName));
        assert_eq!(
            validate_source("Tea", 0),
            Err(ValidationError::NonPositiveAmount(0))
        );
        assert_eq!(validate_source("Tea", 35), Ok(35));
        assert_eq!(
            validate_amount(i64::from(u32::MAX) + 1),
            Err(ValidationError::AmountTooLarge(i64::from(u32::MAX) + 1))
        );
    }

    #[test]
    fn serializes_with_amount_key() {
        let json = serde_json::to_string(&CaffeineSource::new("Tea", 35)).unwrap();
        assert_eq!(json, r#"{"name":"Tea","amount":35}"#);
    }

    #[test]
    fn default_sources_have_unique_names() {
        let sources = default_sources();
        for (i, a) in sources.iter().enumerate() {
            assert!(sources[i + 1..].iter().all(|b| !a.same_name(&b.name)));
        }
    }
}
