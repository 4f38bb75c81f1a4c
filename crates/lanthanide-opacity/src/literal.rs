//! Decimal values that remember how they are written.
//!
//! The opacity endpoint is queried with temperatures and energy bounds
//! rendered exactly as the historical harvests rendered them (`.01`, `1`,
//! `1.25e-05`, `150000.0`). A [`NumericLiteral`] keeps that text next to
//! the parsed value used for indexing.

use std::fmt;
use std::str::FromStr;

use crate::types::{OpacityError, OpacityResult};

/// A finite decimal number paired with its query-string spelling.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericLiteral {
    text: String,
    value: f64,
}

impl NumericLiteral {
    /// Parse `text`, keeping it verbatim (minus surrounding whitespace).
    pub fn new(text: &str) -> OpacityResult<Self> {
        let text = text.trim();
        match parse_decimal(text) {
            Some(value) if value.is_finite() => Ok(Self {
                text: text.to_string(),
                value,
            }),
            _ => Err(OpacityError::InvalidInput(format!(
                "not a finite decimal number: '{text}'"
            ))),
        }
    }

    /// Literal for a value with no preferred spelling.
    pub fn from_value(value: f64) -> Self {
        Self {
            text: value.to_string(),
            value,
        }
    }

    /// Query-string spelling.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl FromStr for NumericLiteral {
    type Err = OpacityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for NumericLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Lenient decimal coercion for table cells.
///
/// Accepts surrounding whitespace, a leading `+`, bare leading dots and
/// Fortran `D` exponents (`1.0D-05`). Empty text is not a number.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    if text.contains(['D', 'd']) {
        let swapped: String = text
            .chars()
            .map(|c| if c == 'D' || c == 'd' { 'e' } else { c })
            .collect();
        return swapped.parse::<f64>().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_dot_literal_keeps_text() {
        let lit = NumericLiteral::new(".01").unwrap();
        assert_eq!(lit.text(), ".01");
        assert_eq!(lit.value(), 0.01);
        assert_eq!(lit.to_string(), ".01");
    }

    #[test]
    fn test_exponent_literal_keeps_text() {
        let lit: NumericLiteral = "1.25e-05".parse().unwrap();
        assert_eq!(lit.text(), "1.25e-05");
        assert_eq!(lit.value(), 1.25e-5);

        let lit: NumericLiteral = "150000.0".parse().unwrap();
        assert_eq!(lit.text(), "150000.0");
        assert_eq!(lit.value(), 1.5e5);
    }

    #[test]
    fn test_rejects_non_finite_and_garbage() {
        assert!(NumericLiteral::new("").is_err());
        assert!(NumericLiteral::new("warm").is_err());
        assert!(NumericLiteral::new("inf").is_err());
        assert!(NumericLiteral::new("NaN").is_err());
    }

    #[test]
    fn test_from_value_uses_shortest_form() {
        assert_eq!(NumericLiteral::from_value(1.0).text(), "1");
        assert_eq!(NumericLiteral::from_value(0.07).text(), "0.07");
    }

    #[test]
    fn test_parse_decimal_cells() {
        assert_eq!(parse_decimal(" 3.5 "), Some(3.5));
        assert_eq!(parse_decimal("+2"), Some(2.0));
        assert_eq!(parse_decimal("1.0D-05"), Some(1.0e-5));
        assert_eq!(parse_decimal("2.5d+03"), Some(2500.0));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("   "), None);
        assert_eq!(parse_decimal("n/a"), None);
        assert_eq!(parse_decimal("dd"), None);
    }
}
