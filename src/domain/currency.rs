use crate::error::{CrowdfundingError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymbolPosition {
    #[default]
    Beginning,
    End,
}

/// Currency reference data. Rows are never modified once loaded.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Currency {
    pub id: u32,
    pub title: String,
    /// ISO 4217 code, e.g. `EUR`.
    pub code: String,
    pub symbol: String,
    #[serde(default)]
    pub position: SymbolPosition,
}

/// Locale settings used to render and read amounts.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct FormatOptions {
    pub decimal_separator: String,
    pub thousands_separator: String,
    pub fraction_digits: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            decimal_separator: ".".to_string(),
            thousands_separator: ",".to_string(),
            fraction_digits: 2,
        }
    }
}

/// Binds a currency to the component's format options.
///
/// `format_currency` and `parse` are inverses for every value representable with
/// `fraction_digits` decimals.
#[derive(Debug, Clone)]
pub struct AmountFormatter {
    options: FormatOptions,
    currency: Option<Currency>,
}

impl AmountFormatter {
    pub fn new(options: FormatOptions) -> Self {
        Self {
            options,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn currency(&self) -> Option<&Currency> {
        self.currency.as_ref()
    }

    /// Renders the number only, e.g. `1,234.50`.
    pub fn format(&self, value: Decimal) -> String {
        let rounded = value.round_dp_with_strategy(
            self.options.fraction_digits,
            RoundingStrategy::MidpointAwayFromZero,
        );
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        format!("{sign}{}", self.format_unsigned(rounded.abs()))
    }

    /// Renders the number with the currency symbol (or code), e.g. `$1,234.50`.
    pub fn format_currency(&self, value: Decimal) -> String {
        let rounded = value.round_dp_with_strategy(
            self.options.fraction_digits,
            RoundingStrategy::MidpointAwayFromZero,
        );
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let number = self.format_unsigned(rounded.abs());

        match &self.currency {
            Some(currency) if !currency.symbol.is_empty() => match currency.position {
                SymbolPosition::Beginning => format!("{sign}{}{number}", currency.symbol),
                SymbolPosition::End => format!("{sign}{number} {}", currency.symbol),
            },
            Some(currency) => format!("{sign}{number} {}", currency.code),
            None => format!("{sign}{number}"),
        }
    }

    /// Reads a localized amount typed into a form back into a decimal value.
    pub fn parse(&self, text: &str) -> Result<Decimal> {
        let mut cleaned = text.to_string();
        if let Some(currency) = &self.currency {
            if !currency.symbol.is_empty() {
                cleaned = cleaned.replace(&currency.symbol, "");
            }
            if !currency.code.is_empty() {
                cleaned = cleaned.replace(&currency.code, "");
            }
        }
        cleaned.retain(|c| !c.is_whitespace());
        if !self.options.thousands_separator.is_empty() {
            cleaned = cleaned.replace(&self.options.thousands_separator, "");
        }
        if self.options.decimal_separator != "." {
            cleaned = cleaned.replace(&self.options.decimal_separator, ".");
        }

        Decimal::from_str(&cleaned).map_err(|e| {
            CrowdfundingError::Validation(format!("Invalid amount '{text}': {e}"))
        })
    }

    fn format_unsigned(&self, value: Decimal) -> String {
        let digits = self.options.fraction_digits as usize;
        let plain = format!("{value:.digits$}");
        let (integer, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), ""));

        let len = integer.chars().count();
        let mut grouped = String::with_capacity(plain.len() + len / 3);
        for (i, c) in integer.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                grouped.push_str(&self.options.thousands_separator);
            }
            grouped.push(c);
        }

        if fraction.is_empty() {
            grouped
        } else {
            format!("{grouped}{}{fraction}", self.options.decimal_separator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dollar() -> Currency {
        Currency {
            id: 1,
            title: "US Dollar".to_string(),
            code: "USD".to_string(),
            symbol: "$".to_string(),
            position: SymbolPosition::Beginning,
        }
    }

    fn euro_options() -> FormatOptions {
        FormatOptions {
            decimal_separator: ",".to_string(),
            thousands_separator: ".".to_string(),
            fraction_digits: 2,
        }
    }

    #[test]
    fn test_format_groups_thousands() {
        let formatter = AmountFormatter::new(FormatOptions::default());
        assert_eq!(formatter.format(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(formatter.format(dec!(12)), "12.00");
        assert_eq!(formatter.format(dec!(-1000)), "-1,000.00");
    }

    #[test]
    fn test_format_currency_positions() {
        let formatter = AmountFormatter::new(FormatOptions::default()).with_currency(dollar());
        assert_eq!(formatter.format_currency(dec!(1234.5)), "$1,234.50");

        let mut euro = dollar();
        euro.code = "EUR".to_string();
        euro.symbol = "€".to_string();
        euro.position = SymbolPosition::End;
        let formatter = AmountFormatter::new(euro_options()).with_currency(euro);
        assert_eq!(formatter.format_currency(dec!(1234.5)), "1.234,50 €");
    }

    #[test]
    fn test_format_currency_without_symbol_uses_code() {
        let mut currency = dollar();
        currency.symbol = String::new();
        let formatter = AmountFormatter::new(FormatOptions::default()).with_currency(currency);
        assert_eq!(formatter.format_currency(dec!(5)), "5.00 USD");
    }

    #[test]
    fn test_parse_inverts_format_currency() {
        let formatter = AmountFormatter::new(FormatOptions::default()).with_currency(dollar());
        let text = formatter.format_currency(dec!(1234.5));
        assert_eq!(formatter.parse(&text).unwrap(), dec!(1234.5));

        let formatter = AmountFormatter::new(euro_options()).with_currency(dollar());
        for value in [dec!(0.01), dec!(-250.75), dec!(1000000)] {
            let text = formatter.format_currency(value);
            assert_eq!(formatter.parse(&text).unwrap(), value, "{text}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let formatter = AmountFormatter::new(FormatOptions::default());
        assert!(matches!(
            formatter.parse("twelve"),
            Err(CrowdfundingError::Validation(_))
        ));
    }
}
