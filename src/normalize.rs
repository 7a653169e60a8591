//! Input normalization for the CCB entry form.
//!
//! These helpers run on every keystroke, so all of them are total: partial
//! or empty input never fails, it just formats as far as it can.
//!
//! Storage and display are kept strictly apart:
//! - `limite` is stored as a decimal and displayed as `1.234,56`.
//! - `cpf_cnpj` is stored digits-only and displayed as `000.000.000-00` or
//!   `00.000.000/0000-00`.
use bigdecimal::BigDecimal;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

static INDIVIDUAL_TAX_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{3})(\d{3})(\d{3})(\d{2})").expect("individual tax id pattern is valid")
});

static ENTITY_TAX_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2})(\d{3})(\d{3})(\d{4})(\d{2})").expect("entity tax id pattern is valid")
});

/// Number of digits in an individual taxpayer id (CPF).
pub const CPF_LEN: usize = 11;
/// Number of digits in an entity taxpayer id (CNPJ).
pub const CNPJ_LEN: usize = 14;

/// Strips everything that is not an ASCII digit.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Formats raw input as a BRL amount in pt-BR notation.
///
/// The digits of `raw` are read as cents, so typing `123456` renders
/// `1.234,56`. Grouping separators are non-digits, which makes feeding the
/// previous display string back in reproduce the same amount.
///
/// Empty input renders `0,00`.
pub fn format_currency(raw: &str) -> String {
    let digits = digits_only(raw);
    let significant = digits.trim_start_matches('0');
    let padded = format!("{:0>3}", significant);
    let (integer, cents) = padded.split_at(padded.len() - 2);

    format!("{},{}", group_thousands(integer), cents)
}

fn group_thousands(integer: &str) -> String {
    let len = integer.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (idx, ch) in integer.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

/// Converts a `format_currency` display string back into a decimal.
///
/// Drops the `.` grouping separators and turns the decimal comma into a
/// point. Returns `None` when what is left is not a number.
pub fn parse_currency_display(display: &str) -> Option<BigDecimal> {
    let normalized = display.trim().replace('.', "").replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    BigDecimal::from_str(&normalized).ok()
}

/// Renders a stored limit the way the entry form displays it.
pub fn format_limit(value: &BigDecimal) -> String {
    let cents = (value * &BigDecimal::from(100)).round(0).with_scale(0);
    format_currency(&cents.to_string())
}

/// Formats a CPF or CNPJ for display.
///
/// Up to 11 digits use the individual pattern, anything longer the entity
/// pattern. A pattern only applies once enough digits are present, so a
/// half-typed document comes back as bare digits. No check digit validation
/// happens here.
pub fn format_tax_id(raw: &str) -> String {
    let digits = digits_only(raw);
    if digits.len() <= CPF_LEN {
        INDIVIDUAL_TAX_ID
            .replace(&digits, "${1}.${2}.${3}-${4}")
            .into_owned()
    } else {
        ENTITY_TAX_ID
            .replace(&digits, "${1}.${2}.${3}/${4}-${5}")
            .into_owned()
    }
}

/// Boolean coercion used for pasted "pendência" cells.
pub fn coerce_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "sim" | "yes" | "true" | "1"
    )
}
