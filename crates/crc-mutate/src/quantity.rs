//! Minimal understanding of Kubernetes resource quantities.
//!
//! The webhook never does arithmetic on quantities: it only needs to know
//! whether a quantity is well formed and whether it amounts to zero. A zero
//! quantity is rendered by Kubernetes as `"0"`, which is also how an unset
//! request or limit is rendered, hence zero and unset are treated alike.
//!
//! Grammar accepted, as documented by `k8s.io/apimachinery/pkg/api/resource`:
//!
//! ```text
//! <quantity>        ::= <signedNumber><suffix>
//! <signedNumber>    ::= <number> | <sign><number>
//! <sign>            ::= "+" | "-"
//! <number>          ::= <digits> | <digits>.<digits> | <digits>. | .<digits>
//! <suffix>          ::= <binarySI> | <decimalExponent> | <decimalSI>
//! <binarySI>        ::= Ki | Mi | Gi | Ti | Pi | Ei
//! <decimalSI>       ::= n | u | m | "" | k | M | G | T | P | E
//! <decimalExponent> ::= "e" <signedNumber> | "E" <signedNumber>
//! ```

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,

    #[error("quantity {0:?} does not start with a number")]
    InvalidNumber(String),

    #[error("quantity {0:?} has an unknown suffix")]
    InvalidSuffix(String),
}

/// Validate `quantity` and report whether it amounts to zero.
///
/// Surrounding whitespace is ignored.
pub fn is_zero(quantity: &Quantity) -> Result<bool, QuantityError> {
    let raw = quantity.0.trim();
    if raw.is_empty() {
        return Err(QuantityError::Empty);
    }

    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    let number_len = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_len);

    if !number.chars().any(|c| c.is_ascii_digit()) || number.matches('.').count() > 1 {
        return Err(QuantityError::InvalidNumber(raw.to_owned()));
    }
    if !is_valid_suffix(suffix) {
        return Err(QuantityError::InvalidSuffix(raw.to_owned()));
    }

    Ok(number.chars().all(|c| c == '0' || c == '.'))
}

fn is_valid_suffix(suffix: &str) -> bool {
    match suffix {
        "" | "n" | "u" | "m" | "k" | "M" | "G" | "T" | "P" | "E" => true,
        "Ki" | "Mi" | "Gi" | "Ti" | "Pi" | "Ei" => true,
        _ => suffix
            .strip_prefix(['e', 'E'])
            .map(|exponent| exponent.strip_prefix(['+', '-']).unwrap_or(exponent))
            .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", true)]
    #[case("0m", true)]
    #[case("0Mi", true)]
    #[case("0.0", true)]
    #[case("+0", true)]
    #[case("-0.", true)]
    #[case("0e3", true)]
    #[case(".0E", true)]
    #[case("1", false)]
    #[case("100m", false)]
    #[case("256Mi", false)]
    #[case("0.5", false)]
    #[case(".5Gi", false)]
    #[case("1e3", false)]
    #[case("12E-2", false)]
    #[case("2E", false)]
    #[case("500u", false)]
    #[case(" 100m", false)]
    #[case("256Mi\n", false)]
    #[case("\t0 ", true)]
    fn valid_quantities(#[case] input: &str, #[case] expected_zero: bool) {
        assert_eq!(is_zero(&Quantity(input.to_owned())), Ok(expected_zero));
    }

    #[rstest]
    #[case("", QuantityError::Empty)]
    #[case("  ", QuantityError::Empty)]
    #[case("Mi", QuantityError::InvalidNumber("Mi".to_owned()))]
    #[case(".", QuantityError::InvalidNumber(".".to_owned()))]
    #[case("1.2.3", QuantityError::InvalidNumber("1.2.3".to_owned()))]
    #[case("-", QuantityError::InvalidNumber("-".to_owned()))]
    #[case("1Xi", QuantityError::InvalidSuffix("1Xi".to_owned()))]
    #[case("1e", QuantityError::InvalidSuffix("1e".to_owned()))]
    #[case("1 Gi", QuantityError::InvalidSuffix("1 Gi".to_owned()))]
    fn invalid_quantities(#[case] input: &str, #[case] expected: QuantityError) {
        assert_eq!(is_zero(&Quantity(input.to_owned())), Err(expected));
    }
}
