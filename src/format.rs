//! Parsing and rendering of the small, closed set of C-`printf`-style
//! numeric conversions that `Variable::format` may use (spec.md §3).
//!
//! A general `printf` engine is not worth building for four conversions;
//! supporting exactly `%.Nf`, `%.Ne`, `%.Ng`/`%.Nlg` and rejecting
//! everything else as a `ConfigError` is a deliberate narrowing, not a
//! silent one (see SPEC_FULL.md §3).

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumberFormat {
    /// `%.Nf` — fixed-point, N digits after the decimal point.
    Fixed(usize),
    /// `%.Ne` — scientific notation, N digits after the decimal point.
    Exp(usize),
    /// `%.Ng` / `%.Nlg` — shortest of fixed/scientific, N significant digits.
    General(usize),
}

impl NumberFormat {
    /// Parse a format string such as `"%.14lg"`, `"%.0lf"`, or `"%.3e"`.
    /// The `l` length modifier is accepted (as C's is for `double`) and
    /// ignored.
    pub(crate) fn parse(spec: &str) -> Result<Self> {
        let rest = spec
            .strip_prefix('%')
            .ok_or_else(|| invalid(spec))?;
        let rest = rest.strip_prefix('.').ok_or_else(|| invalid(spec))?;
        let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digit_end == 0 {
            return Err(invalid(spec));
        }
        let precision: usize = rest[..digit_end].parse().map_err(|_| invalid(spec))?;
        let conv = &rest[digit_end..];
        let conv = conv.strip_prefix('l').unwrap_or(conv);
        match conv {
            "f" => Ok(Self::Fixed(precision)),
            "e" => Ok(Self::Exp(precision)),
            "g" => Ok(Self::General(precision)),
            _ => Err(invalid(spec)),
        }
    }

    pub(crate) fn render(&self, value: f64) -> String {
        match self {
            Self::Fixed(n) => format!("{value:.*}", n),
            Self::Exp(n) => format!("{value:.*e}", n),
            Self::General(n) => render_general(value, *n),
        }
    }
}

/// Shortest-representation rendering with `n` significant digits,
/// matching C's `%g`: scientific notation is used when the exponent falls
/// outside `[-4, precision)`, fixed-point otherwise, and trailing zeros
/// (and a trailing decimal point) are trimmed.
fn render_general(value: f64, n: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let precision = n.max(1);
    let exponent = value.abs().log10().floor() as i32;
    let s = if exponent < -4 || exponent >= precision as i32 {
        let digits = precision.saturating_sub(1);
        let raw = format!("{value:.*e}", digits);
        trim_mantissa_exp(&raw)
    } else {
        let digits = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_trailing(&format!("{value:.*}", digits))
    };
    s
}

fn trim_trailing(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0');
    trimmed.trim_end_matches('.').to_string()
}

fn trim_mantissa_exp(s: &str) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) => format!("{}e{}", trim_trailing(mantissa), exp),
        None => s.to_string(),
    }
}

fn invalid(spec: &str) -> Error {
    Error::config(format!("unsupported variable format: {spec:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed() {
        assert_eq!(NumberFormat::parse("%.0lf").unwrap(), NumberFormat::Fixed(0));
        assert_eq!(NumberFormat::parse("%.3f").unwrap(), NumberFormat::Fixed(3));
    }

    #[test]
    fn parses_exp() {
        assert_eq!(NumberFormat::parse("%.3e").unwrap(), NumberFormat::Exp(3));
    }

    #[test]
    fn parses_general() {
        assert_eq!(
            NumberFormat::parse("%.14lg").unwrap(),
            NumberFormat::General(14)
        );
        assert_eq!(NumberFormat::parse("%.6g").unwrap(), NumberFormat::General(6));
    }

    #[test]
    fn rejects_unsupported() {
        assert!(NumberFormat::parse("%d").is_err());
        assert!(NumberFormat::parse("not a format").is_err());
    }

    #[test]
    fn renders_fixed() {
        assert_eq!(NumberFormat::Fixed(0).render(2.0), "2");
        assert_eq!(NumberFormat::Fixed(2).render(2.0), "2.00");
    }

    #[test]
    fn renders_general_trims_zeros() {
        assert_eq!(NumberFormat::General(14).render(2.0), "2");
        assert_eq!(NumberFormat::General(6).render(0.0001234), "0.0001234");
    }
}
