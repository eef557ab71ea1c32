//! Number/string conversions compatible with the ones flag definitions are authored against.
//!
//! Flags are shared with evaluators running in JavaScript runtimes, so the textual form of a number
//! (hashed by `PERCENTAGE`, compared by `STR_EQUAL_SOFT`) and the numeric form of a version
//! component must be the ECMAScript ones, e.g. `1.0` prints as `"1"` and `" 07 "` parses as `7`.

/// Format `n` the way ECMAScript `Number.prototype.toString()` does.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n == 0.0 {
        // Covers -0 as well.
        return "0".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n < 0.0 {
        return format!("-{}", format_number(-n));
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e3" or "5e-7".
    let exp_repr = format!("{n:e}");
    let (mantissa, exponent) = exp_repr.split_once('e').unwrap_or((&exp_repr, "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let k = digits.len() as i32;
    // Position of the decimal point relative to the start of `digits`.
    let point = exponent + 1;

    if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{sign}{}", exponent.abs())
        } else {
            format!("{first}.{rest}e{sign}{}", exponent.abs())
        }
    }
}

/// ECMAScript `WhiteSpace` and `LineTerminator` code points. Narrower than
/// [`char::is_whitespace`], which also accepts U+0085.
fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{9}'..='\u{d}'
            | ' '
            | '\u{a0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200a}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202f}'
            | '\u{205f}'
            | '\u{3000}'
            | '\u{feff}'
    )
}

/// Convert `s` to a number the way ECMAScript `Number(string)` does. Unparseable input yields
/// `NaN`.
pub(crate) fn parse_number(s: &str) -> f64 {
    let s = s.trim_matches(is_js_whitespace);
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            return parse_integer(digits, radix);
        }
    }

    // Rust's float grammar also accepts "inf" and "nan" spellings, which must stay NaN here.
    let is_decimal_literal = s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !is_decimal_literal {
        return f64::NAN;
    }

    s.parse().unwrap_or(f64::NAN)
}

fn parse_integer(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits.chars().try_fold(0.0, |acc, c| {
        c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
    })
    .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::{format_number, parse_number};

    #[test]
    fn format_integers() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-42.0), "-42");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1649846220000.0), "1649846220000");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn format_fractions() {
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(123.456), "123.456");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(-2.25), "-2.25");
    }

    #[test]
    fn format_exponents() {
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e22), "1.5e+22");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(1.25e-7), "1.25e-7");
    }

    #[test]
    fn format_special_values() {
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn parse_decimal() {
        assert_eq!(parse_number("1"), 1.0);
        assert_eq!(parse_number("020"), 20.0);
        assert_eq!(parse_number("0100"), 100.0);
        assert_eq!(parse_number(" 7 "), 7.0);
        assert_eq!(parse_number("1.5"), 1.5);
        assert_eq!(parse_number("-3"), -3.0);
        assert_eq!(parse_number("1e3"), 1000.0);
    }

    #[test]
    fn parse_empty_is_zero() {
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("   "), 0.0);
    }

    #[test]
    fn parse_trims_ecmascript_whitespace_only() {
        assert_eq!(parse_number("\u{a0}7\u{2028}"), 7.0);
        assert_eq!(parse_number("\t\u{feff}12\u{3000}\r\n"), 12.0);
        assert!(parse_number("\u{85}1").is_nan());
        assert!(parse_number("1\u{85}").is_nan());
    }

    #[test]
    fn parse_radix_literals() {
        assert_eq!(parse_number("0x10"), 16.0);
        assert_eq!(parse_number("0b101"), 5.0);
        assert_eq!(parse_number("0o17"), 15.0);
        assert!(parse_number("0x").is_nan());
        assert!(parse_number("0xZZ").is_nan());
    }

    #[test]
    fn parse_infinity() {
        assert_eq!(parse_number("Infinity"), f64::INFINITY);
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn parse_garbage_is_nan() {
        assert!(parse_number("4-beta").is_nan());
        assert!(parse_number("rc1").is_nan());
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("nan").is_nan());
        assert!(parse_number("1e").is_nan());
        assert!(parse_number(".").is_nan());
    }
}
