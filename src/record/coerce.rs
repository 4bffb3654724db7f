// src/record/coerce.rs
//! Numeric coercion for upstream text values.
//!
//! Upstream amounts arrive as strings like `" 125,000"`. Coercion is total:
//! anything that does not parse becomes `None` (missing). `0` stays `0.0`,
//! which matters for the zero-rent / positive-rent lease split.

/// Strip thousands separators and surrounding whitespace, then parse.
/// Non-finite results (`NaN`, `inf`) are treated as missing.
pub fn to_number(raw: Option<&str>) -> Option<f64> {
    let s = raw?;
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let t = cleaned.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer view used for date parts (`"6"` → 6, `"06"` → 6, `"2025.0"` → 2025).
pub fn to_whole(raw: Option<&str>) -> Option<i64> {
    to_number(raw).map(|v| v.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_commas_and_whitespace() {
        assert_eq!(to_number(Some("1,234")), Some(1234.0));
        assert_eq!(to_number(Some("  125,000 ")), Some(125_000.0));
        assert_eq!(to_number(Some("84.97")), Some(84.97));
    }

    #[test]
    fn empty_and_null_are_missing() {
        assert_eq!(to_number(Some("")), None);
        assert_eq!(to_number(Some("   ")), None);
        assert_eq!(to_number(Some(",")), None);
        assert_eq!(to_number(None), None);
    }

    #[test]
    fn zero_is_not_missing() {
        assert_eq!(to_number(Some("0")), Some(0.0));
        assert_eq!(to_number(Some(" 0 ")), Some(0.0));
    }

    #[test]
    fn garbage_never_panics() {
        for s in ["abc", "1.2.3", "NaN", "inf", "-inf", "12만", "--1", "\u{00a0}"] {
            assert_eq!(to_number(Some(s)), None, "input {s:?}");
        }
    }

    #[test]
    fn whole_numbers_truncate() {
        assert_eq!(to_whole(Some("06")), Some(6));
        assert_eq!(to_whole(Some("2025.0")), Some(2025));
        assert_eq!(to_whole(Some("x")), None);
    }
}
