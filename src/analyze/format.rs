// src/analyze/format.rs
//! Unit-tagged output values.
//!
//! Prices are computed in 10,000-won units and only rescaled here, at the
//! output boundary. Every exposed value is truncated to an integer; a missing
//! value is `null`, never `0`.

use serde::Serialize;
use serde_json::Value;

/// Internal price unit: one "man-won".
pub const PRICE_SCALE: f64 = 10_000.0;

/// Square metres per pyeong.
pub const SQM_PER_PYEONG: f64 = 3.305785;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// 10,000-won input, won output.
    Price,
    /// 10,000-won-per-pyeong input, won-per-pyeong output.
    PricePerPyeong,
    /// Square metres, unchanged.
    Area,
}

impl UnitKind {
    fn scale(self) -> f64 {
        match self {
            UnitKind::Price | UnitKind::PricePerPyeong => PRICE_SCALE,
            UnitKind::Area => 1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UnitKind::Price => "KRW",
            UnitKind::PricePerPyeong => "KRW/pyeong",
            UnitKind::Area => "m²",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tagged {
    pub value: i64,
    pub unit: &'static str,
}

pub fn tag(value: Option<f64>, kind: UnitKind) -> Option<Tagged> {
    let v = value.filter(|v| v.is_finite())?;
    Some(Tagged {
        value: (v * kind.scale()).trunc() as i64,
        unit: kind.label(),
    })
}

/// `tag` as a JSON value (`null` when missing).
pub fn tagged(value: Option<f64>, kind: UnitKind) -> Value {
    match tag(value, kind) {
        Some(t) => serde_json::json!({ "value": t.value, "unit": t.unit }),
        None => Value::Null,
    }
}

/// Price per pyeong in internal units.
pub fn per_pyeong(price: f64, area_sqm: f64) -> f64 {
    price / area_sqm * SQM_PER_PYEONG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_rescales_to_won() {
        assert_eq!(
            tag(Some(50_000.0), UnitKind::Price),
            Some(Tagged { value: 500_000_000, unit: "KRW" })
        );
    }

    #[test]
    fn truncates_not_rounds() {
        assert_eq!(tag(Some(84.99), UnitKind::Area).unwrap().value, 84);
        assert_eq!(tag(Some(1.23456), UnitKind::Price).unwrap().value, 12_345);
        assert_eq!(tag(Some(-0.5), UnitKind::Area).unwrap().value, 0);
    }

    #[test]
    fn missing_is_null() {
        assert_eq!(tag(None, UnitKind::Price), None);
        assert_eq!(tag(Some(f64::NAN), UnitKind::Price), None);
        assert!(tagged(None, UnitKind::PricePerPyeong).is_null());
        assert_eq!(tagged(Some(0.0), UnitKind::Price)["value"], 0);
    }

    #[test]
    fn per_pyeong_uses_areal_constant() {
        let p = per_pyeong(100_000.0, 84.0);
        assert!((p - 3935.458).abs() < 0.01, "{p}");
        assert_eq!(tag(Some(p), UnitKind::PricePerPyeong).unwrap().value, 39_354_583);
    }
}
