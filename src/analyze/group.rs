// src/analyze/group.rs
//! Partitioning of cleaned records: by a resolved text column, by
//! building-age bucket, by area bucket.
//!
//! Output order is deterministic: field groups sort by value, bucket groups
//! keep their fixed bucket order. Empty groups are never produced.

use std::collections::BTreeMap;

use crate::record::resolve::Column;
use crate::record::TransactionRecord;

/// Half-open `[lo, hi)` bucket with a display label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub lo: f64,
    pub hi: f64,
    pub label: &'static str,
}

const fn bucket(lo: f64, hi: f64, label: &'static str) -> Bucket {
    Bucket { lo, hi, label }
}

/// Years since construction.
pub const AGE_BUCKETS: [Bucket; 4] = [
    bucket(0.0, 6.0, "5 years or newer"),
    bucket(6.0, 11.0, "6-10 years"),
    bucket(11.0, 21.0, "11-20 years"),
    bucket(21.0, f64::INFINITY, "over 20 years"),
];

/// Square metres.
pub const AREA_BUCKETS: [Bucket; 4] = [
    bucket(0.0, 100.0, "small (<100m²)"),
    bucket(100.0, 300.0, "medium (100-300m²)"),
    bucket(300.0, 1000.0, "large (300-1000m²)"),
    bucket(1000.0, f64::INFINITY, "extra_large (>1000m²)"),
];

/// Label of the bucket containing `value`; `None` below the first edge.
pub fn bucket_label(value: f64, buckets: &[Bucket]) -> Option<&'static str> {
    buckets
        .iter()
        .find(|b| value >= b.lo && value < b.hi)
        .map(|b| b.label)
}

pub type Groups<'r, 'a> = Vec<(String, Vec<&'r TransactionRecord<'a>>)>;

/// Group by the trimmed text of `column`. Records with a missing or blank
/// value are left out.
pub fn by_column<'r, 'a>(records: &[&'r TransactionRecord<'a>], column: &Column) -> Groups<'r, 'a> {
    if column.is_missing() {
        return Vec::new();
    }
    let mut map: BTreeMap<String, Vec<&'r TransactionRecord<'a>>> = BTreeMap::new();
    for &r in records {
        let Some(v) = column.get(r.raw).map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        map.entry(v.to_string()).or_default().push(r);
    }
    map.into_iter().collect()
}

/// Group by a numeric value falling into one of `buckets`.
pub fn by_bucket<'r, 'a>(
    records: &[&'r TransactionRecord<'a>],
    buckets: &[Bucket],
    value: impl Fn(&TransactionRecord<'a>) -> Option<f64>,
) -> Groups<'r, 'a> {
    let mut slots: Vec<Vec<&'r TransactionRecord<'a>>> = vec![Vec::new(); buckets.len()];
    for &r in records {
        let Some(v) = value(r) else { continue };
        if let Some(i) = buckets.iter().position(|b| v >= b.lo && v < b.hi) {
            slots[i].push(r);
        }
    }
    buckets
        .iter()
        .zip(slots)
        .filter(|(_, rs)| !rs.is_empty())
        .map(|(b, rs)| (b.label.to_string(), rs))
        .collect()
}

pub fn by_building_age<'r, 'a>(records: &[&'r TransactionRecord<'a>], current_year: i32) -> Groups<'r, 'a> {
    by_bucket(records, &AGE_BUCKETS, |r| {
        r.build_year.map(|y| f64::from(current_year) - y)
    })
}

pub fn by_area<'r, 'a>(records: &[&'r TransactionRecord<'a>]) -> Groups<'r, 'a> {
    by_bucket(records, &AREA_BUCKETS, |r| r.area)
}

/// Occurrence count per value, most frequent first (ties by value).
pub fn value_counts(records: &[&TransactionRecord<'_>], column: &Column) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = by_column(records, column)
        .into_iter()
        .map(|(k, rs)| (k, rs.len()))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AssetType;
    use crate::record::resolve::{field_table, Concept};
    use crate::record::{RawRecord, RecordSet};

    fn rec(dong: Option<&str>, year: &str, area: &str) -> RawRecord {
        [
            ("dealAmount", Some("1000".to_string())),
            ("umdNm", dong.map(str::to_string)),
            ("buildYear", Some(year.to_string())),
            ("excluUseAr", Some(area.to_string())),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn bucket_edges_are_half_open() {
        assert_eq!(bucket_label(0.0, &AGE_BUCKETS), Some("5 years or newer"));
        assert_eq!(bucket_label(5.99, &AGE_BUCKETS), Some("5 years or newer"));
        assert_eq!(bucket_label(6.0, &AGE_BUCKETS), Some("6-10 years"));
        assert_eq!(bucket_label(21.0, &AGE_BUCKETS), Some("over 20 years"));
        assert_eq!(bucket_label(-1.0, &AGE_BUCKETS), None);
        assert_eq!(bucket_label(100.0, &AREA_BUCKETS), Some("medium (100-300m²)"));
        assert_eq!(bucket_label(1000.0, &AREA_BUCKETS), Some("extra_large (>1000m²)"));
    }

    #[test]
    fn empty_buckets_are_omitted_and_order_fixed() {
        let set = RecordSet::new(vec![
            rec(Some("역삼동"), "1990", "150"),
            rec(Some("삼성동"), "2022", "50"),
            rec(None, "1995", "60"),
        ]);
        let table = field_table(AssetType::Apartment);
        let derived = set.derive(table, Concept::Price);
        let refs: Vec<_> = derived.iter().collect();

        let ages = by_building_age(&refs, 2025);
        let labels: Vec<_> = ages.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, ["5 years or newer", "over 20 years"]);
        assert_eq!(ages[1].1.len(), 2);

        let areas = by_area(&refs);
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].0, "small (<100m²)");

        let dongs = by_column(&refs, &set.column(table, Concept::Location));
        let names: Vec<_> = dongs.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(names, ["삼성동", "역삼동"]);
    }

    #[test]
    fn value_counts_orders_by_frequency() {
        let set = RecordSet::new(vec![
            rec(Some("B"), "2000", "50"),
            rec(Some("A"), "2000", "50"),
            rec(Some("B"), "2000", "50"),
            rec(Some("  "), "2000", "50"),
        ]);
        let table = field_table(AssetType::Apartment);
        let derived = set.derive(table, Concept::Price);
        let refs: Vec<_> = derived.iter().collect();
        let counts = value_counts(&refs, &set.column(table, Concept::Location));
        assert_eq!(counts, vec![("B".to_string(), 2), ("A".to_string(), 1)]);
    }
}
