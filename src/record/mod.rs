// src/record/mod.rs
//! Flat transaction records and the typed view derived from them.
//!
//! `RawRecord` is one upstream `<item>` flattened to (tag, text) pairs, kept
//! in received order. `RecordSet` is every record for one
//! (dataset, region, month) key and is what the raw cache stores, one JSON
//! object per line. `TransactionRecord` is the numeric view used by the
//! aggregator; it borrows the raw record and never mutates it.

pub mod coerce;
pub mod resolve;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::record::coerce::{to_number, to_whole};
use crate::record::resolve::{Column, Concept, FieldTable};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, Option<String>)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A repeated tag keeps its first position and the last value.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// `None` when the key is absent, `Some(None)` when present but null.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, v)| {
                let v = v.as_ref().map_or(Value::Null, |s| Value::String(s.clone()));
                (k.clone(), v)
            })
            .collect()
    }

    /// Tolerant of hand-edited caches: numbers and booleans become their text.
    pub fn from_json(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                };
                (k, v)
            })
            .collect();
        Self { fields }
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut r = RawRecord::new();
        for (k, v) in iter {
            r.insert(k, v);
        }
        r
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(RawRecord::from_json(map)),
            other => Err(D::Error::custom(format!(
                "expected a JSON object per record, got {other}"
            ))),
        }
    }
}

/// All records for one (dataset, region, month) key, in received order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: Vec<RawRecord>,
}

impl RecordSet {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, table: &FieldTable, concept: Concept) -> Column {
        if !table.has(concept) {
            return Column::missing();
        }
        Column::resolve(&self.records, table.candidates(concept))
    }

    /// Newline-delimited JSON, one object per record, trailing newline.
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for r in &self.records {
            out.push_str(&serde_json::to_string(r)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Blank lines are skipped.
    pub fn from_ndjson(s: &str) -> Result<Self, serde_json::Error> {
        let records = s
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str::<RawRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    /// Numeric view of every record, resolving each concept once for the
    /// whole set. `basis` picks the concept that plays the "price" role.
    pub fn derive(&self, table: &FieldTable, basis: Concept) -> Vec<TransactionRecord<'_>> {
        let price = self.column(table, basis);
        let area = self.column(table, Concept::Area);
        let build_year = self.column(table, Concept::BuildYear);
        let rent = self.column(table, Concept::MonthlyRent);
        let year = self.column(table, Concept::DealYear);
        let month = self.column(table, Concept::DealMonth);
        let day = self.column(table, Concept::DealDay);
        let date_keys: Vec<&'static str> = [Concept::DealYear, Concept::DealMonth, Concept::DealDay]
            .iter()
            .flat_map(|c| table.candidates(*c).iter().copied())
            .collect();

        self.records
            .iter()
            .enumerate()
            .map(|(position, raw)| TransactionRecord {
                raw,
                position,
                deal_amount: to_number(price.get(raw)),
                area: to_number(area.get(raw)),
                build_year: to_number(build_year.get(raw)),
                monthly_rent: to_number(rent.get(raw)),
                deal_date: deal_date(
                    to_whole(year.get(raw)),
                    to_whole(month.get(raw)),
                    to_whole(day.get(raw)),
                ),
                date_keys: date_keys.clone(),
            })
            .collect()
    }
}

fn deal_date(year: Option<i64>, month: Option<i64>, day: Option<i64>) -> Option<String> {
    let y = year?;
    Some(match (month, day) {
        (Some(m), Some(d)) => format!("{y}-{m:02}-{d:02}"),
        (Some(m), None) => format!("{y}-{m:02}"),
        _ => y.to_string(),
    })
}

/// Typed view over one raw record.
#[derive(Debug, Clone)]
pub struct TransactionRecord<'a> {
    pub raw: &'a RawRecord,
    /// Position in flattening order; tie-breaks depend on it.
    pub position: usize,
    /// Price basis in 10,000-won units (sale price or lease deposit).
    pub deal_amount: Option<f64>,
    pub area: Option<f64>,
    pub build_year: Option<f64>,
    pub monthly_rent: Option<f64>,
    pub deal_date: Option<String>,
    date_keys: Vec<&'static str>,
}

impl<'a> TransactionRecord<'a> {
    /// Price and a strictly positive area are both required.
    pub fn is_valid(&self) -> bool {
        self.deal_amount.is_some() && self.area.is_some_and(|a| a > 0.0)
    }

    /// Raw fields with the year/month/day keys folded into `dealDate`.
    pub fn display(&self) -> Value {
        let mut map: Map<String, Value> = self
            .raw
            .to_json()
            .into_iter()
            .filter(|(k, _)| !self.date_keys.iter().any(|d| *d == k.as_str()))
            .collect();
        map.insert(
            "dealDate".to_string(),
            self.deal_date.clone().map_or(Value::Null, Value::String),
        );
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AssetType;
    use crate::record::resolve::field_table;

    fn apt(amount: &str, area: &str) -> RawRecord {
        [
            ("aptNm", Some("래미안".to_string())),
            ("dealAmount", Some(amount.to_string())),
            ("excluUseAr", Some(area.to_string())),
            ("dealYear", Some("2025".to_string())),
            ("dealMonth", Some("6".to_string())),
            ("dealDay", Some("3".to_string())),
            ("floor", None),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn ndjson_preserves_order_and_nulls() {
        let set = RecordSet::new(vec![apt("10,000", "59.9"), apt("20,000", "84.9")]);
        let text = set.to_ndjson().unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().unwrap().starts_with(r#"{"aptNm":"래미안","dealAmount":"10,000""#));
        assert!(text.contains(r#""floor":null"#));

        let back = RecordSet::from_ndjson(&format!("{text}\n\n")).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn ndjson_accepts_numbers_as_text() {
        let set = RecordSet::from_ndjson(r#"{"dealAmount": 5000, "excluUseAr": 84.5}"#).unwrap();
        assert_eq!(set.records()[0].get("dealAmount"), Some(Some("5000")));
        assert!(RecordSet::from_ndjson("[1,2]").is_err());
    }

    #[test]
    fn derive_coerces_and_validates() {
        let set = RecordSet::new(vec![apt("10,000", "59.9"), apt("x", "84.9"), apt("500", "0")]);
        let derived = set.derive(field_table(AssetType::Apartment), Concept::Price);
        assert_eq!(derived[0].deal_amount, Some(10_000.0));
        assert_eq!(derived[0].deal_date.as_deref(), Some("2025-06-03"));
        assert!(derived[0].is_valid());
        assert!(!derived[1].is_valid());
        assert!(!derived[2].is_valid());
        assert_eq!(derived[2].position, 2);
    }

    #[test]
    fn display_folds_date_parts() {
        let set = RecordSet::new(vec![apt("10,000", "59.9")]);
        let derived = set.derive(field_table(AssetType::Apartment), Concept::Price);
        let shown = derived[0].display();
        assert_eq!(shown["dealDate"], "2025-06-03");
        assert!(shown.get("dealYear").is_none());
        assert_eq!(shown["aptNm"], "래미안");
        assert!(shown["floor"].is_null());
    }

    #[test]
    fn deal_date_without_year_is_null() {
        assert_eq!(deal_date(None, Some(1), Some(2)), None);
        assert_eq!(deal_date(Some(2024), Some(12), None).as_deref(), Some("2024-12"));
    }
}
