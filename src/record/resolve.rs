// src/record/resolve.rs
//! Field resolution: one logical concept (price, area, build year, ...) maps
//! to an ordered list of upstream key names, because API vintages use Korean
//! names, English names or abbreviated codes for the same column.
//!
//! All fallback orders live in the per-asset tables at the bottom of this
//! file; nothing else in the crate spells out upstream key names.

use crate::dataset::AssetType;
use crate::record::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concept {
    Price,
    Deposit,
    MonthlyRent,
    Area,
    BuildYear,
    Floor,
    DealYear,
    DealMonth,
    DealDay,
    Location,
    Complex,
    PropertyType,
    Zoning,
}

/// Ordered candidate lists per concept for one asset type.
#[derive(Debug)]
pub struct FieldTable {
    entries: &'static [(Concept, &'static [&'static str])],
}

impl FieldTable {
    /// Candidate names for a concept; empty when the asset type never carries it.
    pub fn candidates(&self, concept: Concept) -> &'static [&'static str] {
        self.entries
            .iter()
            .find(|(c, _)| *c == concept)
            .map(|(_, names)| *names)
            .unwrap_or(&[])
    }

    pub fn has(&self, concept: Concept) -> bool {
        !self.candidates(concept).is_empty()
    }
}

/// Value of the first candidate present as a key in `record`.
///
/// A key that is present with a null value still wins: resolution does not
/// fall through to later candidates on null.
pub fn resolve<'a>(record: &'a RawRecord, candidates: &[&str]) -> Option<&'a str> {
    candidates
        .iter()
        .find_map(|name| record.get(name))
        .flatten()
}

/// A concept resolved against a whole record set: the first candidate that
/// appears as a key in any record. A column with no key is the all-missing
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    key: Option<String>,
}

impl Column {
    pub fn resolve(records: &[RawRecord], candidates: &[&str]) -> Self {
        let key = candidates
            .iter()
            .find(|name| records.iter().any(|r| r.contains_key(name)))
            .map(|name| name.to_string());
        Self { key }
    }

    pub fn missing() -> Self {
        Self { key: None }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_missing(&self) -> bool {
        self.key.is_none()
    }

    pub fn get<'r>(&self, record: &'r RawRecord) -> Option<&'r str> {
        self.key.as_deref().and_then(|k| record.get(k)).flatten()
    }
}

const PRICE: &[&str] = &["거래금액", "dealAmount"];
const DEPOSIT: &[&str] = &["보증금액", "보증금", "deposit", "depositNum"];
const MONTHLY_RENT: &[&str] = &["월세금액", "월세액", "월세", "monthlyRent", "rentFeeNum"];
const EXCLUSIVE_AREA: &[&str] = &["전용면적", "area", "excluUseAr", "areaNum"];
const BUILD_YEAR: &[&str] = &["건축년도", "buildYear", "buildYearNum"];
const FLOOR: &[&str] = &["층", "floor"];
const DEAL_YEAR: &[&str] = &["년", "dealYear"];
const DEAL_MONTH: &[&str] = &["월", "dealMonth"];
const DEAL_DAY: &[&str] = &["일", "dealDay"];
const LOCATION: &[&str] = &["법정동", "법정동읍면동명", "umdNm", "dong"];

static APARTMENT: FieldTable = FieldTable {
    entries: &[
        (Concept::Price, PRICE),
        (Concept::Deposit, DEPOSIT),
        (Concept::MonthlyRent, MONTHLY_RENT),
        (Concept::Area, EXCLUSIVE_AREA),
        (Concept::BuildYear, BUILD_YEAR),
        (Concept::Floor, FLOOR),
        (Concept::DealYear, DEAL_YEAR),
        (Concept::DealMonth, DEAL_MONTH),
        (Concept::DealDay, DEAL_DAY),
        (Concept::Location, LOCATION),
        (Concept::Complex, &["아파트", "단지명", "aptNm", "aptName"]),
    ],
};

static OFFICETEL: FieldTable = FieldTable {
    entries: &[
        (Concept::Price, PRICE),
        (Concept::Deposit, DEPOSIT),
        (Concept::MonthlyRent, MONTHLY_RENT),
        (Concept::Area, EXCLUSIVE_AREA),
        (Concept::BuildYear, BUILD_YEAR),
        (Concept::Floor, FLOOR),
        (Concept::DealYear, DEAL_YEAR),
        (Concept::DealMonth, DEAL_MONTH),
        (Concept::DealDay, DEAL_DAY),
        (Concept::Location, LOCATION),
        (Concept::Complex, &["오피스텔", "오피스텔명", "단지", "offiNm", "officetelName"]),
    ],
};

static ROW_HOUSE: FieldTable = FieldTable {
    entries: &[
        (Concept::Price, PRICE),
        (Concept::Deposit, DEPOSIT),
        (Concept::MonthlyRent, MONTHLY_RENT),
        (Concept::Area, &["전용면적", "excluUseAr", "area"]),
        (Concept::BuildYear, BUILD_YEAR),
        (Concept::Floor, FLOOR),
        (Concept::DealYear, DEAL_YEAR),
        (Concept::DealMonth, DEAL_MONTH),
        (Concept::DealDay, DEAL_DAY),
        (Concept::Location, LOCATION),
        (Concept::Complex, &["연립다세대", "mhouseNm"]),
        (Concept::PropertyType, &["주택유형", "houseType"]),
    ],
};

static SINGLE_DETACHED: FieldTable = FieldTable {
    entries: &[
        (Concept::Price, PRICE),
        (Concept::Deposit, DEPOSIT),
        (Concept::MonthlyRent, MONTHLY_RENT),
        (Concept::Area, &["연면적", "totalFloorAr", "YUA", "계약면적", "contractArea"]),
        (Concept::BuildYear, BUILD_YEAR),
        (Concept::DealYear, DEAL_YEAR),
        (Concept::DealMonth, DEAL_MONTH),
        (Concept::DealDay, DEAL_DAY),
        (Concept::Location, LOCATION),
        (Concept::PropertyType, &["주택유형", "houseType"]),
    ],
};

static COMMERCIAL: FieldTable = FieldTable {
    entries: &[
        (Concept::Price, PRICE),
        (Concept::Area, &["전용면적", "area", "excluUseAr", "buildingAr"]),
        (Concept::BuildYear, BUILD_YEAR),
        (Concept::Floor, FLOOR),
        (Concept::DealYear, DEAL_YEAR),
        (Concept::DealMonth, DEAL_MONTH),
        (Concept::DealDay, DEAL_DAY),
        (Concept::Location, LOCATION),
        (Concept::PropertyType, &["주용도", "유형", "buildingUse"]),
        (Concept::Zoning, &["용도지역", "landUse"]),
    ],
};

static LAND: FieldTable = FieldTable {
    entries: &[
        (Concept::Price, PRICE),
        (Concept::Area, &["거래면적", "dealArea"]),
        (Concept::DealYear, DEAL_YEAR),
        (Concept::DealMonth, DEAL_MONTH),
        (Concept::DealDay, DEAL_DAY),
        (Concept::Location, LOCATION),
        (Concept::PropertyType, &["지목", "jimok"]),
        (Concept::Zoning, &["용도지역", "landUse"]),
    ],
};

static INDUSTRIAL: FieldTable = FieldTable {
    entries: &[
        (Concept::Price, PRICE),
        (Concept::Area, &["전용면적", "buildingAr", "area"]),
        (Concept::BuildYear, BUILD_YEAR),
        (Concept::Floor, FLOOR),
        (Concept::DealYear, DEAL_YEAR),
        (Concept::DealMonth, DEAL_MONTH),
        (Concept::DealDay, DEAL_DAY),
        (Concept::Location, LOCATION),
        (Concept::PropertyType, &["건물주용도", "주용도", "buildingUse"]),
        (Concept::Zoning, &["용도지역", "landUse"]),
    ],
};

pub fn field_table(asset: AssetType) -> &'static FieldTable {
    match asset {
        AssetType::Apartment => &APARTMENT,
        AssetType::Officetel => &OFFICETEL,
        AssetType::RowHouse => &ROW_HOUSE,
        AssetType::SingleDetached => &SINGLE_DETACHED,
        AssetType::Commercial => &COMMERCIAL,
        AssetType::Land => &LAND,
        AssetType::Industrial => &INDUSTRIAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, Option<&str>)]) -> RawRecord {
        let mut r = RawRecord::new();
        for (k, v) in pairs {
            r.insert(*k, v.map(str::to_string));
        }
        r
    }

    #[test]
    fn first_listed_candidate_wins_when_both_present() {
        let r = rec(&[("dealAmount", Some("2")), ("거래금액", Some("1"))]);
        assert_eq!(resolve(&r, PRICE), Some("1"));
        assert_eq!(resolve(&r, &["dealAmount", "거래금액"]), Some("2"));
    }

    #[test]
    fn falls_back_in_order_and_misses_cleanly() {
        let r = rec(&[("excluUseAr", Some("84.9"))]);
        assert_eq!(resolve(&r, EXCLUSIVE_AREA), Some("84.9"));
        assert_eq!(resolve(&r, BUILD_YEAR), None);
        assert_eq!(resolve(&r, &[]), None);
    }

    #[test]
    fn present_null_does_not_fall_through() {
        let r = rec(&[("거래금액", None), ("dealAmount", Some("9"))]);
        assert_eq!(resolve(&r, PRICE), None);
    }

    #[test]
    fn column_is_chosen_across_the_set() {
        let a = rec(&[("umdNm", Some("역삼동"))]);
        let b = rec(&[("법정동", Some("삼성동"))]);
        let set = vec![a, b];
        let col = Column::resolve(&set, LOCATION);
        assert_eq!(col.key(), Some("법정동"));
        assert_eq!(col.get(&set[0]), None);
        assert_eq!(col.get(&set[1]), Some("삼성동"));

        let none = Column::resolve(&set, &["nothing"]);
        assert!(none.is_missing());
        assert!(set.iter().all(|r| none.get(r).is_none()));
    }

    #[test]
    fn every_table_knows_price_and_area() {
        for asset in AssetType::ALL {
            let t = field_table(asset);
            assert!(t.has(Concept::Price), "{asset} lacks price");
            assert!(t.has(Concept::Area), "{asset} lacks area");
            assert!(t.has(Concept::Location), "{asset} lacks location");
        }
        assert!(!field_table(AssetType::Land).has(Concept::MonthlyRent));
    }
}
