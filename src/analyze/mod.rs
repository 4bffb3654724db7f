// src/analyze/mod.rs
//! Grouped aggregation and report assembly.
//!
//! `analyze` turns one raw `RecordSet` into the JSON report returned by the
//! `analyze_*` tools. Sale datasets get a single price report; lease datasets
//! are split into jeonse (zero monthly rent) and wolse (positive monthly rent)
//! and each partition gets its own report on the deposit basis.

pub mod format;
pub mod group;
pub mod profile;
pub mod stats;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};

use crate::analyze::format::{per_pyeong, tagged, UnitKind};
use crate::analyze::group::{by_area, by_building_age, by_column, value_counts, Groups};
use crate::analyze::profile::{profile, Grouping, Profile};
use crate::analyze::stats::{representatives, summarize};
use crate::dataset::Dataset;
use crate::record::resolve::{field_table, Column, Concept, FieldTable};
use crate::record::{RecordSet, TransactionRecord};

pub const NO_DATA: &str = "No data to analyze.";
pub const NO_VALID_DATA: &str = "No valid transaction data after cleaning.";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("analyze_reports_total", "Reports computed from raw record sets.");
        describe_counter!(
            "analyze_no_data_total",
            "Reports that ended in a no-data result."
        );
        describe_counter!(
            "analyze_dropped_records_total",
            "Records dropped during cleaning (missing price, area or rent)."
        );
    });
}

/// Explicit "ran, found nothing" marker.
pub fn no_data(message: &str) -> Value {
    counter!("analyze_no_data_total").increment(1);
    json!({ "status": "no_data", "error": message })
}

/// True for a result produced by [`no_data`].
pub fn is_no_data(v: &Value) -> bool {
    v.get("status").and_then(Value::as_str) == Some("no_data")
}

/// Shared inputs for one report.
struct Ctx<'s> {
    set: &'s RecordSet,
    table: &'static FieldTable,
    profile: &'static Profile,
    current_year: i32,
}

impl Ctx<'_> {
    fn column(&self, concept: Concept) -> Column {
        self.set.column(self.table, concept)
    }
}

pub fn analyze(set: &RecordSet, dataset: Dataset, current_year: i32) -> Value {
    ensure_metrics_described();
    if set.is_empty() {
        return no_data(NO_DATA);
    }
    let ctx = Ctx {
        set,
        table: field_table(dataset.asset),
        profile: profile(dataset.asset),
        current_year,
    };
    let out = if dataset.is_lease() {
        lease_report(&ctx)
    } else {
        trade_report(&ctx)
    };
    counter!("analyze_reports_total").increment(1);
    tracing::debug!(target: "analyze", %dataset, records = set.len(), no_data = is_no_data(&out), "report computed");
    out
}

fn trade_report(ctx: &Ctx<'_>) -> Value {
    let derived = ctx.set.derive(ctx.table, Concept::Price);
    let cleaned: Vec<&TransactionRecord<'_>> = derived.iter().filter(|r| r.is_valid()).collect();
    counter!("analyze_dropped_records_total").increment((derived.len() - cleaned.len()) as u64);
    if cleaned.is_empty() {
        return no_data(NO_VALID_DATA);
    }
    let mut report = price_report(ctx, &cleaned);
    report.insert("notes".into(), Value::String(ctx.profile.notes.to_string()));
    Value::Object(report)
}

fn lease_report(ctx: &Ctx<'_>) -> Value {
    let derived = ctx.set.derive(ctx.table, Concept::Deposit);
    let cleaned: Vec<&TransactionRecord<'_>> = derived
        .iter()
        .filter(|r| r.is_valid() && r.monthly_rent.is_some_and(|m| m >= 0.0))
        .collect();
    counter!("analyze_dropped_records_total").increment((derived.len() - cleaned.len()) as u64);
    if cleaned.is_empty() {
        return no_data(NO_VALID_DATA);
    }

    let (jeonse, wolse): (Vec<_>, Vec<_>) = cleaned
        .iter()
        .copied()
        .partition(|r| r.monthly_rent == Some(0.0));

    let notes = format!(
        "Statistics are separated by transaction type (jeonse: no monthly rent, wolse: deposit plus monthly rent). Price figures are lease deposits. {}",
        ctx.profile.notes
    );
    json!({
        "overallStatistics": {
            "totalTransactionCount": cleaned.len(),
            "transactionTypeDistribution": {
                "jeonseCount": jeonse.len(),
                "wolseCount": wolse.len(),
            },
        },
        "jeonseAnalysis": partition_report(ctx, &jeonse, false),
        "wolseAnalysis": partition_report(ctx, &wolse, true),
        "notes": notes,
    })
}

fn partition_report(ctx: &Ctx<'_>, records: &[&TransactionRecord<'_>], with_rent: bool) -> Value {
    if records.is_empty() {
        return json!({ "transactionCount": 0 });
    }
    let mut out = Map::new();
    out.insert("priceBasis".into(), Value::String("deposit".into()));
    out.extend(price_report(ctx, records));
    if with_rent {
        let rents: Vec<f64> = records.iter().filter_map(|r| r.monthly_rent).collect();
        if let Some(s) = summarize(&rents) {
            out.insert(
                "monthlyRentStatistics".into(),
                json!({
                    "averageMonthlyRent": tagged(Some(s.mean), UnitKind::Price),
                    "medianMonthlyRent": tagged(Some(s.median), UnitKind::Price),
                    "highestMonthlyRent": tagged(Some(s.max), UnitKind::Price),
                    "lowestMonthlyRent": tagged(Some(s.min), UnitKind::Price),
                }),
            );
        }
    }
    Value::Object(out)
}

/// Prices in flattening order. Cleaned records always carry a price, so the
/// result lines up index-for-index with `records`.
fn prices(records: &[&TransactionRecord<'_>]) -> Vec<f64> {
    records.iter().filter_map(|r| r.deal_amount).collect()
}

fn unit_prices(records: &[&TransactionRecord<'_>]) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| Some(per_pyeong(r.deal_amount?, r.area?)))
        .collect()
}

/// Sections shared by every non-empty report: overall, price level,
/// price per area and the profile's grouped sections.
fn price_report(ctx: &Ctx<'_>, records: &[&TransactionRecord<'_>]) -> Map<String, Value> {
    let values = prices(records);
    let per_area = unit_prices(records);
    let price = summarize(&values);
    let ppa = summarize(&per_area);
    let property_type = ctx.column(Concept::PropertyType);
    let by_type = by_column(records, &property_type);

    let mut overall = Map::new();
    overall.insert("totalTransactionCount".into(), json!(records.len()));
    overall.insert(
        "totalTransactionValue".into(),
        tagged(price.map(|s| s.sum), UnitKind::Price),
    );
    if !by_type.is_empty() {
        let dist: Map<String, Value> = value_counts(records, &property_type)
            .into_iter()
            .map(|(k, n)| (k, json!(n)))
            .collect();
        overall.insert("transactionDistributionByPropertyType".into(), Value::Object(dist));
    }

    let mut level = Map::new();
    level.insert("overallAveragePrice".into(), tagged(price.map(|s| s.mean), UnitKind::Price));
    level.insert("overallMedianPrice".into(), tagged(price.map(|s| s.median), UnitKind::Price));
    level.insert("overallHighestPrice".into(), tagged(price.map(|s| s.max), UnitKind::Price));
    level.insert("overallLowestPrice".into(), tagged(price.map(|s| s.min), UnitKind::Price));
    if let Some(rep) = representatives(&values) {
        let show = |i: usize| records.get(i).map_or(Value::Null, |r| r.display());
        level.insert(
            "representativeDeals".into(),
            json!({
                "highestPriceDeal": show(rep.highest),
                "lowestPriceDeal": show(rep.lowest),
                "dealClosestToAverage": show(rep.closest_to_mean),
                "dealClosestToMedian": show(rep.closest_to_median),
            }),
        );
    }
    if !by_type.is_empty() {
        level.insert("priceStatisticsByPropertyType".into(), price_by_group(&by_type));
    }

    let mut per_area_section = Map::new();
    per_area_section.insert("areaBasis".into(), json!(ctx.profile.area_basis));
    per_area_section.insert(
        "overallAveragePricePerPyeong".into(),
        tagged(ppa.map(|s| s.mean), UnitKind::PricePerPyeong),
    );
    per_area_section.insert(
        "overallMedianPricePerPyeong".into(),
        tagged(ppa.map(|s| s.median), UnitKind::PricePerPyeong),
    );
    if !by_type.is_empty() {
        per_area_section.insert(
            "pricePerPyeongStatisticsByPropertyType".into(),
            per_area_by_group(&by_type),
        );
    }

    let mut report = Map::new();
    report.insert("overallStatistics".into(), Value::Object(overall));
    report.insert("priceLevelStatistics".into(), Value::Object(level));
    report.insert("pricePerAreaStatistics".into(), Value::Object(per_area_section));
    for section in ctx.profile.sections {
        let groups = match section.by {
            Grouping::Field(concept) => by_column(records, &ctx.column(concept)),
            Grouping::BuildingAge => by_building_age(records, ctx.current_year),
            Grouping::AreaScale => by_area(records),
        };
        report.insert(section.name.into(), group_summaries(&groups));
    }
    report
}

/// One `GroupSummary` per non-empty group.
fn group_summaries(groups: &Groups<'_, '_>) -> Value {
    let out: Map<String, Value> = groups
        .iter()
        .map(|(key, rs)| {
            let p = summarize(&prices(rs));
            let u = summarize(&unit_prices(rs));
            let summary = json!({
                "transactionCount": rs.len(),
                "averagePrice": tagged(p.map(|s| s.mean), UnitKind::Price),
                "medianPrice": tagged(p.map(|s| s.median), UnitKind::Price),
                "highestPrice": tagged(p.map(|s| s.max), UnitKind::Price),
                "lowestPrice": tagged(p.map(|s| s.min), UnitKind::Price),
                "averagePricePerPyeong": tagged(u.map(|s| s.mean), UnitKind::PricePerPyeong),
                "medianPricePerPyeong": tagged(u.map(|s| s.median), UnitKind::PricePerPyeong),
            });
            (key.clone(), summary)
        })
        .collect();
    Value::Object(out)
}

fn price_by_group(groups: &Groups<'_, '_>) -> Value {
    let out: Map<String, Value> = groups
        .iter()
        .map(|(key, rs)| {
            let p = summarize(&prices(rs));
            let v = json!({
                "transactionCount": rs.len(),
                "averagePrice": tagged(p.map(|s| s.mean), UnitKind::Price),
                "medianPrice": tagged(p.map(|s| s.median), UnitKind::Price),
                "highestPrice": tagged(p.map(|s| s.max), UnitKind::Price),
                "lowestPrice": tagged(p.map(|s| s.min), UnitKind::Price),
            });
            (key.clone(), v)
        })
        .collect();
    Value::Object(out)
}

fn per_area_by_group(groups: &Groups<'_, '_>) -> Value {
    let out: Map<String, Value> = groups
        .iter()
        .map(|(key, rs)| {
            let u = summarize(&unit_prices(rs));
            let v = json!({
                "averagePricePerPyeong": tagged(u.map(|s| s.mean), UnitKind::PricePerPyeong),
                "medianPricePerPyeong": tagged(u.map(|s| s.median), UnitKind::PricePerPyeong),
            });
            (key.clone(), v)
        })
        .collect();
    Value::Object(out)
}
