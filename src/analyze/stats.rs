// src/analyze/stats.rs
//! Descriptive statistics over cleaned value series.
//!
//! Every function takes values in flattening order. Selections that can tie
//! (max, min, closest-to-x) keep the first occurrence.

/// count / sum / mean / median / max / min of a non-empty series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
}

pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    let mean = sum / values.len() as f64;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    Some(Summary {
        count: values.len(),
        sum,
        mean,
        median: median(values)?,
        max,
        min,
    })
}

/// Middle value; mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Index of the first value whose `score` is strictly better than every
/// earlier one, i.e. ties resolve to the earliest index.
fn first_best(values: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().copied().enumerate() {
        match best {
            Some((_, b)) if !better(v, b) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn index_of_max(values: &[f64]) -> Option<usize> {
    first_best(values, |v, b| v > b)
}

pub fn index_of_min(values: &[f64]) -> Option<usize> {
    first_best(values, |v, b| v < b)
}

pub fn index_closest_to(values: &[f64], target: f64) -> Option<usize> {
    let distances: Vec<f64> = values.iter().map(|v| (v - target).abs()).collect();
    first_best(&distances, |d, b| d < b)
}

/// Positions (into the series) of the four representative records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Representatives {
    pub highest: usize,
    pub lowest: usize,
    pub closest_to_mean: usize,
    pub closest_to_median: usize,
}

pub fn representatives(values: &[f64]) -> Option<Representatives> {
    let s = summarize(values)?;
    Some(Representatives {
        highest: index_of_max(values)?,
        lowest: index_of_min(values)?,
        closest_to_mean: index_closest_to(values, s.mean)?,
        closest_to_median: index_closest_to(values, s.median)?,
    })
}
