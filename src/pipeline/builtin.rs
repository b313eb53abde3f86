//! Built-in phases: a small profile of the table, missing cells per column,
//! summary statistics of numeric columns, IQR outliers, and pairwise Pearson
//! correlations.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::dataset::Table;
use crate::error::{PhaseError, PipelineError};
use crate::pipeline::{Pipeline, PriorResults};

/// Correlations at or below this magnitude are left out of `high_correlations`.
const CORRELATION_THRESHOLD: f64 = 0.3;

/// Fewest values a column needs before quartiles mean anything.
const MIN_OUTLIER_SAMPLE: usize = 4;

/// `profile` → `missing` → `stats` → `outliers` → `correlations`.
pub fn default_pipeline() -> Result<Pipeline, PipelineError> {
    Pipeline::builder()
        .phase_fn("profile", profile)
        .phase_fn("missing", missing)
        .phase_fn("stats", stats)
        .phase_fn("outliers", outliers)
        .phase_fn("correlations", correlations)
        .build()
}

fn profile(table: &Table, _prior: &PriorResults) -> Result<Value, PhaseError> {
    if table.column_count() == 0 {
        return Err(PhaseError::Failed("dataset has no columns".to_string()));
    }

    let mut seen = HashSet::new();
    let duplicates = table.rows.iter().filter(|row| !seen.insert(*row)).count();

    Ok(json!({
        "rows": table.row_count(),
        "columns": table.column_count(),
        "column_names": table.columns,
        "numeric_columns": numeric_columns(table),
        "duplicates": duplicates,
    }))
}

fn missing(table: &Table, _prior: &PriorResults) -> Result<Value, PhaseError> {
    let mut per_column = Map::new();
    let mut total = 0usize;

    for (index, name) in table.columns.iter().enumerate() {
        let count = table.column(index).filter(|cell| cell.is_empty()).count();
        total += count;
        per_column.insert(name.clone(), json!(count));
    }

    Ok(json!({
        "total": total,
        "by_column": per_column,
    }))
}

fn stats(table: &Table, prior: &PriorResults) -> Result<Value, PhaseError> {
    let mut columns = Map::new();
    for (name, index) in numeric_from_prior(table, prior)? {
        let values = numeric_values(table, index);
        if values.is_empty() {
            continue;
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        columns.insert(
            name,
            json!({ "count": count, "mean": mean, "min": min, "max": max }),
        );
    }

    Ok(json!({ "columns": columns }))
}

/// Tukey fences: values outside `[q1 - 1.5 iqr, q3 + 1.5 iqr]`.
fn outliers(table: &Table, prior: &PriorResults) -> Result<Value, PhaseError> {
    let mut columns = Map::new();
    let mut flagged = 0usize;

    for (name, index) in numeric_from_prior(table, prior)? {
        let mut values = numeric_values(table, index);
        if values.len() < MIN_OUTLIER_SAMPLE {
            continue;
        }
        values.sort_by(f64::total_cmp);

        let q1 = quantile(&values, 0.25);
        let q3 = quantile(&values, 0.75);
        let iqr = q3 - q1;
        let lower = q1 - 1.5 * iqr;
        let upper = q3 + 1.5 * iqr;

        let found: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| *v < lower || *v > upper)
            .collect();
        if !found.is_empty() {
            flagged += 1;
        }

        columns.insert(
            name,
            json!({
                "q1": q1,
                "q3": q3,
                "iqr": iqr,
                "lower_bound": lower,
                "upper_bound": upper,
                "outlier_count": found.len(),
                "outlier_percentage": round_to(100.0 * found.len() as f64 / values.len() as f64, 2),
                "min_outlier": found.first(),
                "max_outlier": found.last(),
            }),
        );
    }

    Ok(json!({
        "method": "iqr",
        "columns": columns,
        "columns_with_outliers": flagged,
    }))
}

/// Pearson correlation of every pair of numeric columns over the rows where
/// both cells are numbers. Pairs without variance are skipped.
fn correlations(table: &Table, prior: &PriorResults) -> Result<Value, PhaseError> {
    let numeric = numeric_from_prior(table, prior)?;
    let mut pairs = Vec::new();

    for (i, (left, left_index)) in numeric.iter().enumerate() {
        for (right, right_index) in &numeric[i + 1..] {
            let samples: Vec<(f64, f64)> = table
                .column(*left_index)
                .zip(table.column(*right_index))
                .filter_map(|(a, b)| Some((a.parse::<f64>().ok()?, b.parse::<f64>().ok()?)))
                .collect();

            if let Some(r) = pearson(&samples) {
                let r = round_to(r, 4);
                pairs.push(json!({
                    "column1": left,
                    "column2": right,
                    "correlation": r,
                    "strength": strength(r),
                }));
            }
        }
    }

    let mut high: Vec<Value> = pairs
        .iter()
        .filter(|p| p["correlation"].as_f64().is_some_and(|r| r.abs() > CORRELATION_THRESHOLD))
        .cloned()
        .collect();
    high.sort_by(|a, b| {
        let a = a["correlation"].as_f64().unwrap_or(0.0).abs();
        let b = b["correlation"].as_f64().unwrap_or(0.0).abs();
        b.total_cmp(&a)
    });

    Ok(json!({
        "method": "pearson",
        "threshold": CORRELATION_THRESHOLD,
        "pairs": pairs,
        "high_correlations": high,
    }))
}

fn pearson(samples: &[(f64, f64)]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in samples {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

fn strength(r: f64) -> &'static str {
    match r.abs() {
        a if a >= 0.8 => "very strong",
        a if a >= 0.6 => "strong",
        a if a >= 0.4 => "moderate",
        a if a >= 0.2 => "weak",
        _ => "very weak",
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Numeric columns with their positions. Uses `profile`'s list when it ran,
/// otherwise detects them.
fn numeric_from_prior(
    table: &Table,
    prior: &PriorResults,
) -> Result<Vec<(String, usize)>, PhaseError> {
    let names: Vec<String> = match prior.get("profile").map(|p| &p["numeric_columns"]) {
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(|n| n.as_str().map(str::to_string))
            .collect(),
        _ => numeric_columns(table),
    };

    names
        .into_iter()
        .map(|name| match table.columns.iter().position(|c| *c == name) {
            Some(index) => Ok((name, index)),
            None => Err(PhaseError::Failed(format!("unknown column '{}'", name))),
        })
        .collect()
}

fn numeric_values(table: &Table, index: usize) -> Vec<f64> {
    table
        .column(index)
        .filter_map(|cell| cell.parse::<f64>().ok())
        .collect()
}

/// Columns whose non-empty cells all parse as numbers (and have at least one).
fn numeric_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            let mut cells = table.column(*index).filter(|c| !c.is_empty()).peekable();
            cells.peek().is_some() && cells.all(|c| c.parse::<f64>().is_ok())
        })
        .map(|(_, name)| name.clone())
        .collect()
}
