// src/query/aggregate.rs
//
// Count / sum / average with optional one-column group-by. Absent values
// never enter arithmetic: each aggregation skips them and reports the
// skipped count as a caveat. An aggregation over an all-absent column
// returns a zero result with a caveat instead of an error.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::table::{Table, Value};

#[derive(Debug, Clone)]
pub enum MetricKind {
    Count,
    /// Sum of the named numeric column.
    Sum(String),
    /// Average of the named numeric column.
    Average(String),
}

impl MetricKind {
    fn label(&self) -> &'static str {
        match self {
            MetricKind::Count => "count",
            MetricKind::Sum(_) => "sum",
            MetricKind::Average(_) => "average",
        }
    }

    fn column(&self) -> Option<&str> {
        match self {
            MetricKind::Count => None,
            MetricKind::Sum(c) | MetricKind::Average(c) => Some(c),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Number(f64),
    Text(String),
    Breakdown(Vec<GroupSlice>),
}

/// One group of a breakdown: aggregated value plus the number of rows that
/// actually contributed to it.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSlice {
    pub key: String,
    pub value: f64,
    pub contributing: u64,
}

/// Named metrics plus caveats describing which of them were computed over
/// incomplete data. The narration layer phrases these; it never invents
/// numbers of its own.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricResult {
    pub metrics: BTreeMap<String, MetricValue>,
    pub caveats: Vec<String>,
}

impl MetricResult {
    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) {
        self.metrics.insert(name.into(), value);
    }

    pub fn caveat(&mut self, text: impl Into<String>) {
        self.caveats.push(text.into());
    }

    /// Fold another result in, prefixing its metric names.
    pub fn merge(&mut self, prefix: &str, other: MetricResult) {
        for (name, value) in other.metrics {
            self.metrics.insert(format!("{}.{}", prefix, name), value);
        }
        self.caveats.extend(other.caveats);
    }
}

pub const UNKNOWN_GROUP: &str = "(unknown)";

/// Aggregate a table, optionally grouped by one categorical column. Group
/// keys from sector/status-like columns compare case-insensitively; absent
/// group values land in the "(unknown)" bucket so the breakdown always
/// partitions the input exactly.
pub fn aggregate(table: &Table, kind: &MetricKind, group_by: Option<&str>) -> MetricResult {
    let mut result = MetricResult::default();

    let value_col = match kind.column() {
        Some(name) => match table.column_index(name) {
            Some(idx) => Some(idx),
            None => {
                result.insert(kind.label(), MetricValue::Number(0.0));
                result.caveat(format!("column '{}' not found; {} is 0", name, kind.label()));
                return result;
            }
        },
        None => None,
    };

    match group_by {
        None => aggregate_rows(table, kind, value_col, &mut result),
        Some(group_name) => {
            let group_col = match table.column_index(group_name) {
                Some(idx) => idx,
                None => {
                    result.caveat(format!(
                        "group column '{}' not found; breakdown is empty",
                        group_name
                    ));
                    result.insert("groups", MetricValue::Breakdown(Vec::new()));
                    return result;
                }
            };
            let fold_case = table.is_categorical(group_col);

            // lowercase key -> (display key, row indices); insertion order
            // kept for deterministic tie handling
            let mut groups: Vec<(String, String, Vec<usize>)> = Vec::new();
            for (idx, row) in table.rows().iter().enumerate() {
                let display = row[group_col]
                    .as_text()
                    .map(str::to_string)
                    .unwrap_or_else(|| UNKNOWN_GROUP.to_string());
                let key = if fold_case {
                    display.to_lowercase()
                } else {
                    display.clone()
                };
                match groups.iter_mut().find(|(k, _, _)| *k == key) {
                    Some((_, _, rows)) => rows.push(idx),
                    None => groups.push((key, display, vec![idx])),
                }
            }

            let mut slices = Vec::with_capacity(groups.len());
            let mut skipped_total = 0usize;
            for (_, display, row_idxs) in groups {
                let (value, contributing, skipped) =
                    fold_group(table, kind, value_col, &row_idxs);
                skipped_total += skipped;
                slices.push(GroupSlice {
                    key: display,
                    value,
                    contributing,
                });
            }
            if skipped_total > 0 {
                result.caveat(format!(
                    "{} of {} rows skipped across groups (value absent)",
                    skipped_total,
                    table.len()
                ));
            }

            // descending by value, ties by key; the unknown bucket goes last
            slices.sort_by(|a, b| {
                let a_unknown = a.key == UNKNOWN_GROUP;
                let b_unknown = b.key == UNKNOWN_GROUP;
                a_unknown
                    .cmp(&b_unknown)
                    .then(b.value.total_cmp(&a.value))
                    .then(a.key.cmp(&b.key))
            });

            result.insert("grouped_by", MetricValue::Text(group_name.to_string()));
            result.insert("groups", MetricValue::Breakdown(slices));
        }
    }

    result
}

fn aggregate_rows(
    table: &Table,
    kind: &MetricKind,
    value_col: Option<usize>,
    result: &mut MetricResult,
) {
    let all: Vec<usize> = (0..table.len()).collect();
    let (value, contributing, skipped) = fold_group(table, kind, value_col, &all);
    match kind {
        MetricKind::Count => result.insert("count", MetricValue::Count(contributing)),
        MetricKind::Sum(col) | MetricKind::Average(col) => {
            result.insert(kind.label(), MetricValue::Number(value));
            result.insert("contributing_rows", MetricValue::Count(contributing));
            if skipped > 0 {
                result.caveat(format!(
                    "{} of {} rows skipped for '{}' (value absent)",
                    skipped,
                    table.len(),
                    col
                ));
            }
            if contributing == 0 && !table.is_empty() {
                result.caveat(format!("no numeric values present in '{}'", col));
            }
        }
    }
}

/// Aggregate one set of rows. Returns (value, contributing rows, skipped rows).
fn fold_group(
    table: &Table,
    kind: &MetricKind,
    value_col: Option<usize>,
    rows: &[usize],
) -> (f64, u64, usize) {
    match kind {
        MetricKind::Count => (rows.len() as f64, rows.len() as u64, 0),
        MetricKind::Sum(_) | MetricKind::Average(_) => {
            let col = value_col.expect("numeric kinds carry a resolved column");
            let mut sum = 0.0;
            let mut n = 0u64;
            for &idx in rows {
                match table.value(idx, col).as_number() {
                    Some(v) => {
                        sum += v;
                        n += 1;
                    }
                    None => {}
                }
            }
            let skipped = rows.len() - n as usize;
            let value = match kind {
                MetricKind::Average(_) if n > 0 => sum / n as f64,
                MetricKind::Average(_) => 0.0,
                _ => sum,
            };
            (value, n, skipped)
        }
    }
}

/// Total/average/min/max over the detected revenue column, the way the
/// reporting layer summarizes a board's money column.
pub fn revenue_metrics(table: &Table) -> MetricResult {
    let mut result = MetricResult::default();
    let col = match table.revenue_column() {
        Some(idx) => idx,
        None => {
            result.caveat("no revenue column found".to_string());
            return result;
        }
    };
    let name = table.columns()[col].name.clone();

    let values: Vec<f64> = table.column_values(col).filter_map(Value::as_number).collect();
    result.insert("column_used", MetricValue::Text(name.clone()));
    if values.is_empty() {
        result.insert("total", MetricValue::Number(0.0));
        result.insert("contributing_rows", MetricValue::Count(0));
        result.caveat(format!("no numeric values present in '{}'", name));
        return result;
    }

    let total: f64 = values.iter().sum();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    result.insert("total", MetricValue::Number(total));
    result.insert(
        "average",
        MetricValue::Number(total / values.len() as f64),
    );
    result.insert("min", MetricValue::Number(min));
    result.insert("max", MetricValue::Number(max));
    result.insert("contributing_rows", MetricValue::Count(values.len() as u64));

    let skipped = table.len() - values.len();
    if skipped > 0 {
        result.caveat(format!(
            "{} of {} rows skipped for '{}' (value absent)",
            skipped,
            table.len(),
            name
        ));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnDef, ColumnKind};

    fn work_orders() -> Table {
        let mut t = Table::new(vec![
            ColumnDef::new("Item Name", ColumnKind::Text),
            ColumnDef::new("Sector", ColumnKind::Status),
            ColumnDef::new("Amount", ColumnKind::Number),
        ]);
        t.push_row(vec![
            Value::Text("WO-1".into()),
            Value::Status("Mining".into()),
            Value::Number(100.0),
        ]);
        t.push_row(vec![
            Value::Text("WO-2".into()),
            Value::Status("mining".into()),
            Value::Number(50.0),
        ]);
        t.push_row(vec![
            Value::Text("WO-3".into()),
            Value::Status("Urban".into()),
            Value::Absent,
        ]);
        t.push_row(vec![
            Value::Text("WO-4".into()),
            Value::Absent,
            Value::Number(25.0),
        ]);
        t
    }

    fn breakdown(result: &MetricResult) -> &[GroupSlice] {
        match result.metrics.get("groups") {
            Some(MetricValue::Breakdown(slices)) => slices,
            other => panic!("expected breakdown, got {:?}", other),
        }
    }

    #[test]
    fn sum_skips_absent_and_reports_the_skip() {
        let t = work_orders();
        let r = aggregate(&t, &MetricKind::Sum("Amount".into()), None);
        assert!(matches!(
            r.metrics.get("sum"),
            Some(MetricValue::Number(v)) if *v == 175.0
        ));
        assert!(matches!(
            r.metrics.get("contributing_rows"),
            Some(MetricValue::Count(3))
        ));
        assert_eq!(r.caveats.len(), 1);
        assert!(r.caveats[0].contains("1 of 4"));
    }

    #[test]
    fn average_over_all_absent_is_zero_with_caveat() {
        let mut t = Table::new(vec![ColumnDef::new("Amount", ColumnKind::Number)]);
        t.push_row(vec![Value::Absent]);
        t.push_row(vec![Value::Absent]);
        let r = aggregate(&t, &MetricKind::Average("Amount".into()), None);
        assert!(matches!(
            r.metrics.get("average"),
            Some(MetricValue::Number(v)) if *v == 0.0
        ));
        assert!(r.caveats.iter().any(|c| c.contains("no numeric values")));
    }

    #[test]
    fn missing_column_is_zero_with_caveat() {
        let t = work_orders();
        let r = aggregate(&t, &MetricKind::Sum("Nope".into()), None);
        assert!(matches!(
            r.metrics.get("sum"),
            Some(MetricValue::Number(v)) if *v == 0.0
        ));
        assert!(r.caveats[0].contains("'Nope'"));
    }

    #[test]
    fn group_by_partitions_exactly_with_unknown_bucket() {
        let t = work_orders();
        let r = aggregate(&t, &MetricKind::Count, Some("Sector"));
        let slices = breakdown(&r);

        let total: u64 = slices.iter().map(|s| s.contributing).sum();
        assert_eq!(total as usize, t.len(), "no row dropped or double-counted");

        // "Mining"/"mining" fold case-insensitively, first-seen casing wins
        let mining = slices.iter().find(|s| s.key == "Mining").unwrap();
        assert_eq!(mining.contributing, 2);
        assert!(slices.iter().any(|s| s.key == UNKNOWN_GROUP));
        // unknown bucket sorts last
        assert_eq!(slices.last().unwrap().key, UNKNOWN_GROUP);
    }

    #[test]
    fn grouped_sum_skips_absent_per_group() {
        let t = work_orders();
        let r = aggregate(&t, &MetricKind::Sum("Amount".into()), Some("Sector"));
        let slices = breakdown(&r);
        let mining = slices.iter().find(|s| s.key == "Mining").unwrap();
        assert_eq!(mining.value, 150.0);
        let urban = slices.iter().find(|s| s.key == "Urban").unwrap();
        assert_eq!(urban.value, 0.0);
        assert_eq!(urban.contributing, 0);
        assert!(r.caveats.iter().any(|c| c.contains("skipped")));
    }

    #[test]
    fn group_ordering_is_deterministic() {
        let t = work_orders();
        let a = aggregate(&t, &MetricKind::Count, Some("Sector"));
        let b = aggregate(&t, &MetricKind::Count, Some("Sector"));
        let keys_a: Vec<_> = breakdown(&a).iter().map(|s| s.key.clone()).collect();
        let keys_b: Vec<_> = breakdown(&b).iter().map(|s| s.key.clone()).collect();
        assert_eq!(keys_a, keys_b);
        assert_eq!(keys_a, vec!["Mining", "Urban", UNKNOWN_GROUP]);
    }

    #[test]
    fn revenue_metrics_summarizes_the_money_column() {
        let t = work_orders();
        let r = revenue_metrics(&t);
        assert!(matches!(
            r.metrics.get("column_used"),
            Some(MetricValue::Text(c)) if c == "Amount"
        ));
        assert!(matches!(
            r.metrics.get("total"),
            Some(MetricValue::Number(v)) if *v == 175.0
        ));
        assert!(matches!(
            r.metrics.get("min"),
            Some(MetricValue::Number(v)) if *v == 25.0
        ));
        assert!(matches!(
            r.metrics.get("max"),
            Some(MetricValue::Number(v)) if *v == 100.0
        ));
        assert_eq!(r.caveats.len(), 1);
    }
}
