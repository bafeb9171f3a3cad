// src/normalize/mod.rs
//
// Turns a raw board payload into a fixed-schema `Table` plus a
// `QualityReport`. Parse failures never propagate: a field that cannot be
// read as its declared kind becomes `Value::Absent` and is counted in the
// report.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::client::BoardData;
use crate::table::{ColumnDef, ColumnKind, Table, Value, DATE_NAME_TERMS, NUMERIC_NAME_TERMS};

static CURRENCY_JUNK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[₹$€£,\s]").expect("currency pattern is valid"));

/// Date formats accepted, in order. ISO first; ambiguous all-numeric dates
/// are day-first (the upstream boards are Indian-business data).
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d %b %Y",
    "%B %d, %Y",
];

/// Strip currency symbols and separators and parse the remainder as a
/// number. Unparseable input yields `None`, never an error.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let cleaned = CURRENCY_JUNK.replace_all(raw, "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Parse a date in any of the accepted formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Per-column completeness over one table.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnQuality {
    pub name: String,
    pub present_count: usize,
    pub absent_count: usize,
    pub absent_ratio: f64,
}

/// Completeness statistics derived from a table on every fetch; never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub columns: Vec<ColumnQuality>,
    /// Rows where every column except the item name is absent.
    pub empty_rows: usize,
}

impl QualityReport {
    pub fn column(&self, name: &str) -> Option<&ColumnQuality> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Resolve the kind of a board column: declared type first, then a
/// name-based fallback for loosely typed boards.
fn column_kind(title: &str, declared: &str) -> ColumnKind {
    let kind = ColumnKind::from_board_type(declared);
    if kind != ColumnKind::Text {
        return kind;
    }
    let name = title.to_lowercase();
    if NUMERIC_NAME_TERMS.iter().any(|t| name.contains(t)) {
        ColumnKind::Number
    } else if DATE_NAME_TERMS.iter().any(|t| name.contains(t)) {
        ColumnKind::Date
    } else {
        ColumnKind::Text
    }
}

fn coerce(raw: Option<&str>, kind: ColumnKind) -> Value {
    let text = match raw {
        Some(t) => t.trim(),
        None => return Value::Absent,
    };
    if text.is_empty() {
        return Value::Absent;
    }
    match kind {
        ColumnKind::Number => parse_currency(text).map_or(Value::Absent, Value::Number),
        ColumnKind::Date => parse_date(text).map_or(Value::Absent, Value::Date),
        ColumnKind::Status => Value::Status(text.to_string()),
        ColumnKind::Text => Value::Text(text.to_string()),
    }
}

/// The item-name pseudo-column, present on every board.
pub const ITEM_NAME: &str = "Item Name";

/// Build a fixed-schema table from a raw board payload. Every schema column
/// is present in every row, defaulting to `Absent` when the raw item carries
/// no value for it.
#[instrument(level = "info", skip(board), fields(board = %board.name))]
pub fn normalize(board: &BoardData) -> (Table, QualityReport) {
    let mut columns = vec![ColumnDef::new(ITEM_NAME, ColumnKind::Text)];
    // column id -> schema index, for mapping item values by id
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for meta in &board.columns {
        by_id.insert(meta.id.as_str(), columns.len());
        columns.push(ColumnDef::new(
            meta.title.clone(),
            column_kind(&meta.title, &meta.kind),
        ));
    }

    let width = columns.len();
    let mut table = Table::new(columns);

    for item in &board.items {
        let mut row = vec![Value::Absent; width];
        row[0] = if item.name.trim().is_empty() {
            Value::Absent
        } else {
            Value::Text(item.name.trim().to_string())
        };
        for cv in &item.column_values {
            if let Some(&idx) = by_id.get(cv.id.as_str()) {
                row[idx] = coerce(cv.text.as_deref(), table.columns()[idx].kind);
            }
        }
        table.push_row(row);
    }

    let report = quality_report(&table);
    debug!(
        rows = table.len(),
        empty_rows = report.empty_rows,
        "normalized board"
    );
    (table, report)
}

/// Recompute completeness statistics for a table.
pub fn quality_report(table: &Table) -> QualityReport {
    let total = table.len();
    let mut columns = Vec::with_capacity(table.columns().len());
    for (idx, def) in table.columns().iter().enumerate() {
        let absent = table.column_values(idx).filter(|v| v.is_absent()).count();
        let present = total - absent;
        columns.push(ColumnQuality {
            name: def.name.clone(),
            present_count: present,
            absent_count: absent,
            absent_ratio: if total == 0 {
                0.0
            } else {
                absent as f64 / total as f64
            },
        });
    }

    let name_col = table.column_index(ITEM_NAME);
    let empty_rows = table
        .rows()
        .iter()
        .filter(|row| {
            row.iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != name_col)
                .all(|(_, v)| v.is_absent())
        })
        .count();

    QualityReport {
        total_rows: total,
        columns,
        empty_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ColumnMeta, ColumnValue, Item};
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,boardscope::normalize=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn meta(id: &str, title: &str, kind: &str) -> ColumnMeta {
        ColumnMeta {
            id: id.into(),
            title: title.into(),
            kind: kind.into(),
        }
    }

    fn cv(id: &str, text: Option<&str>) -> ColumnValue {
        ColumnValue {
            id: id.into(),
            text: text.map(str::to_string),
        }
    }

    fn board() -> BoardData {
        BoardData {
            name: "Work Orders".into(),
            columns: vec![
                meta("sector", "Sector", "status"),
                meta("amount", "Amount in Rupees (Excl of GST) (Masked)", "text"),
                meta("date", "Order Date", "date"),
            ],
            items: vec![
                Item {
                    name: "WO-1".into(),
                    column_values: vec![
                        cv("sector", Some("Mining")),
                        cv("amount", Some("₹1,23,456.50")),
                        cv("date", Some("2026-01-15")),
                    ],
                },
                Item {
                    name: "WO-2".into(),
                    column_values: vec![
                        cv("sector", Some("")),
                        cv("amount", Some("not a number")),
                        // date column missing from the raw item entirely
                    ],
                },
            ],
        }
    }

    #[test]
    fn currency_parsing_strips_symbols_and_separators() {
        assert_eq!(parse_currency("₹1,23,456.50"), Some(123456.5));
        assert_eq!(parse_currency("$ 2,500"), Some(2500.0));
        assert_eq!(parse_currency("1000"), Some(1000.0));
        assert_eq!(parse_currency("TBD"), None);
        assert_eq!(parse_currency(""), None);
    }

    #[test]
    fn date_parsing_is_day_first_for_ambiguous_input() {
        let d = parse_date("03/04/2026").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 4, 3).unwrap());
        assert_eq!(
            parse_date("2026-04-03").unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 3).unwrap()
        );
        assert_eq!(
            parse_date("15 Jan 2026").unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
        assert_eq!(
            parse_date("January 15, 2026").unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
        assert_eq!(parse_date("sometime soon"), None);
    }

    #[test]
    fn normalize_builds_full_schema_rows() {
        init_test_logging();
        let (table, _) = normalize(&board());
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns().len(), 4);

        // well-formed row
        assert_eq!(table.value(0, 0), &Value::Text("WO-1".into()));
        assert_eq!(table.value(0, 1), &Value::Status("Mining".into()));
        assert_eq!(table.value(0, 2), &Value::Number(123456.5));
        assert_eq!(
            table.value(0, 3),
            &Value::Date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
        );

        // messy row: empty string, unparseable number, and a missing column
        // all collapse to Absent, never to zero or ""
        assert!(table.value(1, 1).is_absent());
        assert!(table.value(1, 2).is_absent());
        assert!(table.value(1, 3).is_absent());
    }

    #[test]
    fn quality_report_counts_present_and_absent() {
        let (_, report) = normalize(&board());
        assert_eq!(report.total_rows, 2);
        let amount = report
            .column("Amount in Rupees (Excl of GST) (Masked)")
            .unwrap();
        assert_eq!(amount.present_count, 1);
        assert_eq!(amount.absent_count, 1);
        assert!((amount.absent_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.empty_rows, 0);
    }

    #[test]
    fn quality_report_flags_all_absent_rows() {
        let mut b = board();
        b.items.push(Item {
            name: "WO-3".into(),
            column_values: vec![],
        });
        let (_, report) = normalize(&b);
        assert_eq!(report.empty_rows, 1);
    }

    #[test]
    fn name_based_kind_fallback_applies_to_text_columns() {
        // "Amount in Rupees ..." is declared "text" upstream but parses as a
        // number column
        let (table, _) = normalize(&board());
        assert_eq!(table.columns()[2].kind, ColumnKind::Number);
        assert_eq!(table.columns()[3].kind, ColumnKind::Date);
    }
}
