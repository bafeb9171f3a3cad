// src/table/mod.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of a column, discovered at fetch time from the board's column
/// metadata (with a name-based fallback for boards whose columns are typed
/// as plain text upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Number,
    Date,
    Status,
}

impl ColumnKind {
    /// Map the board API's column `type` string to a kind.
    pub fn from_board_type(t: &str) -> Self {
        match t {
            "numbers" | "numeric" => ColumnKind::Number,
            "date" => ColumnKind::Date,
            "status" | "color" | "dropdown" => ColumnKind::Status,
            _ => ColumnKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnDef {
            name: name.into(),
            kind,
        }
    }
}

/// A single cell. `Absent` marks "field not recorded" and is never conflated
/// with zero or the empty string; every aggregation skips it explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Status(String),
    Absent,
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Text content of a text-like cell (Text or Status).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Status(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Column-name terms that suggest a numeric field when the board metadata
/// says plain text. Matches the loose typing seen on real boards.
pub const NUMERIC_NAME_TERMS: &[&str] = &[
    "amount", "value", "price", "cost", "revenue", "total", "quantity", "area", "ha",
];

/// Column-name terms that suggest a date field.
pub const DATE_NAME_TERMS: &[&str] = &["date", "start", "end", "due", "created"];

const STAGE_NAME_TERMS: &[&str] = &["stage", "status", "state"];

/// An ordered sequence of records sharing one schema. Immutable once built;
/// a refresh replaces the whole table.
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Rows shorter than the schema are padded with `Absent`
    /// so every record always carries the full column set; longer rows are
    /// truncated to the schema.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Absent);
        self.rows.push(row);
    }

    /// A table with this table's schema and the given rows, used by the
    /// filter layer to return order-preserving subsequences.
    pub fn with_rows(&self, rows: Vec<Vec<Value>>) -> Table {
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn value(&self, row: usize, col: usize) -> &Value {
        &self.rows[row][col]
    }

    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| &r[col])
    }

    /// Index of the column with exactly this name, case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let needle = name.to_lowercase();
        self.columns
            .iter()
            .position(|c| c.name.to_lowercase() == needle)
    }

    /// First column whose lowercased name satisfies the predicate.
    pub fn find_column(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| pred(&c.name.to_lowercase()))
    }

    /// Sector-like column ("Sector", "Sector/service", ...).
    pub fn sector_column(&self) -> Option<usize> {
        self.find_column(|n| n.contains("sector"))
    }

    /// Stage/status-like column ("Deal Stage", "Execution Status", ...).
    pub fn stage_column(&self) -> Option<usize> {
        self.find_column(|n| STAGE_NAME_TERMS.iter().any(|t| n.contains(t)))
    }

    /// All candidate date columns: declared dates plus date-like names.
    pub fn date_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let n = c.name.to_lowercase();
                c.kind == ColumnKind::Date || DATE_NAME_TERMS.iter().any(|t| n.contains(t))
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// The main money column: first name matching a revenue term, skipping
    /// billed-value columns so "Billed Value ..." never shadows "Amount ...".
    pub fn revenue_column(&self) -> Option<usize> {
        self.find_column(|n| {
            !n.contains("billed") && NUMERIC_NAME_TERMS[..5].iter().any(|t| n.contains(t))
        })
    }

    pub fn billed_column(&self) -> Option<usize> {
        self.find_column(|n| n.contains("billed"))
    }

    /// Whether a column should be grouped case-insensitively (sector/status
    /// style categorical text).
    pub fn is_categorical(&self, col: usize) -> bool {
        let n = self.columns[col].name.to_lowercase();
        self.columns[col].kind == ColumnKind::Status
            || n.contains("sector")
            || STAGE_NAME_TERMS.iter().any(|t| n.contains(t))
    }

    /// Summary statistics for one column, by name.
    pub fn column_summary(&self, name: &str) -> Option<ColumnSummary> {
        let col = self.column_index(name)?;
        let total = self.rows.len();
        let absent = self.column_values(col).filter(|v| v.is_absent()).count();

        let numbers: Vec<f64> = self.column_values(col).filter_map(Value::as_number).collect();
        let numeric = if numbers.is_empty() {
            None
        } else {
            let sum: f64 = numbers.iter().sum();
            let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Some(NumericStats {
                min,
                max,
                mean: sum / numbers.len() as f64,
                sum,
                count: numbers.len(),
            })
        };

        let mut uniques: Vec<String> = Vec::new();
        for v in self.column_values(col) {
            if let Some(s) = v.as_text() {
                if !uniques.iter().any(|u| u == s) {
                    uniques.push(s.to_string());
                }
            }
        }
        let unique_count = uniques.len();
        let unique_values = if unique_count <= 20 && unique_count > 0 {
            Some(uniques)
        } else {
            None
        };

        Some(ColumnSummary {
            name: self.columns[col].name.clone(),
            total_values: total,
            absent_count: absent,
            numeric,
            unique_values,
            unique_count,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub total_values: usize,
    pub absent_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_values: Option<Vec<String>>,
    pub unique_count: usize,
}
