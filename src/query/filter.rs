// src/query/filter.rs
//
// Predicate filtering over a normalized table. The result is always an
// order-preserving subsequence; a record passes only if it satisfies every
// predicate present in the spec, and any predicate evaluated against an
// absent value excludes the record. A malformed spec (unparseable date
// bound) degrades to an empty table plus a caveat instead of an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aliases::SectorAliases;
use crate::normalize::parse_date;
use crate::table::{Table, Value};

/// Inclusive date range, carried as raw user strings and parsed at
/// evaluation time so bad input can degrade softly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: Some(start.format("%Y-%m-%d").to_string()),
            end: Some(end.format("%Y-%m-%d").to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusFilter {
    Is(String),
    AnyOf(Vec<String>),
}

impl StatusFilter {
    fn matches(&self, status: &str) -> bool {
        match self {
            StatusFilter::Is(want) => want.eq_ignore_ascii_case(status),
            StatusFilter::AnyOf(set) => set.iter().any(|w| w.eq_ignore_ascii_case(status)),
        }
    }
}

/// Optional predicates; absence means "no restriction".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Case-insensitive substring match against the sector column, after
    /// alias resolution.
    pub sector: Option<String>,
    /// Matched against any candidate date column.
    pub date_range: Option<DateRange>,
    /// Exact or set membership against the status/stage column.
    pub status: Option<StatusFilter>,
}

impl FilterSpec {
    pub fn sector(term: impl Into<String>) -> Self {
        FilterSpec {
            sector: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sector.is_none() && self.date_range.is_none() && self.status.is_none()
    }
}

#[derive(Debug)]
pub struct FilterOutcome {
    pub table: Table,
    pub caveats: Vec<String>,
}

struct DateBounds {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

/// Apply every predicate in `spec`, returning the matching subsequence.
pub fn filter(table: &Table, spec: &FilterSpec, aliases: &SectorAliases) -> FilterOutcome {
    let mut caveats = Vec::new();

    // Resolve predicate targets up front so per-row evaluation is cheap.
    let sector = match &spec.sector {
        Some(term) => {
            let canonical = aliases.resolve(term).to_lowercase();
            match table.sector_column() {
                Some(col) => Some((col, canonical)),
                None => {
                    caveats.push("no sector column found; sector filter not applied".to_string());
                    None
                }
            }
        }
        None => None,
    };

    let status = match &spec.status {
        Some(f) => match table.stage_column() {
            Some(col) => Some((col, f)),
            None => {
                caveats.push("no status column found; status filter not applied".to_string());
                None
            }
        },
        None => None,
    };

    let dates = match &spec.date_range {
        Some(range) => match parse_bounds(range) {
            Ok(bounds) => {
                let cols = table.date_columns();
                if cols.is_empty() {
                    caveats.push("no date column found; date filter not applied".to_string());
                    None
                } else {
                    Some((cols, bounds))
                }
            }
            Err(bad) => {
                // Malformed spec: empty result, with an explanation.
                caveats.push(format!(
                    "date range bound {:?} could not be parsed; no rows matched",
                    bad
                ));
                return FilterOutcome {
                    table: table.with_rows(Vec::new()),
                    caveats,
                };
            }
        },
        None => None,
    };

    let rows: Vec<Vec<Value>> = table
        .rows()
        .iter()
        .filter(|row| {
            if let Some((col, needle)) = &sector {
                match row[*col].as_text() {
                    Some(text) if text.to_lowercase().contains(needle.as_str()) => {}
                    // absent or non-matching: exclude
                    _ => return false,
                }
            }
            if let Some((col, f)) = &status {
                match row[*col].as_text() {
                    Some(text) if f.matches(text) => {}
                    _ => return false,
                }
            }
            if let Some((cols, bounds)) = &dates {
                // pass if any candidate date column holds an in-range date;
                // rows with no present date are excluded
                let hit = cols.iter().any(|&col| match row[col].as_date() {
                    Some(d) => {
                        bounds.start.map_or(true, |s| d >= s) && bounds.end.map_or(true, |e| d <= e)
                    }
                    None => false,
                });
                if !hit {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect();

    debug!(
        input_rows = table.len(),
        matched = rows.len(),
        "filter applied"
    );
    FilterOutcome {
        table: table.with_rows(rows),
        caveats,
    }
}

fn parse_bounds(range: &DateRange) -> Result<DateBounds, String> {
    let parse = |raw: &Option<String>| -> Result<Option<NaiveDate>, String> {
        match raw {
            Some(s) => parse_date(s).map(Some).ok_or_else(|| s.clone()),
            None => Ok(None),
        }
    };
    Ok(DateBounds {
        start: parse(&range.start)?,
        end: parse(&range.end)?,
    })
}
