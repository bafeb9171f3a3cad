// src/query/pipeline.rs
//
// Deal-funnel and billing-gap analysis.

use serde::Serialize;
use tracing::debug;

use super::aggregate::{GroupSlice, MetricResult, MetricValue, UNKNOWN_GROUP};
use crate::table::Table;

/// Funnel stages in presentation order. Stage values outside this set are
/// appended after it, in first-seen order.
pub const CANONICAL_STAGES: &[&str] = &[
    "Lead",
    "Qualified",
    "Proposal",
    "Negotiation",
    "Won",
    "Lost",
];

#[derive(Debug, Clone, Serialize)]
pub struct StageSlice {
    pub stage: String,
    pub count: u64,
    pub total_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineBreakdown {
    pub total_deals: u64,
    /// Distinct sector labels, in first-seen order.
    pub sectors: Vec<String>,
    pub stages: Vec<StageSlice>,
    pub caveats: Vec<String>,
}

fn canonical_rank(stage: &str) -> Option<usize> {
    CANONICAL_STAGES
        .iter()
        .position(|s| s.eq_ignore_ascii_case(stage))
}

/// Break the deals table down by stage: count and total value per stage, in
/// canonical order, unknown stages appended in first-seen order, deals with
/// an absent stage collected into the "(unknown)" bucket at the end.
pub fn pipeline_breakdown(deals: &Table) -> PipelineBreakdown {
    let mut caveats = Vec::new();

    let mut sectors: Vec<String> = Vec::new();
    if let Some(col) = deals.sector_column() {
        for v in deals.column_values(col) {
            if let Some(s) = v.as_text() {
                if !sectors.iter().any(|seen| seen.eq_ignore_ascii_case(s)) {
                    sectors.push(s.to_string());
                }
            }
        }
    } else {
        caveats.push("no sector column found".to_string());
    }

    let stage_col = deals.stage_column();
    if stage_col.is_none() {
        caveats.push("no stage column found; funnel is empty".to_string());
    }
    let value_col = deals.revenue_column();
    if value_col.is_none() {
        caveats.push("no deal value column found; stage values are 0".to_string());
    }

    // first-seen order; sorted into canonical order afterwards
    let mut stages: Vec<StageSlice> = Vec::new();
    let mut value_skipped = 0usize;
    if let Some(stage_col) = stage_col {
        for row in deals.rows() {
            let label = row[stage_col]
                .as_text()
                .map(str::to_string)
                .unwrap_or_else(|| UNKNOWN_GROUP.to_string());
            let value = value_col.and_then(|c| row[c].as_number());
            if value_col.is_some() && value.is_none() {
                value_skipped += 1;
            }

            match stages
                .iter_mut()
                .find(|s| s.stage.eq_ignore_ascii_case(&label))
            {
                Some(slice) => {
                    slice.count += 1;
                    slice.total_value += value.unwrap_or(0.0);
                }
                None => stages.push(StageSlice {
                    stage: label,
                    count: 1,
                    total_value: value.unwrap_or(0.0),
                }),
            }
        }
    }

    // canonical stages first (in canonical order), then unrecognized stages
    // in first-seen order, unknown bucket last
    let mut ordered = Vec::with_capacity(stages.len());
    for canonical in CANONICAL_STAGES {
        if let Some(pos) = stages
            .iter()
            .position(|s| s.stage.eq_ignore_ascii_case(canonical))
        {
            ordered.push(stages.remove(pos));
        }
    }
    let (unknown, rest): (Vec<_>, Vec<_>) =
        stages.into_iter().partition(|s| s.stage == UNKNOWN_GROUP);
    ordered.extend(rest);
    ordered.extend(unknown);

    if value_skipped > 0 {
        caveats.push(format!(
            "{} of {} deals have no recorded value; stage totals exclude them",
            value_skipped,
            deals.len()
        ));
    }

    debug!(stages = ordered.len(), deals = deals.len(), "pipeline breakdown");
    PipelineBreakdown {
        total_deals: deals.len() as u64,
        sectors,
        stages: ordered,
        caveats,
    }
}

/// Per-sector gap between ordered amount and billed value. A row
/// contributes only when both sides are present; rows missing either side
/// are skipped here without affecting any other metric, and the skip count
/// is caveated.
pub fn revenue_vs_billing_gap(work_orders: &Table) -> MetricResult {
    let mut result = MetricResult::default();

    let amount_col = work_orders.revenue_column();
    let billed_col = work_orders.billed_column();
    let (amount_col, billed_col) = match (amount_col, billed_col) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            result.caveat("amount or billed column not found; gap not computed".to_string());
            result.insert("total_gap", MetricValue::Number(0.0));
            return result;
        }
    };
    let sector_col = work_orders.sector_column();

    // first-seen sector order, folded case-insensitively
    let mut slices: Vec<GroupSlice> = Vec::new();
    let mut skipped = 0usize;
    let mut total_gap = 0.0;

    for row in work_orders.rows() {
        let amount = row[amount_col].as_number();
        let billed = row[billed_col].as_number();
        let (amount, billed) = match (amount, billed) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                skipped += 1;
                continue;
            }
        };
        let gap = amount - billed;
        total_gap += gap;

        let sector = sector_col
            .and_then(|c| row[c].as_text())
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_GROUP.to_string());
        match slices
            .iter_mut()
            .find(|s| s.key.eq_ignore_ascii_case(&sector))
        {
            Some(slice) => {
                slice.value += gap;
                slice.contributing += 1;
            }
            None => slices.push(GroupSlice {
                key: sector,
                value: gap,
                contributing: 1,
            }),
        }
    }

    result.insert("total_gap", MetricValue::Number(total_gap));
    result.insert("gap_by_sector", MetricValue::Breakdown(slices));
    if skipped > 0 {
        result.caveat(format!(
            "{} of {} rows skipped (amount or billed value absent)",
            skipped,
            work_orders.len()
        ));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnDef, ColumnKind, Value};

    fn deals() -> Table {
        let mut t = Table::new(vec![
            ColumnDef::new("Item Name", ColumnKind::Text),
            ColumnDef::new("Sector/service", ColumnKind::Status),
            ColumnDef::new("Deal Stage", ColumnKind::Status),
            ColumnDef::new("Masked Deal value", ColumnKind::Number),
        ]);
        let row = |name: &str, sector: Value, stage: Value, value: Value| {
            vec![Value::Text(name.into()), sector, stage, value]
        };
        let status = |s: &str| Value::Status(s.into());
        t.push_row(row("D-1", status("Mining"), status("Negotiation"), Value::Number(100.0)));
        t.push_row(row("D-2", status("Renewables"), status("Lead"), Value::Number(40.0)));
        t.push_row(row("D-3", status("Mining"), status("lead"), Value::Absent));
        t.push_row(row("D-4", status("Urban"), status("Site Survey"), Value::Number(10.0)));
        t.push_row(row("D-5", status("Renewables"), Value::Absent, Value::Number(5.0)));
        t
    }

    #[test]
    fn stages_come_out_in_canonical_then_first_seen_order() {
        let b = pipeline_breakdown(&deals());
        let names: Vec<_> = b.stages.iter().map(|s| s.stage.as_str()).collect();
        // canonical stages first, then the unrecognized "Site Survey",
        // then the unknown bucket
        assert_eq!(names, vec!["Lead", "Negotiation", "Site Survey", UNKNOWN_GROUP]);
    }

    #[test]
    fn stage_counts_fold_case_and_totals_skip_absent_values() {
        let b = pipeline_breakdown(&deals());
        let lead = b.stages.iter().find(|s| s.stage == "Lead").unwrap();
        assert_eq!(lead.count, 2, "Lead and lead fold together");
        assert_eq!(lead.total_value, 40.0, "absent value contributes nothing");
        assert!(b.caveats.iter().any(|c| c.contains("no recorded value")));
    }

    #[test]
    fn breakdown_is_deterministic_across_calls() {
        let t = deals();
        let a = pipeline_breakdown(&t);
        let b = pipeline_breakdown(&t);
        let names = |p: &PipelineBreakdown| {
            p.stages.iter().map(|s| s.stage.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(&a), names(&b));
        assert_eq!(a.total_deals, 5);
        assert_eq!(a.sectors, vec!["Mining", "Renewables", "Urban"]);
    }

    #[test]
    fn billing_gap_skips_rows_missing_either_side() {
        let mut t = Table::new(vec![
            ColumnDef::new("Item Name", ColumnKind::Text),
            ColumnDef::new("Sector", ColumnKind::Status),
            ColumnDef::new("Amount", ColumnKind::Number),
            ColumnDef::new("Billed Value", ColumnKind::Number),
        ]);
        t.push_row(vec![
            Value::Text("WO-1".into()),
            Value::Status("Mining".into()),
            Value::Number(100.0),
            Value::Number(80.0),
        ]);
        t.push_row(vec![
            Value::Text("WO-2".into()),
            Value::Status("Mining".into()),
            Value::Number(50.0),
            Value::Absent,
        ]);

        let r = revenue_vs_billing_gap(&t);
        let slices = match r.metrics.get("gap_by_sector") {
            Some(MetricValue::Breakdown(s)) => s,
            other => panic!("expected breakdown, got {:?}", other),
        };
        let mining = slices.iter().find(|s| s.key == "Mining").unwrap();
        assert_eq!(mining.value, 20.0, "only the fully recorded row contributes");
        assert_eq!(mining.contributing, 1);
        assert_eq!(r.caveats.len(), 1);
        assert!(r.caveats[0].contains("1 of 2"));
    }

    #[test]
    fn gap_without_billed_column_degrades_to_zero() {
        let mut t = Table::new(vec![
            ColumnDef::new("Item Name", ColumnKind::Text),
            ColumnDef::new("Amount", ColumnKind::Number),
        ]);
        t.push_row(vec![Value::Text("WO-1".into()), Value::Number(10.0)]);
        let r = revenue_vs_billing_gap(&t);
        assert!(matches!(
            r.metrics.get("total_gap"),
            Some(MetricValue::Number(v)) if *v == 0.0
        ));
        assert_eq!(r.caveats.len(), 1);
    }
}
