// src/report/mod.rs
//
// Deterministic preparation for the narration layer: route a question to the
// right boards, apply sector/quarter filters, and assemble every number the
// narrator is allowed to phrase. The LLM call itself lives outside this
// crate and must never invent figures of its own.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::aliases::SectorAliases;
use crate::query::{
    aggregate, filter, pipeline_breakdown, quarter_range, revenue_metrics, DateRange, FilterSpec,
    MetricKind, MetricResult, MetricValue, PipelineBreakdown,
};
use crate::table::Table;

const WORK_ORDER_TERMS: &[&str] = &[
    "work order",
    "project",
    "execution",
    "billing",
    "billed",
    "revenue",
    "collected",
];
const DEAL_TERMS: &[&str] = &[
    "deal",
    "pipeline",
    "sales",
    "prospect",
    "opportunity",
    "stage",
];
const BOTH_TERMS: &[&str] = &[
    "overall",
    "business",
    "company",
    "everything",
    "summary",
    "leadership",
    "update",
];

const SECTOR_TERMS: &[&str] = &[
    "mining",
    "energy",
    "renewables",
    "powerline",
    "urban",
    "infrastructure",
    "agriculture",
];

static QUARTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bq([1-4])\b").expect("valid regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").expect("valid regex"));

#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnalysis {
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_orders: Option<MetricResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deals: Option<MetricResult>,
    pub caveats: Vec<String>,
}

/// Route a question to one or both boards and assemble the metrics it needs.
/// Unrecognized questions fall back to analyzing both boards.
#[instrument(level = "info", skip(work_orders, deals, aliases), fields(question = %question))]
pub fn analyze_question(
    question: &str,
    work_orders: &Table,
    deals: &Table,
    aliases: &SectorAliases,
    today: NaiveDate,
) -> QuestionAnalysis {
    let q = question.to_lowercase();

    let mut needs_work_orders = WORK_ORDER_TERMS.iter().any(|t| q.contains(t));
    let mut needs_deals = DEAL_TERMS.iter().any(|t| q.contains(t));
    if BOTH_TERMS.iter().any(|t| q.contains(t)) || (!needs_work_orders && !needs_deals) {
        needs_work_orders = true;
        needs_deals = true;
    }

    let sector_filter = SECTOR_TERMS
        .iter()
        .find(|t| q.contains(*t))
        .map(|t| t.to_string());

    let quarter = detect_quarter(&q, today);

    let mut spec = FilterSpec::default();
    if let Some(term) = &sector_filter {
        spec.sector = Some(term.clone());
    }
    if let Some((year, qtr)) = quarter {
        if let Some((start, end)) = quarter_range(year, qtr) {
            spec.date_range = Some(DateRange::between(start, end));
        }
    }
    debug!(?spec, "question routed");

    let mut caveats = Vec::new();
    let mut sources = Vec::new();

    let wo_metrics = if needs_work_orders {
        sources.push("Work Orders".to_string());
        let outcome = filter(work_orders, &spec, aliases);
        caveats.extend(outcome.caveats);
        Some(work_order_metrics(&outcome.table))
    } else {
        None
    };

    let dl_metrics = if needs_deals {
        sources.push("Deals".to_string());
        let outcome = filter(deals, &spec, aliases);
        caveats.extend(outcome.caveats);
        Some(deal_metrics(&outcome.table))
    } else {
        None
    };

    QuestionAnalysis {
        sources,
        sector_filter: sector_filter.map(|t| aliases.resolve(&t).to_string()),
        quarter: quarter.map(|(y, qtr)| format!("Q{} {}", qtr, y)),
        work_orders: wo_metrics,
        deals: dl_metrics,
        caveats,
    }
}

fn detect_quarter(q: &str, today: NaiveDate) -> Option<(i32, u32)> {
    if q.contains("this quarter") || q.contains("current quarter") {
        return Some(crate::query::current_quarter(today));
    }
    let qtr: u32 = QUARTER_RE.captures(q)?.get(1)?.as_str().parse().ok()?;
    let year = YEAR_RE
        .captures(q)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_else(|| crate::query::current_quarter(today).0);
    Some((year, qtr))
}

/// Everything the narrator may cite about a work-orders table.
pub fn work_order_metrics(table: &Table) -> MetricResult {
    let mut result = MetricResult::default();
    result.insert("total_work_orders", MetricValue::Count(table.len() as u64));
    result.merge("revenue", revenue_metrics(table));
    if let Some(col) = table.billed_column() {
        let name = table.columns()[col].name.clone();
        result.merge("billed", aggregate(table, &MetricKind::Sum(name), None));
    }
    if let Some(col) = table.stage_column() {
        let name = table.columns()[col].name.clone();
        result.merge("by_status", aggregate(table, &MetricKind::Count, Some(name.as_str())));
    }
    if let Some(col) = table.sector_column() {
        let name = table.columns()[col].name.clone();
        result.merge("by_sector", aggregate(table, &MetricKind::Count, Some(name.as_str())));
    }
    result
}

/// Everything the narrator may cite about a deals table.
pub fn deal_metrics(table: &Table) -> MetricResult {
    let mut result = MetricResult::default();
    result.insert("total_deals", MetricValue::Count(table.len() as u64));
    result.merge("pipeline_value", revenue_metrics(table));
    if let Some(col) = table.stage_column() {
        let name = table.columns()[col].name.clone();
        result.merge("by_stage", aggregate(table, &MetricKind::Count, Some(name.as_str())));
    }
    if let Some(col) = table.sector_column() {
        let name = table.columns()[col].name.clone();
        result.merge("by_sector", aggregate(table, &MetricKind::Count, Some(name.as_str())));
    }
    result
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkOrdersSummary {
    pub total_orders: u64,
    pub total_value: String,
    pub billed_value: String,
    pub billing_percentage: String,
    pub completed: u64,
    pub ongoing: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub total_deals: u64,
    pub total_value: String,
    pub won: u64,
    pub lost: u64,
    pub open: u64,
    pub win_rate: String,
    pub funnel: PipelineBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorInsights {
    pub work_orders_by_sector: MetricResult,
    pub deals_by_sector: MetricResult,
    pub top_sector_work_orders: Option<String>,
    pub top_sector_deals: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadershipUpdate {
    pub date: String,
    pub work_orders: WorkOrdersSummary,
    pub pipeline: PipelineSummary,
    pub sector_insights: SectorInsights,
    pub concerns: Vec<String>,
    pub caveats: Vec<String>,
}

fn number_of(result: &MetricResult, key: &str) -> f64 {
    match result.metrics.get(key) {
        Some(MetricValue::Number(v)) => *v,
        Some(MetricValue::Count(v)) => *v as f64,
        _ => 0.0,
    }
}

fn count_of(result: &MetricResult, key: &str) -> u64 {
    match result.metrics.get(key) {
        Some(MetricValue::Count(v)) => *v,
        _ => 0,
    }
}

fn status_count(result: &MetricResult, status: &str) -> u64 {
    if let Some(MetricValue::Breakdown(slices)) = result.metrics.get("groups") {
        slices
            .iter()
            .find(|s| s.key.eq_ignore_ascii_case(status))
            .map(|s| s.contributing)
            .unwrap_or(0)
    } else {
        0
    }
}

fn top_group(result: &MetricResult) -> Option<String> {
    if let Some(MetricValue::Breakdown(slices)) = result.metrics.get("groups") {
        slices
            .iter()
            .find(|s| s.key != crate::query::aggregate::UNKNOWN_GROUP)
            .map(|s| s.key.clone())
    } else {
        None
    }
}

/// Build the structured leadership update the narrator phrases for board
/// meetings: execution summary, pipeline health, sector insights, concerns.
#[instrument(level = "info", skip_all)]
pub fn leadership_update(
    work_orders: &Table,
    deals: &Table,
    today: NaiveDate,
) -> LeadershipUpdate {
    let mut caveats = Vec::new();

    let wo_revenue = revenue_metrics(work_orders);
    let total_revenue = number_of(&wo_revenue, "total");
    caveats.extend(wo_revenue.caveats.clone());

    let billed = work_orders
        .billed_column()
        .map(|col| {
            let name = work_orders.columns()[col].name.clone();
            aggregate(work_orders, &MetricKind::Sum(name), None)
        })
        .unwrap_or_default();
    let total_billed = number_of(&billed, "sum");
    caveats.extend(billed.caveats.clone());

    let wo_status = work_orders
        .stage_column()
        .map(|col| {
            let name = work_orders.columns()[col].name.clone();
            aggregate(work_orders, &MetricKind::Count, Some(name.as_str()))
        })
        .unwrap_or_default();
    let completed = status_count(&wo_status, "Completed");
    let ongoing = status_count(&wo_status, "Ongoing")
        + status_count(&wo_status, "Executed until current month");

    let billing_percentage = if total_revenue > 0.0 {
        format!("{:.1}%", total_billed / total_revenue * 100.0)
    } else {
        "N/A".to_string()
    };

    let funnel = pipeline_breakdown(deals);
    caveats.extend(funnel.caveats.clone());
    let deal_value = revenue_metrics(deals);
    let total_pipeline_value = number_of(&deal_value, "total");

    let deal_status = deals
        .stage_column()
        .map(|col| {
            let name = deals.columns()[col].name.clone();
            aggregate(deals, &MetricKind::Count, Some(name.as_str()))
        })
        .unwrap_or_default();
    let won = status_count(&deal_status, "Won");
    let lost = status_count(&deal_status, "Lost");
    let open = status_count(&deal_status, "Open");
    let win_rate = if won + lost > 0 {
        format!("{:.1}%", won as f64 / (won + lost) as f64 * 100.0)
    } else {
        "N/A".to_string()
    };

    let wo_by_sector = work_orders
        .sector_column()
        .map(|col| {
            let name = work_orders.columns()[col].name.clone();
            aggregate(work_orders, &MetricKind::Count, Some(name.as_str()))
        })
        .unwrap_or_default();
    let deals_by_sector = deals
        .sector_column()
        .map(|col| {
            let name = deals.columns()[col].name.clone();
            aggregate(deals, &MetricKind::Count, Some(name.as_str()))
        })
        .unwrap_or_default();

    let mut concerns = Vec::new();
    let unbilled = total_revenue - total_billed;
    if unbilled > 0.0 {
        concerns.push(format!("Unbilled amount: {} pending billing", format_inr(unbilled)));
    }
    let deals_total = deals.len() as u64;
    let deals_with_value = count_of(&deal_value, "contributing_rows");
    let missing_value = deals_total.saturating_sub(deals_with_value);
    if deals_total > 0 && missing_value as f64 > deals_total as f64 * 0.3 {
        concerns.push(format!(
            "{} deals ({}%) missing deal value",
            missing_value,
            (missing_value as f64 / deals_total as f64 * 100.0).round()
        ));
    }
    caveats.extend(deal_value.caveats.clone());

    LeadershipUpdate {
        date: today.format("%B %d, %Y").to_string(),
        work_orders: WorkOrdersSummary {
            total_orders: work_orders.len() as u64,
            total_value: format_inr(total_revenue),
            billed_value: format_inr(total_billed),
            billing_percentage,
            completed,
            ongoing,
        },
        pipeline: PipelineSummary {
            total_deals: deals_total,
            total_value: format_inr(total_pipeline_value),
            won,
            lost,
            open,
            win_rate,
            funnel,
        },
        sector_insights: SectorInsights {
            top_sector_work_orders: top_group(&wo_by_sector),
            top_sector_deals: top_group(&deals_by_sector),
            work_orders_by_sector: wo_by_sector,
            deals_by_sector,
        },
        concerns,
        caveats,
    }
}

/// Format a rupee amount in lakh/crore notation.
pub fn format_inr(value: f64) -> String {
    if value >= 10_000_000.0 {
        format!("₹{:.2} Cr", value / 10_000_000.0)
    } else if value >= 100_000.0 {
        format!("₹{:.2} L", value / 100_000.0)
    } else {
        format!("₹{}", group_thousands(value))
    }
}

fn group_thousands(value: f64) -> String {
    let whole = format!("{:.0}", value.abs());
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Follow-up prompts for ambiguous questions.
pub fn clarifying_questions(question: &str) -> Vec<String> {
    let q = question.to_lowercase();
    let mut out = Vec::new();
    if q.contains("recently") || q.contains("lately") {
        out.push(
            "What time period would you like to analyze? (e.g., last month, this quarter, this year)"
                .to_string(),
        );
    }
    if (q.contains("how much") || q.contains("what is the"))
        && !["revenue", "billed", "value", "deals", "orders"]
            .iter()
            .any(|t| q.contains(t))
    {
        out.push(
            "Are you looking for revenue, billed amount, deal pipeline value, or something else?"
                .to_string(),
        );
    }
    out
}
