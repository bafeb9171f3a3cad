// src/query/mod.rs

pub mod aggregate;
pub mod filter;
pub mod pipeline;
pub mod quarter;

pub use aggregate::{aggregate, revenue_metrics, GroupSlice, MetricKind, MetricResult, MetricValue};
pub use filter::{filter, DateRange, FilterOutcome, FilterSpec, StatusFilter};
pub use pipeline::{pipeline_breakdown, revenue_vs_billing_gap, PipelineBreakdown, StageSlice};
pub use quarter::{current_quarter, quarter_of, quarter_range};
