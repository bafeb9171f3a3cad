use anyhow::{Context, Result};
use boardscope::{
    config::Config,
    engine::Engine,
    report::{analyze_question, leadership_update},
};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) config + engine ──────────────────────────────────────────
    let config = Config::from_env().context("loading configuration")?;
    let mut engine = Engine::new(&config).context("building engine")?;

    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");

    // ─── 3) fetch both boards ────────────────────────────────────────
    let work_orders = engine
        .work_orders(false)
        .await
        .context("fetching work orders")?;
    let deals = engine.deals(false).await.context("fetching deals")?;
    info!(
        work_orders = work_orders.table.len(),
        deals = deals.table.len(),
        "boards loaded"
    );

    let today = Utc::now().date_naive();

    // ─── 4) answer the question, or print the standing report ────────
    if question.trim().is_empty() {
        let summary = engine.data_summary().await?;
        let update = leadership_update(&work_orders.table, &deals.table, today);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        println!("{}", serde_json::to_string_pretty(&update)?);
    } else {
        let analysis = analyze_question(
            &question,
            &work_orders.table,
            &deals.table,
            engine.aliases(),
            today,
        );
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    }

    info!("done");
    Ok(())
}
