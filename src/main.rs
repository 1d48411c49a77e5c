use anyhow::{Context, Result};
use econdash::{
    dashboard::{self, DashboardOptions},
    fetch::FileSource,
};
use std::env;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) configure data source ────────────────────────────────────
    let mut args = env::args().skip(1);
    let data_dir = args.next().unwrap_or_else(|| "data".to_string());
    let start_year: i32 = match args.next() {
        Some(s) => s.parse().context("start year must be an integer")?,
        None => DashboardOptions::default().start_year,
    };
    let end_year: i32 = match args.next() {
        Some(s) => s.parse().context("end year must be an integer")?,
        None => DashboardOptions::default().end_year,
    };

    let source = FileSource::new(&data_dir);
    info!(%data_dir, start_year, end_year, "assembling dashboard");

    // ─── 3) assemble and emit ────────────────────────────────────────
    let opts = DashboardOptions {
        start_year,
        end_year,
        ..DashboardOptions::default()
    };
    let data = dashboard::assemble(&source, &opts).await?;

    let json = serde_json::to_string_pretty(&data).context("serializing dashboard payload")?;
    println!("{json}");

    info!(
        gdp_points = data.gdp.points.len(),
        trade_years = data.trade.len(),
        kpis = data.kpis.len(),
        "done"
    );
    Ok(())
}
