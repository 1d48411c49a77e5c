// src/dashboard/mod.rs
//! Assembles the full dashboard payload from a [`TableSource`]: parse every
//! indicator table, align the two countries' series over the requested year
//! range, derive metrics, and fit the deficit trendline. Output is plain
//! serde structures; nothing here knows about charts.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::derive::{
    cumulative_growth, growth_rate, moving_average, pct_delta, product_breakdown, trade_by_year,
    Delta, Flow, ProductShare, TradeColumns, MOVING_AVERAGE_WINDOW,
};
use crate::fetch::{load_tables, TableSource};
use crate::fit::{linear_fit, overlay, TrendModel};
use crate::parse::{parse_table, Table};
use crate::series::{align_years, JoinedSeries, Series, TimeKey};

// ─── table registry ──────────────────────────────────────────────────
pub const US_GDP: &str = "us_gdp";
pub const CHINA_GDP: &str = "china_gdp";
pub const US_RD: &str = "us_rd";
pub const CHINA_RD: &str = "china_rd";
pub const US_CHINA_TRADE: &str = "us_china_trade";
pub const MONTHLY_TRADE: &str = "monthly_trade";
pub const MONTHLY_TECH: &str = "monthly_tech";

/// Every table the dashboard needs, loaded in one concurrent pass.
pub static TABLES: &[&str] = &[
    US_GDP,
    CHINA_GDP,
    US_RD,
    CHINA_RD,
    US_CHINA_TRADE,
    MONTHLY_TRADE,
    MONTHLY_TECH,
];

const YEAR_COL: &str = "Year";
const MONTH_COL: &str = "Month";
const GDP_COL: &str = "GDP";
const RD_COL: &str = "R&D Spending (% of GDP)";
const BALANCE_COL: &str = "Balance";

const TRADE_COLS: TradeColumns = TradeColumns {
    year: "Year",
    category: "Product Group",
    exports: "Exports",
    imports: "Imports",
    balance: Some("Balance"),
};

/// Technology terms tracked in the monthly mentions table.
pub static TECH_TERMS: &[&str] = &[
    "artificial intelligence",
    "robotics",
    "cybersecurity",
    "quantum computing",
];

/// Months of tech-mention history included in the payload.
const TECH_WINDOW: usize = 12;
/// Categories shown per product breakdown.
const BREAKDOWN_TOP_N: usize = 10;

// unit conversions applied at assembly, never inside parse/derive
const USD_TO_TRILLIONS: f64 = 1.0 / 1e12;
const THOUSANDS_TO_BILLIONS: f64 = 1.0 / 1e6;
const MILLIONS_TO_BILLIONS: f64 = 1.0 / 1e3;

/// Range and visibility state, typically driven by interactive controls.
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub start_year: i32,
    pub end_year: i32,
    pub show_us: bool,
    pub show_china: bool,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        DashboardOptions {
            start_year: 2000,
            end_year: 2023,
            show_us: true,
            show_china: true,
        }
    }
}

/// Aggregated annual trade flows, in billions USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeYear {
    pub year: i32,
    pub exports: f64,
    pub imports: f64,
    pub balance: f64,
}

/// Monthly trade balance with its trailing moving average and an optional
/// linear trend overlay, positionally aligned to `labels`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeficitSeries {
    pub labels: Vec<String>,
    pub balance: Vec<f64>,
    pub moving_average: Vec<Option<f64>>,
    pub trend: Option<Vec<f64>>,
}

/// One technology term's monthly mention counts; None where the month lacks
/// a reading for the term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// The most recent year of technology-term mentions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechTrends {
    pub labels: Vec<String>,
    pub series: Vec<TechSeries>,
}

/// Headline indicator: latest reading plus change against the prior one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: String,
    pub value: f64,
    pub delta: Option<Delta>,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    pub start_year: i32,
    pub end_year: i32,
    pub gdp: JoinedSeries,
    pub growth: JoinedSeries,
    pub cumulative: JoinedSeries,
    pub rd: JoinedSeries,
    pub trade: Vec<TradeYear>,
    pub deficit: DeficitSeries,
    pub tech: TechTrends,
    pub export_breakdown: Vec<ProductShare>,
    pub import_breakdown: Vec<ProductShare>,
    pub kpis: Vec<Kpi>,
}

/// Load, parse, align, and derive the whole dashboard payload.
pub async fn assemble<S: TableSource>(source: &S, opts: &DashboardOptions) -> Result<DashboardData> {
    // 1) fetch all raw tables concurrently; one aggregate failure surfaces here
    let raw = load_tables(source, TABLES)
        .await
        .context("failed to load dashboard data")?;
    info!(tables = raw.len(), "loaded raw tables");

    // 2) parse (all tables key on a numeric Year)
    let us_gdp = parse_table(&raw[US_GDP], YEAR_COL);
    let china_gdp = parse_table(&raw[CHINA_GDP], YEAR_COL);
    let us_rd = parse_table(&raw[US_RD], YEAR_COL);
    let china_rd = parse_table(&raw[CHINA_RD], YEAR_COL);
    let trade = parse_table(&raw[US_CHINA_TRADE], YEAR_COL);
    let monthly_trade = parse_table(&raw[MONTHLY_TRADE], YEAR_COL);
    let monthly_tech = parse_table(&raw[MONTHLY_TECH], YEAR_COL);

    // 3) annual series, joined over the requested range with toggles applied
    let visible = [opts.show_us, opts.show_china];
    let us_gdp_series = Series::from_table(&us_gdp, YEAR_COL, GDP_COL);
    let china_gdp_series = Series::from_table(&china_gdp, YEAR_COL, GDP_COL);

    let gdp = align_years(
        &[
            ("US GDP", &us_gdp_series.scaled(USD_TO_TRILLIONS)),
            ("China GDP", &china_gdp_series.scaled(USD_TO_TRILLIONS)),
        ],
        opts.start_year,
        opts.end_year,
    )
    .masked(&visible);

    let us_growth = growth_rate(&us_gdp_series);
    let china_growth = growth_rate(&china_gdp_series);
    let growth = align_years(
        &[("US Growth", &us_growth), ("China Growth", &china_growth)],
        opts.start_year,
        opts.end_year,
    )
    .masked(&visible);

    let base = TimeKey::year(opts.start_year);
    let cumulative = align_years(
        &[
            ("US Cumulative", &cumulative_growth(&us_gdp_series, base)),
            ("China Cumulative", &cumulative_growth(&china_gdp_series, base)),
        ],
        opts.start_year,
        opts.end_year,
    )
    .masked(&visible);

    let rd = align_years(
        &[
            ("US R&D", &Series::from_table(&us_rd, YEAR_COL, RD_COL)),
            ("China R&D", &Series::from_table(&china_rd, YEAR_COL, RD_COL)),
        ],
        opts.start_year,
        opts.end_year,
    )
    .masked(&visible);

    // 4) annual trade flows, scaled to billions
    let trade_years: Vec<TradeYear> = trade_by_year(&trade, &TRADE_COLS)
        .into_iter()
        .filter(|(year, _)| (opts.start_year..=opts.end_year).contains(year))
        .map(|(year, flow)| TradeYear {
            year,
            exports: flow.exports * THOUSANDS_TO_BILLIONS,
            imports: flow.imports * THOUSANDS_TO_BILLIONS,
            balance: flow.balance * THOUSANDS_TO_BILLIONS,
        })
        .collect();

    // 5) monthly deficit with moving average and trendline
    let deficit = deficit_series(&monthly_trade, opts);

    // 6) technology mentions, last twelve months on record
    let tech = tech_trends(&monthly_tech);

    // 7) product breakdowns for the latest year in range
    let breakdown_year = trade_years.last().map(|t| t.year).unwrap_or(opts.end_year);
    let export_breakdown =
        product_breakdown(&trade, &TRADE_COLS, breakdown_year, Flow::Exports, BREAKDOWN_TOP_N);
    let import_breakdown =
        product_breakdown(&trade, &TRADE_COLS, breakdown_year, Flow::Imports, BREAKDOWN_TOP_N);

    // 8) headline indicators
    let mut kpis = Vec::new();
    if let Some(kpi) = latest_kpi("US GDP Growth", &us_growth) {
        kpis.push(kpi);
    }
    if let Some(kpi) = latest_kpi("China GDP Growth", &china_growth) {
        kpis.push(kpi);
    }
    if let Some(kpi) = trade_balance_kpi(&trade_years) {
        kpis.push(kpi);
    }

    Ok(DashboardData {
        start_year: opts.start_year,
        end_year: opts.end_year,
        gdp,
        growth,
        cumulative,
        rd,
        trade: trade_years,
        deficit,
        tech,
        export_breakdown,
        import_breakdown,
        kpis,
    })
}

/// Month name for a monthly key, for display labels.
fn month_label(key: TimeKey) -> String {
    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    match key.month {
        Some(m) => format!("{} {}", MONTHS[(m - 1) as usize], key.year),
        None => key.year.to_string(),
    }
}

fn deficit_series(monthly_trade: &Table, opts: &DashboardOptions) -> DeficitSeries {
    let balance = Series::from_monthly_table(monthly_trade, YEAR_COL, MONTH_COL, BALANCE_COL)
        .scaled(MILLIONS_TO_BILLIONS);

    let points: Vec<(TimeKey, f64)> = balance
        .iter()
        .filter(|(k, _)| (opts.start_year..=opts.end_year).contains(&k.year))
        .collect();

    let labels: Vec<String> = points.iter().map(|(k, _)| month_label(*k)).collect();
    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

    let avg = moving_average(&values, MOVING_AVERAGE_WINDOW);

    // Fit over the point index; a collapsed x-range or too few points simply
    // means no trendline.
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let fit_points: Vec<(f64, f64)> = xs.iter().copied().zip(values.iter().copied()).collect();
    let trend = linear_fit(&fit_points).map(|m| overlay(&TrendModel::Linear(m), &xs));
    if trend.is_none() {
        debug!(points = values.len(), "no deficit trendline for this range");
    }

    DeficitSeries {
        labels,
        balance: values,
        moving_average: avg,
        trend,
    }
}

fn tech_trends(monthly_tech: &Table) -> TechTrends {
    // only rows with a usable (year, month) label enter the window, so labels
    // and values stay positionally aligned
    let labeled: Vec<(&crate::parse::Row, String)> = monthly_tech
        .rows
        .iter()
        .filter_map(|row| {
            let year = row.number(YEAR_COL)? as i32;
            let month = row.text(MONTH_COL)?;
            let label = TimeKey::from_month_name(year, month)
                .map_or_else(|| format!("{month} {year}"), month_label);
            Some((row, label))
        })
        .collect();
    let start = labeled.len().saturating_sub(TECH_WINDOW);
    let window = &labeled[start..];

    let labels: Vec<String> = window.iter().map(|(_, label)| label.clone()).collect();

    let series = TECH_TERMS
        .iter()
        .map(|&term| TechSeries {
            name: term.to_string(),
            values: window.iter().map(|(row, _)| row.number(term)).collect(),
        })
        .collect();

    TechTrends { labels, series }
}

/// Latest value of a derived series plus its change against the prior point.
fn latest_kpi(label: &str, series: &Series) -> Option<Kpi> {
    let last = series.last_key()?;
    let value = series.get(last)?;
    let delta = series.get(last.prev()).and_then(|prev| pct_delta(value, prev));
    Some(Kpi {
        label: label.to_string(),
        value,
        delta,
    })
}

fn trade_balance_kpi(trade: &[TradeYear]) -> Option<Kpi> {
    let last = trade.last()?;
    let delta = trade
        .len()
        .checked_sub(2)
        .and_then(|i| pct_delta(last.balance, trade[i].balance));
    Some(Kpi {
        label: "Trade Balance".to_string(),
        value: last.balance,
        delta,
    })
}
