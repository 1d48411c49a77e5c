// src/derive/mod.rs
use serde::Serialize;
use std::collections::BTreeMap;

use crate::parse::Table;
use crate::series::{Series, TimeKey};

/// Category name of the aggregate row present in WITS-style trade tables.
/// When it appears, per-category rows are excluded from totals so they are
/// not counted twice.
pub const ALL_PRODUCTS: &str = "All Products";

/// Trailing window length for the monthly moving average.
pub const MOVING_AVERAGE_WINDOW: usize = 12;

/// Year-over-period growth rate in percent: (v[k] - v[prev]) / v[prev] * 100.
/// Keys whose predecessor is absent or zero produce no point.
pub fn growth_rate(series: &Series) -> Series {
    series
        .iter()
        .filter_map(|(key, value)| {
            let prior = series.get(key.prev())?;
            if prior == 0.0 {
                return None;
            }
            Some((key, (value - prior) / prior * 100.0))
        })
        .collect()
}

/// Growth in percent relative to the value at `base`, for every key >= base.
/// Empty when the base key is absent or its value is zero.
pub fn cumulative_growth(series: &Series, base: TimeKey) -> Series {
    let base_value = match series.get(base) {
        Some(v) if v != 0.0 => v,
        _ => return Series::new(),
    };
    series
        .iter()
        .filter(|(key, _)| *key >= base)
        .map(|(key, value)| (key, (value - base_value) / base_value * 100.0))
        .collect()
}

/// Unweighted trailing mean over `window` points. Index i is defined only
/// once `window` consecutive points exist (i >= window - 1). Each window is
/// summed afresh; at a few hundred monthly points that is cheap enough.
pub fn moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < window {
                None
            } else {
                let sum: f64 = values[i + 1 - window..=i].iter().sum();
                Some(sum / window as f64)
            }
        })
        .collect()
}

/// Direction flag consumed by indicator widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

/// Percentage change between two readings plus its direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Delta {
    pub pct: f64,
    pub direction: Direction,
}

/// (current - previous) / previous * 100, with a direction flag. None when
/// the previous reading is zero.
pub fn pct_delta(current: f64, previous: f64) -> Option<Delta> {
    if previous == 0.0 {
        return None;
    }
    let pct = (current - previous) / previous * 100.0;
    let direction = if pct > 0.0 {
        Direction::Increase
    } else {
        Direction::Decrease
    };
    Some(Delta { pct, direction })
}

/// Column names for a trade table. `balance` is optional; when absent the
/// balance is exports - imports.
#[derive(Debug, Clone)]
pub struct TradeColumns {
    pub year: &'static str,
    pub category: &'static str,
    pub exports: &'static str,
    pub imports: &'static str,
    pub balance: Option<&'static str>,
}

/// Aggregated flows for one year.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TradeFlow {
    pub exports: f64,
    pub imports: f64,
    pub balance: f64,
}

/// Sum export/import/balance values per year. When the table carries the
/// [`ALL_PRODUCTS`] aggregate category only those rows contribute; otherwise
/// every category row is summed.
pub fn trade_by_year(table: &Table, cols: &TradeColumns) -> BTreeMap<i32, TradeFlow> {
    let has_aggregate = table
        .rows
        .iter()
        .any(|r| r.text(cols.category) == Some(ALL_PRODUCTS));

    let mut yearly: BTreeMap<i32, TradeFlow> = BTreeMap::new();
    for row in &table.rows {
        if has_aggregate && row.text(cols.category) != Some(ALL_PRODUCTS) {
            continue;
        }
        let year = match row.number(cols.year) {
            Some(y) => y as i32,
            None => continue,
        };
        let exports = row.number(cols.exports).unwrap_or(0.0);
        let imports = row.number(cols.imports).unwrap_or(0.0);
        let balance = match cols.balance {
            Some(col) => row.number(col).unwrap_or(exports - imports),
            None => exports - imports,
        };
        let entry = yearly.entry(year).or_default();
        entry.exports += exports;
        entry.imports += imports;
        entry.balance += balance;
    }
    yearly
}

/// Flow direction for product breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Exports,
    Imports,
}

/// One category's share of a year's flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductShare {
    pub category: String,
    pub value: f64,
    pub pct: f64,
}

/// Top `top_n` categories for `year` in the given direction, each with its
/// share of the all-category total. Shares are computed against the full
/// total before truncation, so the returned set sums to at most ~100%.
pub fn product_breakdown(
    table: &Table,
    cols: &TradeColumns,
    year: i32,
    flow: Flow,
    top_n: usize,
) -> Vec<ProductShare> {
    let value_col = match flow {
        Flow::Exports => cols.exports,
        Flow::Imports => cols.imports,
    };

    let mut categories: Vec<(String, f64)> = table
        .rows
        .iter()
        .filter(|r| r.number(cols.year).map(|y| y as i32) == Some(year))
        .filter_map(|r| {
            let name = r.text(cols.category)?;
            if name == ALL_PRODUCTS {
                return None;
            }
            Some((name.to_string(), r.number(value_col)?))
        })
        .collect();

    let total: f64 = categories.iter().map(|(_, v)| v).sum();
    if total == 0.0 {
        return Vec::new();
    }

    categories.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    categories.truncate(top_n);
    categories
        .into_iter()
        .map(|(category, value)| ProductShare {
            category,
            value,
            pct: value / total * 100.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_table;

    fn series(points: &[(i32, f64)]) -> Series {
        points
            .iter()
            .map(|&(y, v)| (TimeKey::year(y), v))
            .collect()
    }

    #[test]
    fn growth_rate_basic() {
        let s = series(&[(2000, 100.0), (2001, 110.0), (2002, 99.0)]);
        let g = growth_rate(&s);
        assert_eq!(g.get(TimeKey::year(2000)), None);
        assert!((g.get(TimeKey::year(2001)).unwrap() - 10.0).abs() < 1e-9);
        assert!((g.get(TimeKey::year(2002)).unwrap() - (-10.0)).abs() < 1e-9);
    }

    #[test]
    fn growth_rate_guards_zero_prior() {
        let s = series(&[(2000, 0.0), (2001, 50.0)]);
        let g = growth_rate(&s);
        assert_eq!(g.get(TimeKey::year(2001)), None);
    }

    #[test]
    fn growth_rate_skips_gap_years() {
        let s = series(&[(2000, 100.0), (2002, 150.0)]);
        let g = growth_rate(&s);
        assert!(g.is_empty());
    }

    #[test]
    fn cumulative_growth_from_base() {
        let s = series(&[(2000, 50.0), (2001, 75.0), (2002, 100.0)]);
        let c = cumulative_growth(&s, TimeKey::year(2000));
        assert_eq!(c.get(TimeKey::year(2000)), Some(0.0));
        assert_eq!(c.get(TimeKey::year(2001)), Some(50.0));
        assert_eq!(c.get(TimeKey::year(2002)), Some(100.0));
    }

    #[test]
    fn cumulative_growth_zero_base_is_empty() {
        let s = series(&[(2000, 0.0), (2001, 10.0)]);
        assert!(cumulative_growth(&s, TimeKey::year(2000)).is_empty());
        assert!(cumulative_growth(&s, TimeKey::year(1999)).is_empty());
    }

    #[test]
    fn moving_average_defined_from_window_boundary() {
        let values: Vec<f64> = (1..=12).map(|v| v as f64).collect();
        let avg = moving_average(&values, 12);
        assert_eq!(avg[10], None);
        assert_eq!(avg[11], Some(6.5));
    }

    #[test]
    fn moving_average_trails_as_data_scrolls() {
        let values: Vec<f64> = (1..=14).map(|v| v as f64).collect();
        let avg = moving_average(&values, 12);
        assert_eq!(avg[12], Some(7.5));
        assert_eq!(avg[13], Some(8.5));
    }

    #[test]
    fn pct_delta_direction() {
        let up = pct_delta(110.0, 100.0).unwrap();
        assert_eq!(up.direction, Direction::Increase);
        assert!((up.pct - 10.0).abs() < 1e-9);

        let down = pct_delta(90.0, 100.0).unwrap();
        assert_eq!(down.direction, Direction::Decrease);

        assert_eq!(pct_delta(5.0, 0.0), None);
    }

    const TRADE_COLS: TradeColumns = TradeColumns {
        year: "Year",
        category: "Product Group",
        exports: "Exports",
        imports: "Imports",
        balance: Some("Balance"),
    };

    #[test]
    fn trade_by_year_restricts_to_aggregate_category() {
        let table = parse_table(
            "Year,Product Group,Exports,Imports,Balance\n\
             2000,All Products,100,250,-150\n\
             2000,Machinery,60,200,-140\n\
             2001,All Products,120,260,-140\n",
            "Year",
        );
        let yearly = trade_by_year(&table, &TRADE_COLS);
        assert_eq!(yearly.len(), 2);
        assert_eq!(yearly[&2000].exports, 100.0);
        assert_eq!(yearly[&2000].balance, -150.0);
        assert_eq!(yearly[&2001].imports, 260.0);
    }

    #[test]
    fn trade_by_year_sums_all_rows_without_aggregate() {
        let table = parse_table(
            "Year,Product Group,Exports,Imports,Balance\n\
             2000,Machinery,60,200,-140\n\
             2000,Textiles,40,50,-10\n",
            "Year",
        );
        let yearly = trade_by_year(&table, &TRADE_COLS);
        assert_eq!(yearly[&2000].exports, 100.0);
        assert_eq!(yearly[&2000].imports, 250.0);
        assert_eq!(yearly[&2000].balance, -150.0);
    }

    #[test]
    fn breakdown_excludes_sentinel_and_truncates() {
        let table = parse_table(
            "Year,Product Group,Exports,Imports\n\
             2000,All Products,100,400\n\
             2000,Machinery,10,200\n\
             2000,Textiles,20,100\n\
             2000,Chemicals,30,100\n",
            "Year",
        );
        let cols = TradeColumns {
            balance: None,
            ..TRADE_COLS
        };
        let top = product_breakdown(&table, &cols, 2000, Flow::Imports, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].category, "Machinery");
        assert!((top[0].pct - 50.0).abs() < 1e-9);
        // truncated to two of three categories, so shares do not reach 100
        let sum: f64 = top.iter().map(|s| s.pct).sum();
        assert!(sum < 100.0);
    }

    #[test]
    fn breakdown_empty_year_is_empty() {
        let table = parse_table("Year,Product Group,Exports,Imports\n2000,Machinery,1,2\n", "Year");
        let cols = TradeColumns {
            balance: None,
            ..TRADE_COLS
        };
        assert!(product_breakdown(&table, &cols, 1999, Flow::Imports, 10).is_empty());
    }
}
