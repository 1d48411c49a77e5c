// src/series/mod.rs
use chrono::Month;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::parse::Table;

/// Temporal key used to align records across series: a year, optionally
/// qualified by a month (1..=12). Annual keys order before monthly keys of the
/// same year, and monthly keys order by month index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeKey {
    pub year: i32,
    pub month: Option<u32>,
}

impl TimeKey {
    pub fn year(year: i32) -> Self {
        TimeKey { year, month: None }
    }

    pub fn month(year: i32, month: u32) -> Self {
        TimeKey {
            year,
            month: Some(month),
        }
    }

    /// Build a monthly key from a month name ("January".."December", full or
    /// three-letter). Returns None for unrecognized names.
    pub fn from_month_name(year: i32, name: &str) -> Option<Self> {
        let month: Month = name.trim().parse().ok()?;
        Some(TimeKey::month(year, month.number_from_month()))
    }

    /// The immediately preceding key: previous year for annual keys, previous
    /// month (rolling into December of the prior year) for monthly keys.
    pub fn prev(&self) -> TimeKey {
        match self.month {
            None => TimeKey::year(self.year - 1),
            Some(1) => TimeKey::month(self.year - 1, 12),
            Some(m) => TimeKey::month(self.year, m - 1),
        }
    }
}

/// All annual keys in the closed range [start, end].
pub fn year_range(start: i32, end: i32) -> Vec<TimeKey> {
    (start..=end).map(TimeKey::year).collect()
}

/// All monthly keys in the closed year range [start, end].
pub fn month_range(start: i32, end: i32) -> Vec<TimeKey> {
    (start..=end)
        .flat_map(|y| (1..=12).map(move |m| TimeKey::month(y, m)))
        .collect()
}

/// One entity's time series: a keyed map so repeated range queries cost a
/// lookup per key instead of a scan per call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    points: BTreeMap<TimeKey, f64>,
}

impl Series {
    pub fn new() -> Self {
        Series::default()
    }

    /// Build an annual series from two numeric columns of a parsed table.
    /// Rows where either column is absent or non-numeric are skipped.
    pub fn from_table(table: &Table, year_col: &str, value_col: &str) -> Series {
        let mut points = BTreeMap::new();
        for row in &table.rows {
            if let (Some(year), Some(value)) = (row.number(year_col), row.number(value_col)) {
                points.insert(TimeKey::year(year as i32), value);
            }
        }
        Series { points }
    }

    /// Build a monthly series from a year column, a month-name column, and a
    /// numeric value column.
    pub fn from_monthly_table(
        table: &Table,
        year_col: &str,
        month_col: &str,
        value_col: &str,
    ) -> Series {
        let mut points = BTreeMap::new();
        for row in &table.rows {
            let key = row
                .number(year_col)
                .zip(row.text(month_col))
                .and_then(|(y, m)| TimeKey::from_month_name(y as i32, m));
            if let (Some(key), Some(value)) = (key, row.number(value_col)) {
                points.insert(key, value);
            }
        }
        Series { points }
    }

    pub fn insert(&mut self, key: TimeKey, value: f64) {
        self.points.insert(key, value);
    }

    pub fn get(&self, key: TimeKey) -> Option<f64> {
        self.points.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_key(&self) -> Option<TimeKey> {
        self.points.keys().next().copied()
    }

    pub fn last_key(&self) -> Option<TimeKey> {
        self.points.keys().next_back().copied()
    }

    /// Keys in ascending temporal order.
    pub fn keys(&self) -> impl Iterator<Item = TimeKey> + '_ {
        self.points.keys().copied()
    }

    /// (key, value) pairs in ascending temporal order.
    pub fn iter(&self) -> impl Iterator<Item = (TimeKey, f64)> + '_ {
        self.points.iter().map(|(k, v)| (*k, *v))
    }

    /// Values in ascending temporal order.
    pub fn values(&self) -> Vec<f64> {
        self.points.values().copied().collect()
    }

    /// A copy with every value multiplied by `factor` (unit conversion).
    pub fn scaled(&self, factor: f64) -> Series {
        self.iter().map(|(k, v)| (k, v * factor)).collect()
    }
}

impl FromIterator<(TimeKey, f64)> for Series {
    fn from_iter<I: IntoIterator<Item = (TimeKey, f64)>>(iter: I) -> Self {
        Series {
            points: iter.into_iter().collect(),
        }
    }
}

/// One aligned record: the key plus one slot per source, `None` where that
/// source has no data at the key. `None` means "no data", never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedPoint {
    pub key: TimeKey,
    pub values: Vec<Option<f64>>,
}

/// Multiple series joined over a common key sequence, monotonic by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedSeries {
    /// Source names, positionally matching `JoinedPoint::values`.
    pub sources: Vec<String>,
    pub points: Vec<JoinedPoint>,
}

impl JoinedSeries {
    /// Values for one named source across all points.
    pub fn column(&self, source: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.sources.iter().position(|s| s == source)?;
        Some(self.points.iter().map(|p| p.values[idx]).collect())
    }

    /// A copy with hidden sources forced to missing. Filtering happens after
    /// alignment; the underlying series are untouched.
    pub fn masked(&self, visible: &[bool]) -> JoinedSeries {
        let points = self
            .points
            .iter()
            .map(|p| JoinedPoint {
                key: p.key,
                values: p
                    .values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| if visible.get(i).copied().unwrap_or(true) { *v } else { None })
                    .collect(),
            })
            .collect();
        JoinedSeries {
            sources: self.sources.clone(),
            points,
        }
    }
}

/// Join the named series over an explicit key sequence. Every key appears in
/// the output even when absent from some (or all) sources.
pub fn align(sources: &[(&str, &Series)], keys: &[TimeKey]) -> JoinedSeries {
    let points = keys
        .iter()
        .map(|&key| JoinedPoint {
            key,
            values: sources.iter().map(|(_, s)| s.get(key)).collect(),
        })
        .collect();
    JoinedSeries {
        sources: sources.iter().map(|(n, _)| n.to_string()).collect(),
        points,
    }
}

/// Join annual series over the closed year range [start, end].
pub fn align_years(sources: &[(&str, &Series)], start: i32, end: i32) -> JoinedSeries {
    align(sources, &year_range(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(i32, f64)]) -> Series {
        points
            .iter()
            .map(|&(y, v)| (TimeKey::year(y), v))
            .collect()
    }

    #[test]
    fn alignment_marks_missing_keys_explicitly() {
        let a = series(&[(2000, 10.0), (2001, 20.0)]);
        let b = series(&[(2001, 5.0)]);

        let joined = align_years(&[("a", &a), ("b", &b)], 2000, 2001);
        assert_eq!(joined.sources, vec!["a", "b"]);
        assert_eq!(joined.points.len(), 2);
        assert_eq!(joined.points[0].key, TimeKey::year(2000));
        assert_eq!(joined.points[0].values, vec![Some(10.0), None]);
        assert_eq!(joined.points[1].values, vec![Some(20.0), Some(5.0)]);
    }

    #[test]
    fn alignment_covers_range_absent_from_all_sources() {
        let a = series(&[(2000, 1.0), (2003, 4.0)]);
        let joined = align_years(&[("a", &a)], 2000, 2003);
        assert_eq!(joined.points.len(), 4);
        assert_eq!(joined.points[1].values, vec![None]);
        assert_eq!(joined.points[2].values, vec![None]);
    }

    #[test]
    fn masking_hides_a_source_without_touching_the_series() {
        let a = series(&[(2000, 10.0)]);
        let b = series(&[(2000, 5.0)]);
        let joined = align_years(&[("a", &a), ("b", &b)], 2000, 2000);

        let masked = joined.masked(&[true, false]);
        assert_eq!(masked.points[0].values, vec![Some(10.0), None]);
        // original join untouched
        assert_eq!(joined.points[0].values, vec![Some(10.0), Some(5.0)]);
        assert_eq!(b.get(TimeKey::year(2000)), Some(5.0));
    }

    #[test]
    fn monthly_keys_sort_within_year() {
        let mut s = Series::new();
        s.insert(TimeKey::month(2001, 1), 1.0);
        s.insert(TimeKey::month(2000, 12), 2.0);
        s.insert(TimeKey::month(2000, 2), 3.0);
        let keys: Vec<TimeKey> = s.keys().collect();
        assert_eq!(
            keys,
            vec![
                TimeKey::month(2000, 2),
                TimeKey::month(2000, 12),
                TimeKey::month(2001, 1)
            ]
        );
    }

    #[test]
    fn monthly_alignment_over_a_year_range() {
        let mut s = Series::new();
        s.insert(TimeKey::month(2020, 1), 1.0);
        s.insert(TimeKey::month(2020, 12), 2.0);

        let joined = align(&[("balance", &s)], &month_range(2020, 2020));
        assert_eq!(joined.points.len(), 12);
        assert_eq!(joined.points[0].values, vec![Some(1.0)]);
        assert_eq!(joined.points[5].values, vec![None]);
        assert_eq!(joined.points[11].values, vec![Some(2.0)]);
    }

    #[test]
    fn month_name_parsing() {
        assert_eq!(
            TimeKey::from_month_name(2020, "January"),
            Some(TimeKey::month(2020, 1))
        );
        assert_eq!(
            TimeKey::from_month_name(2020, "December"),
            Some(TimeKey::month(2020, 12))
        );
        assert_eq!(TimeKey::from_month_name(2020, "Smarch"), None);
    }

    #[test]
    fn prev_rolls_months_across_year_boundary() {
        assert_eq!(TimeKey::month(2020, 1).prev(), TimeKey::month(2019, 12));
        assert_eq!(TimeKey::month(2020, 6).prev(), TimeKey::month(2020, 5));
        assert_eq!(TimeKey::year(2020).prev(), TimeKey::year(2019));
    }

    #[test]
    fn from_table_skips_rows_missing_the_value() {
        let table = crate::parse::parse_table("Year,GDP\n2000,100\n2001,n/a\n", "Year");
        let s = Series::from_table(&table, "Year", "GDP");
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(TimeKey::year(2000)), Some(100.0));
        assert_eq!(s.get(TimeKey::year(2001)), None);
    }
}
