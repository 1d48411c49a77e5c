// src/parse/mod.rs
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A single parsed cell. Values that parse entirely as a finite number become
/// [`Cell::Number`]; everything else keeps the original text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            Cell::Number(_) => None,
        }
    }
}

/// Coerce a raw field: if the trimmed string parses as a finite number it
/// becomes a number, otherwise the original text is kept as-is.
pub fn coerce(raw: &str) -> Cell {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::Text(raw.to_string()),
    }
}

/// One row of a parsed table, keyed by the header names of its table.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Row {
    cells: BTreeMap<String, Cell>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Numeric value of a column, if present and numeric.
    pub fn number(&self, column: &str) -> Option<f64> {
        self.cells.get(column).and_then(Cell::as_number)
    }

    /// Text value of a column, if present and non-numeric.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.cells.get(column).and_then(Cell::as_text)
    }
}

/// A parsed table: header names in file order plus the rows that survived the
/// required-key check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// Column names from the header line, order preserved, names verbatim.
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse comma-delimited text into a [`Table`].
///
/// The first line is the header; each later line is split positionally against
/// it. Rows whose `required` column does not coerce to a number are dropped,
/// which also filters the blank trailing line most exports end with. Fields
/// are split on bare commas; quoted fields containing the delimiter are not
/// supported.
pub fn parse_table(text: &str, required: &str) -> Table {
    let mut lines = text.lines();
    let headers: Vec<String> = match lines.next() {
        Some(header) => header.split(',').map(|h| h.trim().to_string()).collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').collect();
        let mut cells = BTreeMap::new();
        for (i, header) in headers.iter().enumerate() {
            if let Some(&raw) = fields.get(i) {
                cells.insert(header.clone(), coerce(raw));
            }
        }
        let row = Row { cells };
        // Rows without a numeric required key are dropped, not surfaced.
        if row.number(required).is_some() {
            rows.push(row);
        } else {
            debug!(line = line_no + 2, required, "dropping row with non-numeric key");
        }
    }

    Table { headers, rows }
}
