//! In-memory tabular data shared by the database and file batch flows

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::RawRecord;
use crate::{Error, Result};

/// Scalar value of one table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// True for values treated as "missing" by the normalizer:
    /// null, empty text, the literal text `nan`, and floating-point NaN.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => s.is_empty() || s == "nan",
            Cell::Float(f) => f.is_nan(),
            Cell::Bool(_) | Cell::Integer(_) => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Parse a textual cell the way the CSV reader types its columns
    ///
    /// Empty text becomes `Null`; integers and floats are recognized; anything
    /// else stays text.
    pub fn infer(raw: &str) -> Cell {
        if raw.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Cell::Integer(i);
        }
        // "nan"/"inf" parse as f64; keep them textual so they survive a round trip
        if raw.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(f) = raw.parse::<f64>() {
                return Cell::Float(f);
            }
        }
        Cell::Text(raw.to_string())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

/// Ordered columns plus ordered rows of cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with nulls
    pub fn push_row(&mut self, mut row: Vec<Cell>) -> Result<()> {
        if row.len() > self.columns.len() {
            return Err(Error::FileFormat(format!(
                "row {} has {} values but the table has {} columns",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            )));
        }
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Replace `-` with `_` in every column name
    pub fn normalize_column_names(&mut self) {
        for column in &mut self.columns {
            if column.contains('-') {
                *column = column.replace('-', "_");
            }
        }
    }

    /// Overwrite the named column, or append it when absent
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::Validation(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Row `idx` as a name → value mapping
    pub fn record(&self, idx: usize) -> RawRecord {
        let mut record = RawRecord::new();
        if let Some(row) = self.rows.get(idx) {
            for (name, value) in self.columns.iter().zip(row) {
                record.insert(name.clone(), value.clone());
            }
        }
        record
    }
}
