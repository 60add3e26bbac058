//! Domain models for the gradebook transformation pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Term`] - One of the three fixed grading periods
//! - [`Cell`] - A scalar cell value (empty, text or number)
//! - [`Column`] - A named column with its derived [`ColumnTag`]
//! - [`Table`] - Ordered columns sharing one row count
//! - [`CategoryGroup`] - Coded columns sharing a category label
//! - [`ReportMetadata`] - Teacher/subject/course/level printed above the workbook table

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::TableError;

// =============================================================================
// Term
// =============================================================================

/// A grading period. Order is fixed: Term1, Term2, Term3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Term1,
    Term2,
    Term3,
}

impl Term {
    /// All terms in their fixed order.
    pub const ALL: [Term; 3] = [Term::Term1, Term::Term2, Term::Term3];

    /// Label as it appears in Schoology column names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::Term1 => "Term1",
            Term::Term2 => "Term2",
            Term::Term3 => "Term3",
        }
    }

    /// The following term, `None` for the last one.
    pub fn next(&self) -> Option<Term> {
        match self {
            Term::Term1 => Some(Term::Term2),
            Term::Term2 => Some(Term::Term3),
            Term::Term3 => None,
        }
    }

    /// Column-name prefix for this term, e.g. `"Term1 - 2025"`.
    pub fn marker(&self, year: &str) -> String {
        format!("{} - {}", self.as_str(), year)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Term {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "term1" | "1" => Ok(Term::Term1),
            "term2" | "2" => Ok(Term::Term2),
            "term3" | "3" => Ok(Term::Term3),
            other => Err(format!("unknown term '{}', expected Term1, Term2 or Term3", other)),
        }
    }
}

// =============================================================================
// Cell
// =============================================================================

/// A single scalar value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    /// A numeric field. `raw` is the text it was read from and is what gets
    /// written back to CSV.
    Number { value: f64, raw: String },
}

impl Cell {
    /// A computed number, rendered without a trailing `.0` when integral.
    pub fn number(value: f64) -> Self {
        let raw = if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            value.to_string()
        };
        Cell::Number { value, raw }
    }

    /// Classify a raw CSV field.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Cell::Number {
                value,
                raw: trimmed.to_string(),
            },
            _ => Cell::Text(raw.to_string()),
        }
    }

    /// Numeric coercion: anything that is not a number is missing.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) | Cell::Number { raw: s, .. } => f.write_str(s),
        }
    }
}

// =============================================================================
// Columns
// =============================================================================

/// Structured information derived from a column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnTag {
    /// Student identity, overall score, or anything without a category code.
    #[default]
    General,
    /// A grade column whose name starts with a category code such as `AV01`.
    Coded {
        code: String,
        prefix: String,
        sequence: u8,
        category: String,
    },
    /// Row-wise mean of a category group.
    Average { category: String },
    /// Blank separator after a category group.
    Spacer,
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub tag: ColumnTag,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            tag: ColumnTag::General,
            cells,
        }
    }

    pub fn with_tag(mut self, tag: ColumnTag) -> Self {
        self.tag = tag;
        self
    }

    /// A blank spacer column of `rows` empty cells.
    pub fn spacer(rows: usize) -> Self {
        Self {
            name: String::new(),
            tag: ColumnTag::Spacer,
            cells: vec![Cell::Empty; rows],
        }
    }

    pub fn is_spacer(&self) -> bool {
        matches!(self.tag, ColumnTag::Spacer)
    }

    pub fn is_average(&self) -> bool {
        matches!(self.tag, ColumnTag::Average { .. })
    }
}

// =============================================================================
// Table
// =============================================================================

/// Ordered columns of equal length.
///
/// Non-spacer names are unique; spacers all have a blank name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// An empty table expecting `row_count` cells per column.
    pub fn new(row_count: usize) -> Self {
        Self {
            columns: Vec::new(),
            row_count,
        }
    }

    /// Build a table, checking both invariants.
    pub fn from_columns(row_count: usize, columns: Vec<Column>) -> Result<Self, TableError> {
        let mut table = Self::new(row_count);
        for column in columns {
            table.push(column)?;
        }
        Ok(table)
    }

    /// Append a column.
    pub fn push(&mut self, column: Column) -> Result<(), TableError> {
        if column.cells.len() != self.row_count {
            return Err(TableError::RaggedColumn {
                name: column.name,
                expected: self.row_count,
                actual: column.cells.len(),
            });
        }
        if !column.is_spacer() && self.position(&column.name).is_some() {
            return Err(TableError::DuplicateColumn(column.name));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Index of the first non-spacer column with this name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| !c.is_spacer() && c.name == name)
    }

    /// Cells of row `index`, in column order.
    pub fn row(&self, index: usize) -> Vec<&Cell> {
        self.columns.iter().map(|c| &c.cells[index]).collect()
    }

    /// Keep the columns at `indices`, in table order. Out-of-range indices are ignored.
    pub fn retain_indices(self, indices: &[usize]) -> Table {
        let keep: HashSet<usize> = indices.iter().copied().collect();
        let row_count = self.row_count;
        let columns = self
            .columns
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, c)| c)
            .collect();
        Table { columns, row_count }
    }
}

// =============================================================================
// Category groups
// =============================================================================

/// Coded columns sharing a category, in sequence order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub prefix: String,
    pub category: String,
    pub columns: Vec<String>,
    pub average: Option<String>,
}

// =============================================================================
// Report metadata
// =============================================================================

/// Values printed in the workbook header block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub teacher: String,
    pub subject: String,
    pub course: String,
    pub level: String,
    pub generated_on: NaiveDate,
}

impl ReportMetadata {
    /// Metadata dated today (local clock).
    pub fn new(
        teacher: impl Into<String>,
        subject: impl Into<String>,
        course: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            teacher: teacher.into(),
            subject: subject.into(),
            course: course.into(),
            level: level.into(),
            generated_on: Local::now().date_naive(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.generated_on = date;
        self
    }

    /// Generation date as `yy-mm-dd`.
    pub fn date_label(&self) -> String {
        self.generated_on.format("%y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, values: &[&str]) -> Column {
        Column::new(name, values.iter().map(|v| Cell::parse(v)).collect())
    }

    #[test]
    fn test_term_parsing_and_order() {
        assert_eq!("term2".parse::<Term>().unwrap(), Term::Term2);
        assert_eq!(" Term3 ".parse::<Term>().unwrap(), Term::Term3);
        assert_eq!("1".parse::<Term>().unwrap(), Term::Term1);
        assert!("Term4".parse::<Term>().is_err());
        assert_eq!(Term::Term1.next(), Some(Term::Term2));
        assert_eq!(Term::Term3.next(), None);
        assert_eq!(Term::Term1.marker("2025"), "Term1 - 2025");
    }

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse("  "), Cell::Empty);
        assert_eq!(Cell::parse("85"), Cell::number(85.0));
        assert_eq!(Cell::parse(" 7.5 "), Cell::number(7.5));
        assert_eq!(Cell::parse("Ana"), Cell::Text("Ana".into()));
        assert_eq!(Cell::parse("NaN"), Cell::Text("NaN".into()));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::number(85.0).to_string(), "85");
        assert_eq!(Cell::number(85.5).to_string(), "85.5");
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::Text("x".into()).to_string(), "x");
    }

    #[test]
    fn test_numeric_cells_keep_source_text() {
        let id = Cell::parse("123456789012345678");
        assert_eq!(id.to_string(), "123456789012345678");

        let score = Cell::parse("85.50");
        assert_eq!(score.as_number(), Some(85.5));
        assert_eq!(score.to_string(), "85.50");

        let exp = Cell::parse("1e3");
        assert_eq!(exp.as_number(), Some(1000.0));
        assert_eq!(exp.to_string(), "1e3");
    }

    #[test]
    fn test_table_rejects_duplicates() {
        let err = Table::from_columns(1, vec![col("A", &["1"]), col("A", &["2"])]).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("A".into()));
    }

    #[test]
    fn test_table_rejects_ragged_columns() {
        let err = Table::from_columns(2, vec![col("A", &["1"])]).unwrap_err();
        assert!(matches!(err, TableError::RaggedColumn { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_spacers_may_repeat() {
        let table = Table::from_columns(
            1,
            vec![col("A", &["1"]), Column::spacer(1), Column::spacer(1)],
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.position(""), None);
    }

    #[test]
    fn test_retain_indices_keeps_table_order() {
        let table = Table::from_columns(
            1,
            vec![col("A", &["1"]), col("B", &["2"]), col("C", &["3"])],
        )
        .unwrap();
        let kept = table.retain_indices(&[2, 0]);
        assert_eq!(kept.column_names(), vec!["A", "C"]);
        assert_eq!(kept.row_count(), 1);
    }

    #[test]
    fn test_metadata_date_label() {
        let meta = ReportMetadata::new("Ms. Ruiz", "Math", "5A", "Primaria")
            .with_date(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
        assert_eq!(meta.date_label(), "25-03-07");
    }
}
