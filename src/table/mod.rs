//! Tabular input and report storage
//!
//! A [`Table`] is a set of named columns of strings. The pipeline reads its input
//! rows from one table and appends its report to another.
//!
//! ## Submodules
//!
//! - [`sqlite`] - [`SqliteTable`], a grid persisted in a SQLite file

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::TableError;

pub mod sqlite;

pub use sqlite::{SqliteTable, TableMode};

/// Column-oriented table contract
#[async_trait]
pub trait Table: Send + Sync {
    /// Header names in column order
    fn headers(&self) -> Vec<String>;

    /// Every value under `header`, or an empty vector when the header is absent
    fn get_column(&self, header: &str) -> Vec<String>;

    /// Extend an existing column after its last cell, or add a new column
    fn add_column(&mut self, header: &str, values: &[String]);

    /// Persist buffered changes
    ///
    /// # Errors
    /// [`TableError::ReadOnly`] when the table was opened read-only
    async fn save(&mut self) -> std::result::Result<(), TableError>;
}

/// In-memory column store shared by the table backends
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grid {
    headers: Vec<String>,
    columns: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl Grid {
    /// Empty grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from `(header, values)` pairs
    ///
    /// Empty headers are skipped.
    ///
    /// # Errors
    /// [`TableError::DuplicateHeader`] if a header occurs twice
    pub fn from_columns<I, H>(columns: I) -> std::result::Result<Self, TableError>
    where
        I: IntoIterator<Item = (H, Vec<String>)>,
        H: Into<String>,
    {
        let mut grid = Grid::new();
        for (header, values) in columns {
            let header = header.into();
            if header.is_empty() {
                continue;
            }
            if grid.index.contains_key(&header) {
                return Err(TableError::DuplicateHeader(header));
            }
            grid.push_column(header, values);
        }
        Ok(grid)
    }

    /// Header names in column order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows (the longest column)
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Column padded with empty strings to [`Grid::row_count`]
    pub fn column(&self, header: &str) -> Vec<String> {
        let Some(&i) = self.index.get(header) else {
            return Vec::new();
        };
        let mut values = self.columns[i].clone();
        values.resize(self.row_count(), String::new());
        values
    }

    /// Stored cells of a column, without padding
    pub fn raw_column(&self, header: &str) -> Option<&[String]> {
        self.index.get(header).map(|&i| self.columns[i].as_slice())
    }

    /// Append to an existing column or create a new one
    pub fn add_column(&mut self, header: &str, values: &[String]) {
        match self.index.get(header) {
            Some(&i) => self.columns[i].extend_from_slice(values),
            None => self.push_column(header.to_string(), values.to_vec()),
        }
    }

    /// Write one cell, growing the column with empty strings as needed
    pub(crate) fn set_cell(&mut self, header: &str, row: usize, value: String) {
        let Some(&i) = self.index.get(header) else {
            return;
        };
        let column = &mut self.columns[i];
        if column.len() <= row {
            column.resize(row + 1, String::new());
        }
        column[row] = value;
    }

    fn push_column(&mut self, header: String, values: Vec<String>) {
        self.index.insert(header.clone(), self.headers.len());
        self.headers.push(header);
        self.columns.push(values);
    }
}

/// [`Table`] held entirely in memory
///
/// Saving a writable table is a no-op; saving a read-only one fails.
#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    grid: Grid,
    read_only: bool,
}

impl MemoryTable {
    /// Empty writable table
    pub fn new() -> Self {
        Self::default()
    }

    /// Writable table over an existing grid
    pub fn from_grid(grid: Grid) -> Self {
        Self {
            grid,
            read_only: false,
        }
    }

    /// Read-only table over an existing grid
    pub fn read_only(grid: Grid) -> Self {
        Self {
            grid,
            read_only: true,
        }
    }

    /// Underlying grid
    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

#[async_trait]
impl Table for MemoryTable {
    fn headers(&self) -> Vec<String> {
        self.grid.headers().to_vec()
    }

    fn get_column(&self, header: &str) -> Vec<String> {
        self.grid.column(header)
    }

    fn add_column(&mut self, header: &str, values: &[String]) {
        self.grid.add_column(header, values);
    }

    async fn save(&mut self) -> std::result::Result<(), TableError> {
        if self.read_only {
            return Err(TableError::ReadOnly);
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn unknown_header_reads_empty() {
        let table = MemoryTable::new();
        assert!(table.get_column("BRnum").is_empty());
    }

    #[test]
    fn new_column_starts_at_first_row() {
        let mut grid = Grid::new();
        grid.add_column("BRnum", &strings(&["A", "B"]));
        grid.add_column("Error", &strings(&["x"]));

        assert_eq!(grid.column("BRnum"), strings(&["A", "B"]));
        assert_eq!(grid.column("Error"), strings(&["x", ""]));
        assert_eq!(grid.raw_column("Error"), Some(&strings(&["x"])[..]));
        assert_eq!(grid.row_count(), 2);
    }

    #[test]
    fn existing_columns_extend_in_step() {
        let mut grid = Grid::from_columns([
            ("BRnum", strings(&["A"])),
            ("Downloaded", strings(&["Yes"])),
        ])
        .unwrap();

        grid.add_column("BRnum", &strings(&["B", "C"]));
        grid.add_column("Downloaded", &strings(&["No", "Yes"]));

        assert_eq!(grid.column("BRnum"), strings(&["A", "B", "C"]));
        assert_eq!(grid.column("Downloaded"), strings(&["Yes", "No", "Yes"]));
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let err = Grid::from_columns([("BRnum", vec![]), ("BRnum", vec![])]).unwrap_err();
        assert!(matches!(err, TableError::DuplicateHeader(h) if h == "BRnum"));
    }

    #[test]
    fn empty_headers_are_skipped() {
        let grid = Grid::from_columns([("", strings(&["x"])), ("A", vec![])]).unwrap();
        assert_eq!(grid.headers(), &["A".to_string()]);
    }

    #[test]
    fn set_cell_pads_gaps() {
        let mut grid = Grid::from_columns([("A", vec![])]).unwrap();
        grid.set_cell("A", 2, "z".into());
        assert_eq!(grid.column("A"), strings(&["", "", "z"]));
        grid.set_cell("missing", 0, "ignored".into());
        assert!(grid.column("missing").is_empty());
    }

    #[tokio::test]
    async fn read_only_memory_table_refuses_save() {
        let mut table = MemoryTable::read_only(Grid::new());
        assert!(matches!(table.save().await, Err(TableError::ReadOnly)));

        let mut table = MemoryTable::new();
        table.add_column("A", &strings(&["1"]));
        table.save().await.unwrap();
        assert_eq!(table.headers(), strings(&["A"]));
    }
}
