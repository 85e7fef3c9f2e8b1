//! The accumulating wide table: one row per ticker, one column per metric.
//!
//! Rows are addressed by ticker, never by position, so removing a row never
//! shifts where later writes land. Cells are `Option<f64>`; `None` is an
//! absent value.

use std::collections::{BTreeSet, HashMap};

/// A named column of cells, one per row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Wide table keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    tickers: Vec<String>,
    row_index: HashMap<String, usize>,
    columns: Vec<TableColumn>,
    column_index: HashMap<String, usize>,
    /// Day offsets whose market columns have been merged.
    offsets: BTreeSet<i64>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.tickers.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Tickers in row order.
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn contains_ticker(&self, ticker: &str) -> bool {
        self.row_index.contains_key(ticker)
    }

    pub fn row_of(&self, ticker: &str) -> Option<usize> {
        self.row_index.get(ticker).copied()
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.column_index
            .get(name)
            .map(|&i| self.columns[i].values.as_slice())
    }

    /// Cell value; `None` for an unknown ticker, unknown column or absent cell.
    pub fn get(&self, ticker: &str, column: &str) -> Option<f64> {
        let row = self.row_of(ticker)?;
        self.column(column)?.get(row).copied().flatten()
    }

    /// Append a row. Existing columns get `None` for it.
    ///
    /// Returns `false` (and changes nothing) if the ticker already has a row.
    pub fn push_row(&mut self, ticker: &str) -> bool {
        if self.row_index.contains_key(ticker) {
            return false;
        }
        self.row_index.insert(ticker.to_string(), self.tickers.len());
        self.tickers.push(ticker.to_string());
        for column in &mut self.columns {
            column.values.push(None);
        }
        true
    }

    /// Insert a column, replacing any column of the same name in place.
    ///
    /// `values` is padded or truncated to the row count.
    pub fn insert_column(&mut self, name: impl Into<String>, mut values: Vec<Option<f64>>) {
        let name = name.into();
        debug_assert_eq!(values.len(), self.row_count(), "column '{name}' length");
        values.resize(self.row_count(), None);
        match self.column_index.get(&name) {
            Some(&i) => self.columns[i].values = values,
            None => {
                self.column_index.insert(name.clone(), self.columns.len());
                self.columns.push(TableColumn { name, values });
            }
        }
    }

    /// Insert a column of `None` cells.
    pub fn insert_empty_column(&mut self, name: impl Into<String>) {
        let values = vec![None; self.row_count()];
        self.insert_column(name, values);
    }

    /// Write one cell. Returns `false` if the ticker or column is unknown.
    pub fn set(&mut self, ticker: &str, column: &str, value: Option<f64>) -> bool {
        let (Some(row), Some(&col)) = (self.row_of(ticker), self.column_index.get(column)) else {
            return false;
        };
        self.columns[col].values[row] = value;
        true
    }

    /// Remove a column. Returns `false` if it did not exist.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(i) = self.column_index.remove(name) else {
            return false;
        };
        self.columns.remove(i);
        for (j, column) in self.columns.iter().enumerate().skip(i) {
            self.column_index.insert(column.name.clone(), j);
        }
        true
    }

    /// Remove a ticker's row. Returns `false` if it did not exist.
    pub fn remove_row(&mut self, ticker: &str) -> bool {
        if !self.contains_ticker(ticker) {
            return false;
        }
        self.retain_rows(|t| t != ticker);
        true
    }

    /// Keep only the rows whose ticker satisfies `keep`, preserving order.
    pub fn retain_rows<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        let mask: Vec<bool> = self.tickers.iter().map(|t| keep(t)).collect();
        if mask.iter().all(|&k| k) {
            return;
        }

        let mut it = mask.iter();
        self.tickers.retain(|_| *it.next().unwrap_or(&true));
        for column in &mut self.columns {
            let mut it = mask.iter();
            column.values.retain(|_| *it.next().unwrap_or(&true));
        }

        self.row_index = self
            .tickers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
    }

    /// Record that market columns for `offset` have been merged.
    pub fn record_offset(&mut self, offset: i64) {
        self.offsets.insert(offset);
    }

    /// Merged day offsets, ascending.
    pub fn offsets(&self) -> &BTreeSet<i64> {
        &self.offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new();
        for t in ["AAA", "BBB", "CCC"] {
            table.push_row(t);
        }
        table.insert_column("close", vec![Some(1.0), Some(2.0), Some(3.0)]);
        table.insert_column("open", vec![Some(0.5), None, Some(2.5)]);
        table
    }

    #[test]
    fn push_row_rejects_duplicates_and_pads_columns() {
        let mut table = sample();
        assert!(!table.push_row("AAA"));
        assert!(table.push_row("DDD"));
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.column("close").unwrap()[3], None);
    }

    #[test]
    fn remove_row_keeps_key_addressing_intact() {
        let mut table = sample();
        assert!(table.remove_row("BBB"));
        assert_eq!(table.tickers(), &["AAA".to_string(), "CCC".to_string()]);
        assert_eq!(table.get("CCC", "close"), Some(3.0));
        assert_eq!(table.row_of("CCC"), Some(1));
        assert!(!table.remove_row("BBB"));
    }

    #[test]
    fn drop_column_reindexes_later_columns() {
        let mut table = sample();
        table.insert_column("volume", vec![Some(10.0), Some(20.0), Some(30.0)]);
        assert!(table.drop_column("close"));
        assert!(!table.has_column("close"));
        assert_eq!(table.get("BBB", "volume"), Some(20.0));
        assert!(table.set("AAA", "volume", Some(11.0)));
        assert_eq!(table.get("AAA", "volume"), Some(11.0));
        assert!(!table.drop_column("close"));
    }

    #[test]
    fn insert_column_replaces_same_name() {
        let mut table = sample();
        table.insert_column("close", vec![None, None, Some(9.0)]);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.get("CCC", "close"), Some(9.0));
        assert_eq!(table.get("AAA", "close"), None);
    }

    #[test]
    fn set_on_unknown_cell_is_rejected() {
        let mut table = sample();
        assert!(!table.set("ZZZ", "close", Some(1.0)));
        assert!(!table.set("AAA", "nope", Some(1.0)));
    }
}
