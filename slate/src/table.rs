use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table row {row} does not exist")]
    RowOutOfRange { row: usize },
    #[error("malformed table line: {line:?}")]
    MalformedLine { line: String },
    #[error("the text contains no table")]
    Empty,
}

/// A 2-D grid of text cells, independent of storage format. Indices are
/// 0-based; rows may have different column counts.
pub trait Table {
    fn row_count(&self) -> usize;
    fn column_count_in_row(&self, row: usize) -> usize;
    fn cell_contents(&self, col: usize, row: usize) -> &str;
    fn set_cell_contents(&mut self, col: usize, row: usize, contents: String);
    /// Appends a trailing cell to one row, growing that row only.
    fn append_cell(&mut self, row: usize, contents: String) -> Result<(), TableError>;
}

/// Table backed by pipe-delimited text, one `|cell|cell|` line per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTable {
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut rows = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let inner = line
                .strip_prefix('|')
                .and_then(|rest| rest.strip_suffix('|'))
                .ok_or_else(|| TableError::MalformedLine {
                    line: line.to_owned(),
                })?;
            let cells: Vec<String> = inner
                .split('|')
                .map(|cell| cell.trim().to_owned())
                .collect();
            rows.push(cells);
        }
        if rows.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(Self { rows })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            out.push('|');
            out.push_str(&row.join("|"));
            out.push_str("|\n");
        }
        out
    }
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Table for TextTable {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_count_in_row(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, Vec::len)
    }

    fn cell_contents(&self, col: usize, row: usize) -> &str {
        &self.rows[row][col]
    }

    fn set_cell_contents(&mut self, col: usize, row: usize, contents: String) {
        self.rows[row][col] = contents;
    }

    fn append_cell(&mut self, row: usize, contents: String) -> Result<(), TableError> {
        match self.rows.get_mut(row) {
            Some(cells) => {
                cells.push(contents);
                Ok(())
            }
            None => Err(TableError::RowOutOfRange { row }),
        }
    }
}
