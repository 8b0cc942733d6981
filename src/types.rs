//! Core types for cellscope.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::Encoding;

/// One cell returned by the remote store for a row under a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Column qualifier.
    pub qualifier: String,
    /// Raw cell value.
    pub value: Bytes,
}

impl Cell {
    /// Create a new cell.
    pub fn new(qualifier: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            qualifier: qualifier.into(),
            value: value.into(),
        }
    }
}

/// Immutable column data of one row under one family.
///
/// `columns[i]` always names the value at `values[i]`. Column names are
/// unique within the row. A row with zero columns is a valid, final fetch
/// result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    family: String,
    key: Bytes,
    columns: Vec<String>,
    values: Vec<Bytes>,
}

impl Row {
    /// Build a row from cells in the order the store returned them.
    ///
    /// A repeated qualifier replaces the earlier value in place.
    pub fn from_cells(
        family: impl Into<String>,
        key: impl Into<Bytes>,
        cells: impl IntoIterator<Item = Cell>,
    ) -> Self {
        let cells = cells.into_iter();
        let (lower, _) = cells.size_hint();
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(lower);
        let mut columns: Vec<String> = Vec::with_capacity(lower);
        let mut values: Vec<Bytes> = Vec::with_capacity(lower);

        for cell in cells {
            match positions.get(&cell.qualifier).copied() {
                Some(idx) => values[idx] = cell.value,
                None => {
                    positions.insert(cell.qualifier.clone(), columns.len());
                    columns.push(cell.qualifier);
                    values.push(cell.value);
                }
            }
        }

        Self {
            family: family.into(),
            key: key.into(),
            columns,
            values,
        }
    }

    /// Create an empty row.
    pub fn empty(family: impl Into<String>, key: impl Into<Bytes>) -> Self {
        Self::from_cells(family, key, std::iter::empty())
    }

    /// Family this row was fetched under.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Raw row key.
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    /// Column names in store order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw values, parallel to [`Row::columns`].
    pub fn values(&self) -> &[Bytes] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw value of a column.
    pub fn value(&self, column: &str) -> Option<&Bytes> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Iterate over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Render every value under `encoding`.
    pub fn render(&self, encoding: Encoding) -> Vec<String> {
        self.values.iter().map(|v| encoding.encode(v)).collect()
    }
}

/// A cached row together with its values rendered under one encoding.
#[derive(Debug, Clone)]
pub struct RowView {
    row: Arc<Row>,
    encoding: Encoding,
    values: Vec<String>,
}

impl RowView {
    /// Render `row` under `encoding`.
    pub fn new(row: Arc<Row>, encoding: Encoding) -> Self {
        let values = row.render(encoding);
        Self {
            row,
            encoding,
            values,
        }
    }

    /// The shared raw row.
    pub fn row(&self) -> &Arc<Row> {
        &self.row
    }

    /// Encoding the values were rendered with.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        self.row.columns()
    }

    /// Rendered values, parallel to [`RowView::columns`].
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }

    /// Re-render the same raw row under another encoding.
    pub fn with_encoding(&self, encoding: Encoding) -> RowView {
        RowView::new(Arc::clone(&self.row), encoding)
    }
}
