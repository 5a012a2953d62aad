//! Materialized query results with cursor navigation and typed access.

use std::fmt;
use std::str::FromStr;

use mysql_wire::ResultBuffer;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy)]
enum Cursor {
    BeforeFirst,
    At(u64),
    Done,
}

/// Result of one executed statement.
///
/// SELECT-shaped statements own a fully materialized result set and expose
/// cursor navigation over it; everything else carries only an affected-row
/// count. The handle exclusively owns the underlying buffer, which is
/// released exactly once when the handle is dropped.
pub struct QueryResult {
    buffer: Option<Box<dyn ResultBuffer>>,
    field_names: Vec<String>,
    row_count: u64,
    affected_rows: u64,
    cursor: Cursor,
}

impl QueryResult {
    pub(crate) fn with_rows(buffer: Box<dyn ResultBuffer>) -> Self {
        let field_names = buffer.field_names().to_vec();
        let row_count = buffer.row_count();
        tracing::trace!(rows = row_count, fields = field_names.len(), "materialized result set");
        Self {
            buffer: Some(buffer),
            field_names,
            row_count,
            affected_rows: 0,
            cursor: Cursor::BeforeFirst,
        }
    }

    pub(crate) fn without_rows(affected_rows: u64) -> Self {
        Self {
            buffer: None,
            field_names: Vec::new(),
            row_count: 0,
            affected_rows,
            cursor: Cursor::BeforeFirst,
        }
    }

    /// Move the cursor to the next row. Returns false once the result is
    /// exhausted (or never had rows).
    pub fn advance(&mut self) -> bool {
        if self.buffer.is_none() {
            return false;
        }
        let next = match self.cursor {
            Cursor::BeforeFirst => 0,
            Cursor::At(idx) => idx + 1,
            Cursor::Done => return false,
        };
        if next < self.row_count {
            self.cursor = Cursor::At(next);
            true
        } else {
            self.cursor = Cursor::Done;
            false
        }
    }

    /// Reposition the cursor before the first row. Only materialized
    /// results support rewinding.
    pub fn rewind(&mut self) -> bool {
        if self.buffer.is_some() {
            self.cursor = Cursor::BeforeFirst;
            true
        } else {
            false
        }
    }

    /// Number of fields per row.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    /// Number of materialized rows.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Rows affected by a non-SELECT statement.
    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// Field names in select-list order.
    #[must_use]
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Whether the result has zero rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Whether the statement produced a result set at all.
    #[must_use]
    pub fn has_result_set(&self) -> bool {
        self.buffer.is_some()
    }

    fn cell(&self, index: usize) -> Result<Option<&str>, ClientError> {
        if index >= self.field_count() {
            return Err(ClientError::OutOfRange {
                index,
                count: self.field_count(),
            });
        }
        let idx = match self.cursor {
            Cursor::At(idx) => idx,
            _ => return Err(ClientError::NoCurrentRow),
        };
        let row = self
            .buffer
            .as_ref()
            .and_then(|buffer| buffer.row(idx))
            .ok_or(ClientError::NoCurrentRow)?;
        Ok(row[index].as_deref())
    }

    /// Resolve a field name to its index. Case-sensitive, first match
    /// wins.
    pub fn field_index(&self, name: &str) -> Result<usize, ClientError> {
        self.field_names
            .iter()
            .position(|field| field == name)
            .ok_or_else(|| ClientError::UnknownField(name.to_string()))
    }

    /// String value of the cell at `index`; NULL becomes the empty string.
    pub fn get_string(&self, index: usize) -> Result<String, ClientError> {
        Ok(self.cell(index)?.unwrap_or_default().to_string())
    }

    /// Integer value of the cell at `index`; NULL and unparsable text
    /// become 0.
    pub fn get_int(&self, index: usize) -> Result<i32, ClientError> {
        Ok(parse_or_zero(self.cell(index)?))
    }

    /// 64-bit integer value of the cell at `index`; NULL and unparsable
    /// text become 0.
    pub fn get_long(&self, index: usize) -> Result<i64, ClientError> {
        Ok(parse_or_zero(self.cell(index)?))
    }

    /// Double value of the cell at `index`; NULL and unparsable text
    /// become 0.0.
    pub fn get_double(&self, index: usize) -> Result<f64, ClientError> {
        Ok(parse_or_zero(self.cell(index)?))
    }

    /// Whether the cell at `index` is SQL NULL.
    pub fn is_null(&self, index: usize) -> Result<bool, ClientError> {
        Ok(self.cell(index)?.is_none())
    }

    /// [`get_string`](Self::get_string) by field name.
    pub fn get_string_by_name(&self, name: &str) -> Result<String, ClientError> {
        self.get_string(self.field_index(name)?)
    }

    /// [`get_int`](Self::get_int) by field name.
    pub fn get_int_by_name(&self, name: &str) -> Result<i32, ClientError> {
        self.get_int(self.field_index(name)?)
    }

    /// [`get_long`](Self::get_long) by field name.
    pub fn get_long_by_name(&self, name: &str) -> Result<i64, ClientError> {
        self.get_long(self.field_index(name)?)
    }

    /// [`get_double`](Self::get_double) by field name.
    pub fn get_double_by_name(&self, name: &str) -> Result<f64, ClientError> {
        self.get_double(self.field_index(name)?)
    }

    /// [`is_null`](Self::is_null) by field name.
    pub fn is_null_by_name(&self, name: &str) -> Result<bool, ClientError> {
        self.is_null(self.field_index(name)?)
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("has_result_set", &self.has_result_set())
            .field("fields", &self.field_names)
            .field("rows", &self.row_count)
            .field("affected_rows", &self.affected_rows)
            .finish()
    }
}

fn parse_or_zero<T: FromStr + Default>(cell: Option<&str>) -> T {
    match cell {
        None => T::default(),
        Some(text) => text.parse().unwrap_or_else(|_| {
            tracing::warn!(
                value = text,
                target = std::any::type_name::<T>(),
                "cell did not parse, returning zero value"
            );
            T::default()
        }),
    }
}
