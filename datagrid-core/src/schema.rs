//! Table schema model: versioned, immutable column layouts.

use crate::error::{GridError, Result};
use crate::types::ColumnType;

/// A single column definition within a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, unique within a schema, case-sensitive.
    pub name: String,
    /// Declared type.
    pub column_type: ColumnType,
    /// Decimal scale; zero for non-decimal types.
    pub scale: i32,
    /// Precision; zero when not applicable.
    pub precision: i32,
    /// Whether this column is part of the primary key.
    pub key: bool,
    /// Whether this column participates in the colocation hash.
    /// Colocation columns are always key columns.
    pub colocation: bool,
}

impl Column {
    /// Creates a value column with default scale and precision.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            scale: 0,
            precision: 0,
            key: false,
            colocation: false,
        }
    }

    /// Creates a key column that participates in colocation hashing.
    pub fn key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            scale: 0,
            precision: 0,
            key: true,
            colocation: true,
        }
    }
}

/// Which subset of a record's columns a wire message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuplePart {
    /// Key columns only.
    Key,
    /// Value columns only.
    Value,
    /// All columns.
    KeyAndValue,
}

/// An immutable, versioned column layout for one table.
///
/// Key columns occupy indices `[0, key_column_count)`; value columns follow.
/// A schema never changes once built; layout changes on the server always
/// produce a new version.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    version: i32,
    columns: Vec<Column>,
    key_column_count: usize,
    colocation_indexes: Vec<usize>,
}

impl Schema {
    /// Builds a schema, validating the column layout.
    ///
    /// Fails when key columns do not form a prefix of the column list, when
    /// a colocation column is not a key column, or when a column name is
    /// duplicated.
    pub fn new(version: i32, columns: Vec<Column>) -> Result<Self> {
        if version < 0 {
            return Err(GridError::Format(format!(
                "schema version must be non-negative, got {}",
                version
            )));
        }

        let key_column_count = columns.iter().take_while(|c| c.key).count();

        for (i, col) in columns.iter().enumerate() {
            if col.key && i >= key_column_count {
                return Err(GridError::Format(format!(
                    "key column '{}' at index {} does not form a key prefix",
                    col.name, i
                )));
            }
            if col.colocation && !col.key {
                return Err(GridError::Format(format!(
                    "colocation column '{}' is not a key column",
                    col.name
                )));
            }
            if columns[..i].iter().any(|other| other.name == col.name) {
                return Err(GridError::Format(format!(
                    "duplicate column name '{}'",
                    col.name
                )));
            }
        }

        if key_column_count == 0 && !columns.is_empty() {
            return Err(GridError::Format(
                "schema must contain at least one key column".to_string(),
            ));
        }

        let colocation_indexes = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.colocation)
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            version,
            columns,
            key_column_count,
            colocation_indexes,
        })
    }

    /// Returns the schema version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Returns all columns in schema order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the number of key columns.
    pub fn key_column_count(&self) -> usize {
        self.key_column_count
    }

    /// Returns the number of value columns.
    pub fn value_column_count(&self) -> usize {
        self.columns.len() - self.key_column_count
    }

    /// Returns true if the column at the given index participates in the
    /// colocation hash.
    pub fn is_colocation_index(&self, index: usize) -> bool {
        self.colocation_indexes.contains(&index)
    }

    /// Returns the `(start, count)` index range for the given tuple part.
    pub fn range(&self, part: TuplePart) -> (usize, usize) {
        match part {
            TuplePart::Key => (0, self.key_column_count),
            TuplePart::Value => (self.key_column_count, self.value_column_count()),
            TuplePart::KeyAndValue => (0, self.columns.len()),
        }
    }

    /// Returns a view of this schema restricted to the given part.
    pub fn slice(&self, part: TuplePart) -> SchemaSlice<'_> {
        SchemaSlice { schema: self, part }
    }
}

/// A computed `(schema, part)` view; owns no data.
#[derive(Debug, Clone, Copy)]
pub struct SchemaSlice<'a> {
    schema: &'a Schema,
    part: TuplePart,
}

impl<'a> SchemaSlice<'a> {
    /// Returns the underlying schema.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Returns the part this slice covers.
    pub fn part(&self) -> TuplePart {
        self.part
    }

    /// Returns the index of the first column in the slice.
    pub fn start(&self) -> usize {
        self.schema.range(self.part).0
    }

    /// Returns the number of columns in the slice.
    pub fn len(&self) -> usize {
        self.schema.range(self.part).1
    }

    /// Returns true if the slice covers no columns.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the columns covered by this slice, in schema order.
    pub fn columns(&self) -> impl Iterator<Item = &'a Column> {
        let (start, count) = self.schema.range(self.part);
        self.schema.columns[start..start + count].iter()
    }
}
