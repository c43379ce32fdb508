use std::{fmt, str::FromStr, sync::Arc};

use super::DbError;


/// A single result row. The simple query protocol returns all values as text,
/// so that's how we store them. Typed access happens in `get`, which is also
/// where a row that doesn't have the expected shape is rejected.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Creates a new row. `columns` and `values` need to have the same length.
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Option<String>>) -> Self {
        assert_eq!(columns.len(), values.len(), "number of columns and values differ");
        Self { columns, values }
    }

    /// Returns the value of the column with the given name, parsed as `T`.
    /// Fails if the column does not exist, is `NULL` or cannot be parsed.
    pub(crate) fn get<T>(&self, column: &str) -> Result<T, DbError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let idx = self.columns.iter()
            .position(|c| c == column)
            .ok_or_else(|| DbError::Query(format!("result has no column '{column}'")))?;
        let raw = self.values[idx].as_deref()
            .ok_or_else(|| DbError::Query(format!("column '{column}' is unexpectedly NULL")))?;

        raw.parse().map_err(|e| {
            DbError::Query(format!("could not parse value of column '{column}': {e}"))
        })
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.columns.iter().zip(&self.values))
            .finish()
    }
}

/// Convenience macro to create a `Row` in tests: `row! { "ID" => "1", "x" => None }`.
#[cfg(test)]
macro_rules! row {
    ($($col:literal => $val:expr),* $(,)?) => {
        $crate::db::Row::new(
            vec![$(String::from($col)),*].into(),
            vec![$(Option::<&str>::from($val).map(String::from)),*],
        )
    };
}

#[cfg(test)]
pub(crate) use row;
