//! Building SQL queries with properly escaped values.
//!
//! All queries sent to the database are plain text (we use the simple query
//! protocol). To make sure no untrusted value ends up in a query unescaped,
//! queries can only be created with the `sql!` macro, which escapes every
//! interpolated parameter. The resulting `SqlQuery` is opaque and is the only
//! thing `Connection::query` accepts.

use std::fmt;

use postgres_protocol::escape::{escape_identifier, escape_literal};


/// A query where all parameters have been escaped. Can only be created via
/// `sql!`.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct SqlQuery(String);

impl SqlQuery {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SqlQuery({:?})", self.0)
    }
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Builder used by `sql!`. Do not use directly.
#[doc(hidden)]
pub(crate) struct SqlBuilder(String);

impl SqlBuilder {
    pub(crate) fn new() -> Self {
        Self(String::new())
    }

    /// Only accepts `'static` strings, which in practice means string
    /// literals. Everything dynamic has to go through `param`.
    pub(crate) fn literal(&mut self, fragment: &'static str) {
        self.0.push_str(fragment);
    }

    pub(crate) fn param(&mut self, value: &(impl SqlParam + ?Sized)) {
        value.write_escaped(&mut self.0);
    }

    pub(crate) fn finish(self) -> SqlQuery {
        SqlQuery(self.0)
    }
}

/// Values that can be interpolated into a query.
pub(crate) trait SqlParam {
    /// Appends the escaped SQL representation of `self` to `out`.
    fn write_escaped(&self, out: &mut String);
}

impl SqlParam for str {
    fn write_escaped(&self, out: &mut String) {
        out.push_str(&escape_literal(self));
    }
}

impl SqlParam for String {
    fn write_escaped(&self, out: &mut String) {
        self.as_str().write_escaped(out);
    }
}

impl<T: SqlParam + ?Sized> SqlParam for &T {
    fn write_escaped(&self, out: &mut String) {
        (**self).write_escaped(out);
    }
}

impl<T: SqlParam> SqlParam for Option<T> {
    fn write_escaped(&self, out: &mut String) {
        match self {
            Some(v) => v.write_escaped(out),
            None => out.push_str("NULL"),
        }
    }
}

impl SqlParam for bool {
    fn write_escaped(&self, out: &mut String) {
        out.push_str(if *self { "TRUE" } else { "FALSE" });
    }
}

macro_rules! impl_sql_param_for_ints {
    ($($ty:ty),*) => {
        $(
            impl SqlParam for $ty {
                fn write_escaped(&self, out: &mut String) {
                    use std::fmt::Write;
                    write!(out, "{self}").expect("writing to string cannot fail");
                }
            }
        )*
    };
}

impl_sql_param_for_ints!(i16, i32, i64, u16, u32, u64);

impl SqlParam for crate::model::Key {
    fn write_escaped(&self, out: &mut String) {
        self.0.write_escaped(out);
    }
}

/// An SQL identifier (e.g. a table name) that is not known at compile time.
/// Interpolated as quoted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ident(pub(crate) String);

impl SqlParam for Ident {
    fn write_escaped(&self, out: &mut String) {
        out.push_str(&escape_identifier(&self.0));
    }
}


/// Builds an `SqlQuery` from string literals and parameters. Parameters are
/// wrapped in `{}` and are escaped via `SqlParam`. Example:
///
/// ```ignore
/// sql!("select display_name from " {table} " where user_login = " {username} ";")
/// ```
macro_rules! sql {
    (@acc $b:ident;) => {};
    (@acc $b:ident; $lit:literal $($rest:tt)*) => {
        $b.literal($lit);
        $crate::db::query::sql!(@acc $b; $($rest)*);
    };
    (@acc $b:ident; { $param:expr } $($rest:tt)*) => {
        $b.param(&$param);
        $crate::db::query::sql!(@acc $b; $($rest)*);
    };
    ($($t:tt)+) => {{
        let mut builder = $crate::db::query::SqlBuilder::new();
        $crate::db::query::sql!(@acc builder; $($t)+);
        builder.finish()
    }};
}

pub(crate) use sql;
