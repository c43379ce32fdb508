use base64::{Engine as _, engine::general_purpose::STANDARD};
use juniper::GraphQLScalar;

use crate::{
    api::{Context, Id, err::{ApiResult, invalid_input}},
    model::User,
};


/// A node with a globally unique ID. Mostly useful for relay.
#[juniper::graphql_interface(Context = Context, for = [User])]
pub(crate) trait Node {
    fn id(&self) -> Id;
}

#[derive(Debug, Clone, PartialEq, Eq, juniper::GraphQLObject)]
pub(crate) struct PageInfo {
    pub(crate) has_next_page: bool,
    pub(crate) has_previous_page: bool,
    pub(crate) start_cursor: Option<Cursor>,
    pub(crate) end_cursor: Option<Cursor>,
}

/// Opaque cursor for pagination. Serializes as string.
///
/// Cursors point into a list that is completely loaded from the DB: they are
/// the base64 encoded string `arrayconnection:<offset>`. That's the format
/// used by the reference Relay server implementation, so clients that peek
/// into cursors keep working.
#[derive(Debug, Clone, PartialEq, Eq, GraphQLScalar)]
#[graphql(transparent, description = "An opaque cursor used for pagination")]
pub(crate) struct Cursor(String);

impl Cursor {
    const PREFIX: &'static str = "arrayconnection:";

    pub(crate) fn from_offset(offset: usize) -> Self {
        Self(STANDARD.encode(format!("{}{offset}", Self::PREFIX)))
    }

    /// Returns `None` if the cursor was not created by `from_offset`.
    fn to_offset(&self) -> Option<i64> {
        let decoded = STANDARD.decode(&self.0).ok()?;
        std::str::from_utf8(&decoded).ok()?
            .strip_prefix(Self::PREFIX)?
            .parse()
            .ok()
    }
}

/// The standard Relay connection arguments.
#[derive(Debug, Default)]
pub(crate) struct ConnectionArgs {
    pub(crate) first: Option<i32>,
    pub(crate) after: Option<Cursor>,
    pub(crate) last: Option<i32>,
    pub(crate) before: Option<Cursor>,
}

/// A window of a list, selected by `ConnectionArgs`.
#[derive(Debug)]
pub(crate) struct Page<T> {
    pub(crate) edges: Vec<(Cursor, T)>,
    pub(crate) page_info: PageInfo,
}

impl ConnectionArgs {
    /// Negative `first` or `last` are an error. Cursors that cannot be decoded
    /// are not and are just ignored.
    pub(crate) fn validate(&self) -> ApiResult<()> {
        if let Some(first) = self.first.filter(|&n| n < 0) {
            return Err(invalid_input!("`first` must not be negative, but is {first}"));
        }
        if let Some(last) = self.last.filter(|&n| n < 0) {
            return Err(invalid_input!("`last` must not be negative, but is {last}"));
        }

        Ok(())
    }
}

impl<T> Page<T> {
    /// Selects the part of `items` described by `args`, which have to be
    /// validated already.
    ///
    /// Cursor offsets come from clients, so they are clamped to the list
    /// before doing any arithmetic with them.
    pub(crate) fn from_vec(items: Vec<T>, args: ConnectionArgs) -> Self {
        let len = items.len() as i64;
        let offset = |cursor: &Option<Cursor>| {
            cursor.as_ref().and_then(Cursor::to_offset).map(|n| n.clamp(-1, len))
        };
        let after_offset = offset(&args.after);
        let before_offset = offset(&args.before);

        let mut start = after_offset.map_or(0, |n| n + 1);
        let mut end = before_offset.unwrap_or(len);
        if let Some(first) = args.first {
            end = end.min(start.saturating_add(i64::from(first)));
        }
        if let Some(last) = args.last {
            start = start.max(end.saturating_sub(i64::from(last)));
        }

        let from = start.clamp(0, len) as usize;
        let to = end.clamp(0, len) as usize;
        let edges = items.into_iter()
            .enumerate()
            .skip(from)
            .take(to.saturating_sub(from))
            .map(|(i, item)| (Cursor::from_offset(i), item))
            .collect::<Vec<_>>();

        let lower_bound = after_offset.map_or(0, |n| n + 1);
        let upper_bound = before_offset.unwrap_or(len);
        let page_info = PageInfo {
            has_next_page: args.first.is_some() && end < upper_bound,
            has_previous_page: args.last.is_some() && start > lower_bound,
            start_cursor: edges.first().map(|(c, _)| c.clone()),
            end_cursor: edges.last().map(|(c, _)| c.clone()),
        };

        Self { edges, page_info }
    }
}
