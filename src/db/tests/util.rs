//! An in-memory stand-in for the Postgres pool manager, so that the pool and
//! repository logic can be tested without a database.

use std::{fmt, sync::{Arc, Mutex, atomic::{AtomicUsize, Ordering}}};

use deadpool::managed::{Manager, Metrics, Pool, RecycleResult};

use crate::db::{Connection, Db, DbError, Row, SqlQuery};


type Handler = Arc<dyn Fn(&str) -> Result<Vec<Row>, DbError> + Send + Sync>;

/// Creates fake connections that answer queries by calling a handler with
/// the query text. All executed queries are recorded.
pub(crate) struct FakeManager {
    handler: Handler,
    fail_create: bool,
    pub(crate) executed: Arc<Mutex<Vec<String>>>,
    pub(crate) created: Arc<AtomicUsize>,
}

impl FakeManager {
    pub(crate) fn new(
        handler: impl Fn(&str) -> Result<Vec<Row>, DbError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            fail_create: false,
            executed: Default::default(),
            created: Default::default(),
        }
    }

    /// A manager whose connections return no rows for every query.
    pub(crate) fn empty() -> Self {
        Self::new(|_| Ok(vec![]))
    }

    /// A manager that can never establish a connection.
    pub(crate) fn unreachable() -> Self {
        Self { fail_create: true, ..Self::empty() }
    }

    pub(crate) fn into_db(self, max_size: usize) -> Db<FakeManager> {
        let pool = Pool::builder(self)
            .max_size(max_size)
            .build()
            .expect("failed to build fake pool");
        Db::new(pool)
    }
}

pub(crate) struct FakeConn {
    handler: Handler,
    executed: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug)]
pub(crate) struct FakeError;

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection refused")
    }
}

impl Manager for FakeManager {
    type Type = FakeConn;
    type Error = FakeError;

    async fn create(&self) -> Result<FakeConn, FakeError> {
        if self.fail_create {
            return Err(FakeError);
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConn {
            handler: Arc::clone(&self.handler),
            executed: Arc::clone(&self.executed),
        })
    }

    async fn recycle(&self, _: &mut FakeConn, _: &Metrics) -> RecycleResult<FakeError> {
        Ok(())
    }
}

impl Connection for FakeConn {
    async fn query(&self, query: &SqlQuery) -> Result<Vec<Row>, DbError> {
        self.executed.lock().unwrap().push(query.as_str().to_owned());
        (self.handler)(query.as_str())
    }
}

/// Asserts that no connection is currently leased.
#[track_caller]
pub(crate) fn assert_all_returned(db: &Db<FakeManager>) {
    let status = db.status();
    assert_eq!(status.available, status.size, "connection leaked: {status:?}");
}
