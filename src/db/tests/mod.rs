use std::{
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    time::Duration,
};

use deadpool::{Runtime, managed::Pool};
use tokio::sync::{mpsc, oneshot};

use crate::{
    db::{Connection, Db, DbError, sql},
    prelude::*,
};
use self::util::{FakeManager, assert_all_returned};

pub(crate) mod util;


#[tokio::test]
async fn releases_connection_after_success() {
    let db = FakeManager::empty().into_db(10);
    let rows = db.with_connection(|conn| async move {
        conn.query(&sql!("select 1;")).await
    }.boxed()).await.unwrap();

    assert!(rows.is_empty());
    assert_eq!(db.status().size, 1);
    assert_all_returned(&db);
}

#[tokio::test]
async fn releases_connection_after_error() {
    let db = FakeManager::new(|_| Err(DbError::Query("syntax error".into()))).into_db(10);
    let res = db.with_connection(|conn| async move {
        conn.query(&sql!("selec 1;")).await
    }.boxed()).await;

    assert!(matches!(res, Err(DbError::Query(_))));
    assert_all_returned(&db);
}

#[tokio::test]
async fn releases_connection_after_failing_mid_operation() {
    let db = FakeManager::empty().into_db(10);
    let res: Result<(), _> = db.with_connection(|conn| async move {
        conn.query(&sql!("select 1;")).await?;
        Err(DbError::Query("row has unexpected shape".into()))
    }.boxed()).await;

    assert!(res.is_err());
    assert_all_returned(&db);
}

#[tokio::test(flavor = "multi_thread")]
async fn releases_connection_after_panic() {
    let db = FakeManager::empty().into_db(10);
    let db2 = db.clone();
    let join = tokio::spawn(async move {
        db2.with_connection(|_| async move {
            if true {
                panic!("operation blew up");
            }
            Ok(())
        }.boxed()).await
    }).await;

    assert!(join.unwrap_err().is_panic());
    assert_all_returned(&db);
}

#[tokio::test]
async fn connections_are_reused() {
    let manager = FakeManager::empty();
    let created = Arc::clone(&manager.created);
    let db = manager.into_db(10);
    for _ in 0..5 {
        db.with_connection(|conn| async move {
            conn.query(&sql!("select 1;")).await
        }.boxed()).await.unwrap();
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_database_yields_connection_error() {
    let db = FakeManager::unreachable().into_db(10);
    let called = AtomicBool::new(false);
    let res = db.with_connection(|_| {
        called.store(true, Ordering::SeqCst);
        async { Ok(()) }.boxed()
    }).await;

    assert!(matches!(res, Err(DbError::Connection(_))));
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn acquire_timeout_yields_connection_error() {
    let pool = Pool::builder(FakeManager::empty())
        .max_size(1)
        .wait_timeout(Some(Duration::from_millis(20)))
        .runtime(Runtime::Tokio1)
        .build()
        .unwrap();
    let db = Db::new(pool);

    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let holder = {
        let db = db.clone();
        tokio::spawn(async move {
            db.with_connection(|_| async move {
                started_tx.send(()).unwrap();
                let _ = release_rx.await;
                Ok(())
            }.boxed()).await
        })
    };
    started_rx.await.unwrap();

    let called = AtomicBool::new(false);
    let res = db.with_connection(|_| {
        called.store(true, Ordering::SeqCst);
        async { Ok(()) }.boxed()
    }).await;
    assert!(matches!(res, Err(DbError::Connection(_))));
    assert!(!called.load(Ordering::SeqCst));

    release_tx.send(()).unwrap();
    holder.await.unwrap().unwrap();
    assert_all_returned(&db);
}

#[tokio::test(flavor = "multi_thread")]
async fn eleventh_operation_waits_for_release() {
    let db = FakeManager::empty().into_db(10);

    // Start ten operations that each hold their connection until released.
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let mut releases = Vec::new();
    let mut holders = Vec::new();
    for i in 0..10 {
        let (release_tx, release_rx) = oneshot::channel::<()>();
        releases.push(release_tx);
        let db = db.clone();
        let started_tx = started_tx.clone();
        holders.push(tokio::spawn(async move {
            db.with_connection(move |_| async move {
                started_tx.send(i).unwrap();
                let _ = release_rx.await;
                Ok(i)
            }.boxed()).await
        }));
    }
    for _ in 0..10 {
        started_rx.recv().await.unwrap();
    }
    assert_eq!(db.status().available, 0);

    // The eleventh has to wait.
    let eleventh_ran = Arc::new(AtomicBool::new(false));
    let mut eleventh = {
        let db = db.clone();
        let eleventh_ran = Arc::clone(&eleventh_ran);
        tokio::spawn(async move {
            db.with_connection(move |conn| async move {
                eleventh_ran.store(true, Ordering::SeqCst);
                conn.query(&sql!("select 11;")).await
            }.boxed()).await
        })
    };
    let still_waiting = tokio::time::timeout(Duration::from_millis(100), &mut eleventh).await;
    assert!(still_waiting.is_err(), "eleventh operation did not wait");
    assert!(!eleventh_ran.load(Ordering::SeqCst));
    assert_eq!(db.status().waiting, 1);

    // Releasing a single connection lets it proceed.
    releases.remove(0).send(()).unwrap();
    let rows = tokio::time::timeout(Duration::from_secs(5), eleventh).await
        .expect("eleventh operation did not proceed after release")
        .unwrap()
        .unwrap();
    assert!(rows.is_empty());
    assert!(eleventh_ran.load(Ordering::SeqCst));

    for release in releases {
        release.send(()).unwrap();
    }
    for holder in holders {
        holder.await.unwrap().unwrap();
    }
    assert_eq!(db.status().size, 10);
    assert_all_returned(&db);
}
