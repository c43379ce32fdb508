//! Operations on the WordPress users table.

use std::{fmt, sync::Arc};

use deadpool::managed::Manager;
use futures::future::BoxFuture;

use crate::{
    auth::{JwtContext, password},
    db::{Connection, Db, DbError, Ident, sql},
    model::{AuthResponse, Key, User},
    prelude::*,
};


/// Access to the users table. Every operation leases exactly one connection
/// for exactly one query.
pub(crate) struct Users<M: Manager = deadpool_postgres::Manager> {
    db: Db<M>,
    table: Ident,
    jwt: Arc<JwtContext>,
}

impl<M> Users<M>
where
    M: Manager,
    M::Type: Connection,
    M::Error: fmt::Display,
{
    pub(crate) fn new(db: Db<M>, table: Ident, jwt: Arc<JwtContext>) -> Self {
        Self { db, table, jwt }
    }

    /// Returns all users in storage order.
    pub(crate) async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let query = sql!("select \"ID\", display_name from " {self.table} ";");
        self.db.with_connection(move |conn| async move {
            conn.query(&query).await?.iter().map(User::from_row).collect()
        }.boxed()).await
    }

    /// Returns the user with the given ID, or `None` if there is no such
    /// user. IDs that are not numeric cannot exist and are treated the same.
    pub(crate) async fn get_user(&self, id: &str) -> Result<Option<User>, DbError> {
        let Ok(key) = id.parse::<Key>() else {
            debug!("Requested user ID '{id}' is not numeric -> not found");
            return Ok(None);
        };

        let query = sql!("select \"ID\", display_name from " {self.table}
            " where \"ID\" = " {key} ";");
        self.db.with_connection(move |conn| async move {
            conn.query(&query).await?.first().map(User::from_row).transpose()
        }.boxed()).await
    }

    /// Checks the given credentials and, if they are correct, issues an
    /// access token for the user. Returns `None` if the user does not exist or
    /// the password is wrong. Callers cannot tell these two cases apart.
    pub(crate) async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<AuthResponse>, DbError> {
        let query = sql!("select \"ID\", user_pass from " {self.table}
            " where user_login = " {username} ";");
        let found = self.db.with_connection(move |conn| async move {
            let rows = conn.query(&query).await?;
            rows.first()
                .map(|row| Ok::<_, DbError>((row.get::<Key>("ID")?, row.get::<String>("user_pass")?)))
                .transpose()
        }.boxed()).await?;

        // The connection is already back in the pool at this point.
        let Some((id, stored_hash)) = found else {
            debug!("Login failed: unknown user");
            return Ok(None);
        };

        // Stored hashes can demand up to 2^30 MD5 rounds.
        let given = password.to_owned();
        let matches = tokio::task::spawn_blocking(move || password::check(&given, &stored_hash))
            .await
            .unwrap_or_else(|e| {
                error!("Password check task failed: {e}");
                false
            });
        if !matches {
            debug!("Login failed: wrong password for user {id}");
            return Ok(None);
        }

        let access_token = self.jwt.sign(id);
        info!("User {id} logged in");
        Ok(Some(AuthResponse { id, access_token }))
    }

    /// Makes sure the users table exists and has all columns we need.
    pub(crate) async fn check_schema(&self) -> Result<(), DbError> {
        let query = sql!("select \"ID\", user_login, user_pass, display_name from "
            {self.table} " limit 0;");
        self.db.with_connection(move |conn| async move {
            conn.query(&query).await.map(|_| ())
        }.boxed()).await
    }
}


/// The user operations the API needs. The API only sees this trait, so it
/// can run on top of any pool manager.
pub(crate) trait UserStore: Send + Sync {
    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, DbError>>;

    fn get_user<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<User>, DbError>>;

    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Option<AuthResponse>, DbError>>;
}

impl<M> UserStore for Users<M>
where
    M: Manager,
    M::Type: Connection,
    M::Error: fmt::Display,
{
    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, DbError>> {
        Users::list_users(self).boxed()
    }

    fn get_user<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<User>, DbError>> {
        Users::get_user(self, id).boxed()
    }

    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Option<AuthResponse>, DbError>> {
        Users::authenticate(self, username, password).boxed()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        sync::{Arc, atomic::{AtomicUsize, Ordering}},
        time::Duration,
    };

    use postgres_protocol::escape::escape_literal;

    use super::Users;
    use crate::{
        auth::JwtContext,
        db::{DbError, Ident, row, tests::util::{FakeManager, assert_all_returned}},
        model::{Key, User},
    };

    type UserRow = (u64, &'static str, &'static str, &'static str);

    /// ID, login, display name, password hash.
    const USERS: &[UserRow] = &[
        // "hunter2"
        (1, "admin", "Administrator", "$P$9abcdefghIhhC7PSFerbk3AZf8FrHG0"),
        // "hunter2", legacy MD5
        (2, "o'brien", "Conan O'Brien", "2ab96390c7dbe3439de74d0c9b0b1767"),
        // "test12345"
        (5, "peter", "Peter Lustig", "$P$BsaltsaltfGPilEgjq43sJuAMpmSmw."),
    ];

    const LIST: &str = r#"select "ID", display_name from "wp_users";"#;
    const BY_ID: &str = r#"select "ID", display_name from "wp_users" where "ID" = "#;
    const BY_LOGIN: &str = r#"select "ID", user_pass from "wp_users" where user_login = "#;

    /// Answers the queries `Users` sends like a database with `USERS` would.
    pub(crate) fn wordpress() -> FakeManager {
        let user_row = |&(id, _, name, _): &UserRow| {
            row! { "ID" => &*id.to_string(), "display_name" => name }
        };

        FakeManager::new(move |query| {
            if query == LIST {
                return Ok(USERS.iter().map(user_row).collect());
            }
            if let Some(rest) = query.strip_prefix(BY_ID) {
                let id = rest.trim_end_matches(';').parse::<u64>()
                    .map_err(|e| DbError::Query(e.to_string()))?;
                return Ok(USERS.iter().filter(|u| u.0 == id).map(user_row).collect());
            }
            if let Some(rest) = query.strip_prefix(BY_LOGIN) {
                return Ok(USERS.iter()
                    .filter(|u| format!("{};", escape_literal(u.1)) == rest)
                    .map(|&(id, _, _, hash)| row! { "ID" => &*id.to_string(), "user_pass" => hash })
                    .collect());
            }
            Err(DbError::Query(format!("syntax error in '{query}'")))
        })
    }

    fn jwt() -> Arc<JwtContext> {
        Arc::new(JwtContext::from_secret(b"test secret", None))
    }

    fn users(manager: FakeManager) -> Users<FakeManager> {
        Users::new(manager.into_db(10), Ident("wp_users".into()), jwt())
    }

    fn user(id: u64, name: &str) -> User {
        User { id: Key(id), name: name.into() }
    }

    #[tokio::test]
    async fn list_users() {
        let users = users(wordpress());
        assert_eq!(users.list_users().await.unwrap(), vec![
            user(1, "Administrator"),
            user(2, "Conan O'Brien"),
            user(5, "Peter Lustig"),
        ]);
    }

    #[tokio::test]
    async fn list_users_is_idempotent() {
        let manager = wordpress();
        let executed = Arc::clone(&manager.executed);
        let users = users(manager);

        let first = users.list_users().await.unwrap();
        let second = users.list_users().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(*executed.lock().unwrap(), vec![LIST, LIST]);
    }

    #[tokio::test]
    async fn list_users_empty_table() {
        let users = users(FakeManager::empty());
        assert_eq!(users.list_users().await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn get_user() {
        let users = users(wordpress());
        assert_eq!(users.get_user("5").await.unwrap(), Some(user(5, "Peter Lustig")));
        assert_eq!(users.get_user("1").await.unwrap(), Some(user(1, "Administrator")));
    }

    #[tokio::test]
    async fn get_user_not_found() {
        let manager = wordpress();
        let executed = Arc::clone(&manager.executed);
        let users = users(manager);

        assert_eq!(users.get_user("999").await.unwrap(), None);
        assert_eq!(executed.lock().unwrap().len(), 1);

        // Non-numeric IDs cannot exist, so the DB is not even asked.
        for id in ["", "abc", "-1", "1.5", "1; drop table wp_users"] {
            assert_eq!(users.get_user(id).await.unwrap(), None, "{id:?}");
        }
        assert_eq!(executed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn authenticate() {
        let jwt = jwt();
        let users = Users::new(wordpress().into_db(10), Ident("wp_users".into()), Arc::clone(&jwt));

        let res = users.authenticate("admin", "hunter2").await.unwrap().unwrap();
        assert_eq!(res.id, Key(1));
        assert_eq!(jwt.verify(&res.access_token).unwrap().id, Key(1));

        let res = users.authenticate("peter", "test12345").await.unwrap().unwrap();
        assert_eq!(jwt.verify(&res.access_token).unwrap().id, Key(5));
    }

    #[tokio::test]
    async fn authenticate_legacy_md5_and_quoted_login() {
        let users = users(wordpress());
        let res = users.authenticate("o'brien", "hunter2").await.unwrap().unwrap();
        assert_eq!(res.id, Key(2));
    }

    #[tokio::test]
    async fn authentication_failures_are_indistinguishable() {
        let users = users(wordpress());
        let wrong_password = users.authenticate("admin", "hunter3").await;
        let unknown_user = users.authenticate("nobody", "hunter2").await;

        assert!(matches!(wrong_password, Ok(None)));
        assert!(matches!(unknown_user, Ok(None)));
        assert_eq!(format!("{wrong_password:?}"), format!("{unknown_user:?}"));
    }

    #[tokio::test]
    async fn authenticate_injection() {
        let manager = wordpress();
        let executed = Arc::clone(&manager.executed);
        let users = users(manager);

        let res = users.authenticate("' or '1'='1", "hunter2").await.unwrap();
        assert!(res.is_none());
        assert_eq!(
            executed.lock().unwrap()[0],
            format!("{BY_LOGIN}''' or ''1''=''1';"),
        );
    }

    #[tokio::test]
    async fn password_check_does_not_block_executor() {
        // 2^18 rounds, long enough for the ticker below to notice.
        const SLOW_HASH: &str = "$P$Gabcdefgh0123456789012345678901";
        let users = users(FakeManager::new(|_| {
            Ok(vec![row! { "ID" => "7", "user_pass" => SLOW_HASH }])
        }));

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        let res = users.authenticate("slow", "hunter2").await.unwrap();
        ticker.abort();

        assert!(res.is_none());
        let ticks = ticks.load(Ordering::SeqCst);
        assert!(ticks >= 3, "executor was blocked during password check ({ticks} ticks)");
        assert_all_returned(&users.db);
    }

    #[tokio::test]
    async fn connections_are_returned() {
        let manager = wordpress();
        let users = users(manager);
        users.list_users().await.unwrap();
        users.get_user("2").await.unwrap();
        users.authenticate("admin", "nope").await.unwrap();
        users.authenticate("admin", "hunter2").await.unwrap();
        assert_all_returned(&users.db);
    }

    #[tokio::test]
    async fn query_errors_propagate() {
        let users = users(FakeManager::new(|_| Err(DbError::Query("relation does not exist".into()))));
        assert!(matches!(users.list_users().await, Err(DbError::Query(_))));
        assert!(matches!(users.get_user("1").await, Err(DbError::Query(_))));
        assert!(matches!(users.authenticate("admin", "hunter2").await, Err(DbError::Query(_))));
        assert_all_returned(&users.db);
    }

    #[tokio::test]
    async fn connection_errors_propagate() {
        let users = users(FakeManager::unreachable());
        assert!(matches!(users.list_users().await, Err(DbError::Connection(_))));
        assert!(matches!(users.authenticate("admin", "hunter2").await, Err(DbError::Connection(_))));
    }

    #[tokio::test]
    async fn unexpected_row_shape() {
        let users = users(FakeManager::new(|_| Ok(vec![row! { "ID" => "1" }])));
        assert!(matches!(users.list_users().await, Err(DbError::Query(_))));
        assert!(matches!(users.get_user("1").await, Err(DbError::Query(_))));
        assert!(matches!(users.authenticate("admin", "hunter2").await, Err(DbError::Query(_))));
    }

    #[tokio::test]
    async fn schema_check() {
        let manager = FakeManager::empty();
        let executed = Arc::clone(&manager.executed);
        users(manager).check_schema().await.unwrap();
        assert_eq!(
            executed.lock().unwrap()[0],
            r#"select "ID", user_login, user_pass, display_name from "wp_users" limit 0;"#,
        );
    }
}
