use std::{fs, io::{self, Write}, path::PathBuf, sync::Arc};

use futures::future::{self, BoxFuture};
use juniper::IntrospectionFormat;

use crate::{
    api,
    auth::Session,
    db::DbError,
    model::{AuthResponse, User},
    prelude::*,
    users::UserStore,
};


/// Writes the GraphQL schema to `target` or stdout, either in SDL or as JSON
/// result of the introspection query.
pub(crate) fn run(target: Option<&PathBuf>, json: bool) -> Result<()> {
    let root = api::root_node();
    let schema = if json { introspection_json(&root)? } else { root.as_sdl() };

    match target {
        Some(path) => fs::write(path, schema)
            .with_context(|| format!("failed to write schema to '{}'", path.display()))?,
        None => io::stdout().write_all(schema.as_bytes())?,
    }

    Ok(())
}

fn introspection_json(root: &api::RootNode) -> Result<String> {
    let context = api::Context {
        users: Arc::new(NoDatabase),
        session: Session::anonymous(),
    };

    let (value, errors) = juniper::introspect(root, &context, IntrospectionFormat::All)
        .map_err(|e| anyhow!("failed to run introspection query: {e}"))?;
    if !errors.is_empty() {
        bail!("introspection query returned errors: {errors:?}");
    }

    let out = serde_json::to_string_pretty(&serde_json::json!({ "data": value }))?;
    Ok(out + "\n")
}

/// Introspection never loads users, so no database is needed.
struct NoDatabase;

impl NoDatabase {
    fn error<T: Send + 'static>() -> BoxFuture<'static, Result<T, DbError>> {
        future::ready(Err(DbError::Connection("no database while exporting the schema".into())))
            .boxed()
    }
}

impl UserStore for NoDatabase {
    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, DbError>> {
        Self::error()
    }

    fn get_user<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<Option<User>, DbError>> {
        Self::error()
    }

    fn authenticate<'a>(
        &'a self,
        _: &'a str,
        _: &'a str,
    ) -> BoxFuture<'a, Result<Option<AuthResponse>, DbError>> {
        Self::error()
    }
}


#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::introspection_json;
    use crate::api;

    #[test]
    fn introspection_result() {
        let json = introspection_json(&api::root_node()).unwrap();
        let json: Value = serde_json::from_str(&json).unwrap();
        let schema = &json["data"]["__schema"];

        assert_eq!(schema["queryType"]["name"], "Query");
        assert_eq!(schema["mutationType"]["name"], "Mutation");

        let types = schema["types"].as_array().unwrap();
        for name in ["User", "Viewer", "Node", "UserConnection", "Cursor", "LoginMutationPayload"] {
            assert!(types.iter().any(|t| t["name"] == name), "missing type {name}");
        }
    }
}
