//! # Statement Executor
//!
//! Every repository statement passes through here. The executor picks the
//! connection (ambient transaction or pool), enforces the context deadline,
//! logs and counts the statement.
//!
//! ```text
//! Statement::build(&sea_query stmt)  →  (sql, bound values)
//!        │
//!        ▼
//! ctx.transaction()?
//!   Some(tx) → lock tx slot → tx connection      route = "tx"
//!   None     → pool.acquire()                    route = "pool"
//!        │
//!        ▼
//! fetch_all | fetch_optional | execute   (timeout_at ctx deadline)
//! ```
//!
//! The same routing is public through [`DbClient::execute`],
//! [`DbClient::fetch_all`] and [`DbClient::fetch_optional`] for statements the
//! repository templates can't express.

use std::future::Future;

use sea_query::SqliteQueryBuilder;
use sea_query_binder::{SqlxBinder, SqlxValues};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use tokio::time::Instant;
use tracing::debug;

use crate::context::DbContext;
use crate::error::{DbError, DbResult};
use crate::pool::DbClient;

/// SQL text plus its bound values, ready to run.
pub(crate) struct Statement {
    sql: String,
    values: SqlxValues,
}

impl Statement {
    pub(crate) fn build<S: SqlxBinder>(statement: &S) -> Self {
        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        Statement { sql, values }
    }

    #[cfg(test)]
    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }
}

// =============================================================================
// Routed Statements
// =============================================================================

impl DbClient {
    /// Runs a caller-built statement in the context's transaction (or on the
    /// pool) and returns the affected-row count.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let stmt = Query::insert()
    ///     .into_table(Alias::new("audit"))
    ///     .columns([Alias::new("action")])
    ///     .values_panic(["created".into()])
    ///     .to_owned();
    /// client.execute(&tx_ctx, &stmt).await?;
    /// ```
    pub async fn execute<S: SqlxBinder>(&self, ctx: &DbContext, statement: &S) -> DbResult<u64> {
        execute(self, ctx, Statement::build(statement)).await
    }

    /// Runs a caller-built query through the same routing and returns all rows.
    pub async fn fetch_all<S: SqlxBinder>(
        &self,
        ctx: &DbContext,
        statement: &S,
    ) -> DbResult<Vec<SqliteRow>> {
        fetch_all(self, ctx, Statement::build(statement)).await
    }

    /// Runs a caller-built query through the same routing; `Ok(None)` when it
    /// returned no row.
    pub async fn fetch_optional<S: SqlxBinder>(
        &self,
        ctx: &DbContext,
        statement: &S,
    ) -> DbResult<Option<SqliteRow>> {
        fetch_optional(self, ctx, Statement::build(statement)).await
    }
}

enum Mode {
    All,
    Optional,
    Execute,
}

enum Output {
    Rows(Vec<SqliteRow>),
    Row(Option<SqliteRow>),
    Affected(u64),
}

pub(crate) async fn fetch_all(
    client: &DbClient,
    ctx: &DbContext,
    statement: Statement,
) -> DbResult<Vec<SqliteRow>> {
    match route(client, ctx, statement, Mode::All).await? {
        Output::Rows(rows) => Ok(rows),
        _ => Err(unexpected_output()),
    }
}

pub(crate) async fn fetch_optional(
    client: &DbClient,
    ctx: &DbContext,
    statement: Statement,
) -> DbResult<Option<SqliteRow>> {
    match route(client, ctx, statement, Mode::Optional).await? {
        Output::Row(row) => Ok(row),
        _ => Err(unexpected_output()),
    }
}

/// Exactly one row; `NotFound` when the statement returned none.
pub(crate) async fn fetch_one(
    client: &DbClient,
    ctx: &DbContext,
    statement: Statement,
    entity: &str,
) -> DbResult<SqliteRow> {
    fetch_optional(client, ctx, statement)
        .await?
        .ok_or_else(|| DbError::not_found(entity, "returned row"))
}

/// Affected-row count.
pub(crate) async fn execute(
    client: &DbClient,
    ctx: &DbContext,
    statement: Statement,
) -> DbResult<u64> {
    match route(client, ctx, statement, Mode::Execute).await? {
        Output::Affected(rows) => Ok(rows),
        _ => Err(unexpected_output()),
    }
}

async fn route(
    client: &DbClient,
    ctx: &DbContext,
    statement: Statement,
    mode: Mode,
) -> DbResult<Output> {
    client.counters().record_statement();

    match ctx.transaction() {
        Some(tx) => {
            debug!(
                sql = %statement.sql,
                route = "tx",
                tx = tx.id(),
                params = ?statement.values.0,
                "Executing statement"
            );
            let mut slot = within_deadline(ctx, tx.lock()).await?;
            let conn = slot.connection()?;
            within_deadline(ctx, run_on(conn, statement, mode)).await?
        }
        None => {
            debug!(
                sql = %statement.sql,
                route = "pool",
                params = ?statement.values.0,
                "Executing statement"
            );
            let mut conn = within_deadline(ctx, client.pool().acquire()).await??;
            within_deadline(ctx, run_on(&mut conn, statement, mode)).await?
        }
    }
}

async fn run_on(conn: &mut SqliteConnection, statement: Statement, mode: Mode) -> DbResult<Output> {
    let Statement { sql, values } = statement;
    let query = sqlx::query_with(&sql, values);

    let output = match mode {
        Mode::All => Output::Rows(query.fetch_all(conn).await?),
        Mode::Optional => Output::Row(query.fetch_optional(conn).await?),
        Mode::Execute => Output::Affected(query.execute(conn).await?.rows_affected()),
    };
    Ok(output)
}

async fn within_deadline<F: Future>(ctx: &DbContext, future: F) -> DbResult<F::Output> {
    match ctx.deadline() {
        Some(deadline) if deadline <= Instant::now() => Err(DbError::Timeout),
        Some(deadline) => tokio::time::timeout_at(deadline, future)
            .await
            .map_err(|_| DbError::Timeout),
        None => Ok(future.await),
    }
}

fn unexpected_output() -> DbError {
    DbError::Internal("statement produced an unexpected result shape".to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use sea_query::{Alias, Expr, Query};
    use sqlx::Row;
    use std::time::Duration;

    async fn client_with_table() -> DbClient {
        let client = DbClient::new(DbConfig::in_memory()).await.unwrap();
        sqlx::raw_sql("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .execute(client.pool())
            .await
            .unwrap();
        client
    }

    #[test]
    fn test_statement_binds_values() {
        let select = Query::select()
            .column(Alias::new("name"))
            .from(Alias::new("items"))
            .and_where(Expr::col(Alias::new("id")).eq(7))
            .to_owned();

        let statement = Statement::build(&select);
        assert_eq!(statement.sql(), r#"SELECT "name" FROM "items" WHERE "id" = ?"#);
    }

    #[tokio::test]
    async fn test_pool_route_counts_statements() {
        let client = client_with_table().await;
        let ctx = DbContext::new();

        let insert = Query::insert()
            .into_table(Alias::new("items"))
            .columns([Alias::new("name")])
            .values_panic(["first".into()])
            .to_owned();
        let affected = execute(&client, &ctx, Statement::build(&insert)).await.unwrap();
        assert_eq!(affected, 1);

        let select = Query::select()
            .column(Alias::new("name"))
            .from(Alias::new("items"))
            .to_owned();
        let rows = fetch_all(&client, &ctx, Statement::build(&select)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String, _>("name"), "first");

        assert_eq!(client.statements_executed(), 2);
    }

    #[tokio::test]
    async fn test_fetch_one_without_row_is_not_found() {
        let client = client_with_table().await;

        let select = Query::select()
            .column(Alias::new("name"))
            .from(Alias::new("items"))
            .and_where(Expr::col(Alias::new("id")).eq(1))
            .to_owned();
        let result = fetch_one(&client, &DbContext::new(), Statement::build(&select), "items").await;

        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_expired_deadline_times_out() {
        let client = client_with_table().await;
        let ctx = DbContext::new().with_timeout(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let select = Query::select()
            .column(Alias::new("name"))
            .from(Alias::new("items"))
            .to_owned();
        let result = fetch_all(&client, &ctx, Statement::build(&select)).await;

        assert!(matches!(result, Err(DbError::Timeout)));
    }

    #[tokio::test]
    async fn test_client_statements_follow_the_transaction() {
        let client = client_with_table().await;
        let ctx = DbContext::new();

        let result: DbResult<()> = client
            .run_transaction(&ctx, breeze_core::TxOptions::default(), |tx_ctx| {
                let client = &client;
                async move {
                    let insert = Query::insert()
                        .into_table(Alias::new("items"))
                        .columns([Alias::new("name")])
                        .values_panic(["inside".into()])
                        .to_owned();
                    assert_eq!(client.execute(&tx_ctx, &insert).await?, 1);

                    let select = Query::select()
                        .column(Alias::new("name"))
                        .from(Alias::new("items"))
                        .to_owned();
                    let rows = client.fetch_all(&tx_ctx, &select).await?;
                    assert_eq!(rows.len(), 1);
                    Err(DbError::aborted("undo"))
                }
            })
            .await;
        assert!(matches!(result, Err(DbError::WorkFailed(_))));

        let select = Query::select()
            .column(Alias::new("name"))
            .from(Alias::new("items"))
            .to_owned();
        assert!(client.fetch_optional(&ctx, &select).await.unwrap().is_none());
    }
}
