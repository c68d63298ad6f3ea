//! # Generic Repository
//!
//! One [`Repository<T>`] per entity type, assembled from a row converter,
//! four statement templates and zero or more relations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository<T> Call Path                              │
//! │                                                                         │
//! │  Application                                                            │
//! │       │                                                                 │
//! │       │  repo.get_by(&ctx, repo.templates().column("id").ne(0))        │
//! │       ▼                                                                 │
//! │  Repository<T>                                                          │
//! │  ├── clone select template, add WHERE                                  │
//! │  ├── executor: ambient tx or pool                                      │
//! │  ├── converter: SqliteRow → T                                          │
//! │  └── relations: one IN (...) query each, attach children               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`templates`] - [`TableTemplates`], the immutable base statements
//! - [`relation`] - [`Relation`] and the type-erased [`LoadRelation`]

pub mod relation;
pub mod templates;

use std::fmt;
use std::sync::Arc;

use breeze_core::{validate_identifier, CoreError, Entity, ParentIndex};
use sea_query::{Alias, Asterisk, Expr, Func, IntoCondition, SimpleExpr, UpdateStatement};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use tracing::{debug, warn};

use crate::context::DbContext;
use crate::error::{DbError, DbResult};
use crate::executor::{self, Statement};
use crate::pool::DbClient;

pub use relation::{LoadRelation, Relation};
pub use templates::TableTemplates;

/// Converts one result row into one entity.
pub type RowConverter<T> = fn(&SqliteRow) -> Result<T, sqlx::Error>;

/// Converter for any `sqlx::FromRow` type.
///
/// ```rust,ignore
/// let repo = Repository::new(client, templates, from_row::<Parent>);
/// ```
pub fn from_row<T>(row: &SqliteRow) -> Result<T, sqlx::Error>
where
    T: for<'r> FromRow<'r, SqliteRow>,
{
    T::from_row(row)
}

/// CRUD and eager relation loading for one entity type.
///
/// ## Usage
/// ```rust,ignore
/// let parents = Repository::new(client.clone(), parent_templates, from_row::<Parent>)
///     .with_relation(child1_relation)
///     .with_relation(child2_relation);
///
/// let id = parents.create(&ctx, ["PARENT"]).await?;
/// let parent = parents.get_by_id(&ctx, id).await?;
/// ```
pub struct Repository<T> {
    client: DbClient,
    templates: Arc<TableTemplates>,
    converter: RowConverter<T>,
    relations: Vec<Arc<dyn LoadRelation<T>>>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Repository {
            client: self.client.clone(),
            templates: Arc::clone(&self.templates),
            converter: self.converter,
            relations: self.relations.clone(),
        }
    }
}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.templates.table())
            .field("alias", &self.templates.alias())
            .field(
                "relations",
                &self
                    .relations
                    .iter()
                    .map(|relation| relation.foreign_key())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T> Repository<T>
where
    T: Entity + Send + Sync + 'static,
{
    /// Creates a repository with no relations.
    pub fn new(client: DbClient, templates: TableTemplates, converter: RowConverter<T>) -> Self {
        Repository {
            client,
            templates: Arc::new(templates),
            converter,
            relations: Vec::new(),
        }
    }

    /// Adds an eager one-to-many relation.
    pub fn with_relation<C>(mut self, relation: Relation<T, C>) -> Self
    where
        C: Entity + Send + Sync + 'static,
    {
        self.relations.push(Arc::new(relation));
        self
    }

    pub fn client(&self) -> &DbClient {
        &self.client
    }

    pub fn templates(&self) -> &TableTemplates {
        &self.templates
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Inserts one row and returns its generated id.
    ///
    /// `values` are bound in the insert template's column order.
    ///
    /// ## Errors
    /// - `StatementBuild` - value count doesn't match the template columns
    /// - `UniqueViolation` / `ForeignKeyViolation` - constraint failed
    pub async fn create<I, V>(&self, ctx: &DbContext, values: I) -> DbResult<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<SimpleExpr>,
    {
        let mut insert = self.templates.insert();
        insert.values(values.into_iter().map(Into::into))?;
        insert.returning_col(Alias::new(self.templates.id_column()));

        let row = executor::fetch_one(
            &self.client,
            ctx,
            Statement::build(&insert),
            self.templates.table(),
        )
        .await?;
        let id = row.try_get::<i64, _>(0).map_err(DbError::conversion)?;

        debug!(table = self.templates.table(), id, "Row created");
        Ok(id)
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Fetches one entity by primary key, with relations loaded.
    ///
    /// Returns `Ok(None)` when no row matches.
    pub async fn get_by_id(&self, ctx: &DbContext, id: i64) -> DbResult<Option<T>> {
        let mut select = self.templates.select();
        select.and_where(self.templates.select_id_eq(id));

        let Some(row) = executor::fetch_optional(&self.client, ctx, Statement::build(&select)).await?
        else {
            return Ok(None);
        };

        let mut entities = vec![self.convert(&row)?];
        self.load_relations(ctx, &mut entities).await?;
        Ok(entities.pop())
    }

    /// Fetches every row the select template returns, with relations loaded.
    pub async fn get_all(&self, ctx: &DbContext) -> DbResult<Vec<T>> {
        let select = self.templates.select();
        let rows = executor::fetch_all(&self.client, ctx, Statement::build(&select)).await?;

        let mut entities = self.convert_all(&rows)?;
        self.load_relations(ctx, &mut entities).await?;
        Ok(entities)
    }

    /// Fetches the rows matching `predicate`, with relations loaded.
    ///
    /// The predicate is ANDed with any condition already in the template.
    pub async fn get_by(&self, ctx: &DbContext, predicate: impl IntoCondition) -> DbResult<Vec<T>> {
        let mut entities = self.fetch_by(ctx, predicate).await?;
        self.load_relations(ctx, &mut entities).await?;
        Ok(entities)
    }

    /// Like [`get_by`](Self::get_by) without relation loading.
    pub(crate) async fn fetch_by(
        &self,
        ctx: &DbContext,
        predicate: impl IntoCondition,
    ) -> DbResult<Vec<T>> {
        let mut select = self.templates.select();
        select.cond_where(predicate);

        let rows = executor::fetch_all(&self.client, ctx, Statement::build(&select)).await?;
        self.convert_all(&rows)
    }

    /// Number of rows the select template returns.
    pub async fn count(&self, ctx: &DbContext) -> DbResult<i64> {
        let mut select = self.templates.select();
        select
            .clear_selects()
            .expr(Func::count(Expr::col(Asterisk)));

        let row = executor::fetch_one(
            &self.client,
            ctx,
            Statement::build(&select),
            self.templates.table(),
        )
        .await?;
        row.try_get::<i64, _>(0).map_err(DbError::conversion)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Sets `fields` on the row with the given id. Returns affected rows;
    /// `Ok(0)` when the id doesn't exist.
    ///
    /// ## Example
    /// ```rust,ignore
    /// repo.update(&ctx, [("name", Expr::val("RENAMED"))], id).await?;
    /// ```
    pub async fn update<I, K, V>(&self, ctx: &DbContext, fields: I, id: i64) -> DbResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SimpleExpr>,
    {
        let mut update = self.update_with(fields)?;
        update.and_where(self.templates.id_eq(id));

        executor::execute(&self.client, ctx, Statement::build(&update)).await
    }

    /// Sets `fields` on every row matching `predicate`. Returns affected rows.
    pub async fn update_collection<I, K, V>(
        &self,
        ctx: &DbContext,
        fields: I,
        predicate: impl IntoCondition,
    ) -> DbResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SimpleExpr>,
    {
        let mut update = self.update_with(fields)?;
        update.cond_where(predicate);

        executor::execute(&self.client, ctx, Statement::build(&update)).await
    }

    /// A clone of the update template, for building
    /// [`update_returning`](Self::update_returning) statements.
    pub fn update_template(&self) -> UpdateStatement {
        self.templates.update()
    }

    /// Runs a caller-built UPDATE carrying a RETURNING clause and converts
    /// the returned row. `Ok(None)` when nothing matched.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut stmt = repo.update_template();
    /// stmt.value(Alias::new("name"), "RENAMED")
    ///     .and_where(Expr::col(Alias::new("id")).eq(id))
    ///     .returning_all();
    /// let parent = repo.update_returning(&ctx, stmt).await?;
    /// ```
    pub async fn update_returning(
        &self,
        ctx: &DbContext,
        statement: UpdateStatement,
    ) -> DbResult<Option<T>> {
        self.update_returning_with(ctx, statement, self.converter).await
    }

    /// [`update_returning`](Self::update_returning) with its own converter,
    /// for RETURNING clauses that don't map onto `T` (extra columns,
    /// computed values).
    ///
    /// ## Example
    /// ```rust,ignore
    /// stmt.returning(Query::returning().columns([Alias::new("id"), Alias::new("name")]));
    /// let renamed: Option<(i64, String)> = repo
    ///     .update_returning_with(&ctx, stmt, |row| Ok((row.try_get("id")?, row.try_get("name")?)))
    ///     .await?;
    /// ```
    pub async fn update_returning_with<U>(
        &self,
        ctx: &DbContext,
        statement: UpdateStatement,
        converter: RowConverter<U>,
    ) -> DbResult<Option<U>> {
        executor::fetch_optional(&self.client, ctx, Statement::build(&statement))
            .await?
            .map(|row| converter(&row).map_err(DbError::conversion))
            .transpose()
    }

    /// [`update_returning`](Self::update_returning) with relations loaded.
    pub async fn update_returning_with_relations(
        &self,
        ctx: &DbContext,
        statement: UpdateStatement,
    ) -> DbResult<Option<T>> {
        let Some(entity) = self.update_returning(ctx, statement).await? else {
            return Ok(None);
        };

        let mut entities = vec![entity];
        self.load_relations(ctx, &mut entities).await?;
        Ok(entities.pop())
    }

    fn update_with<I, K, V>(&self, fields: I) -> DbResult<UpdateStatement>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SimpleExpr>,
    {
        let mut update = self.templates.update();
        let mut assigned = 0;

        for (column, value) in fields {
            let column = column.as_ref();
            validate_identifier("column", column).map_err(CoreError::from)?;
            update.value(Alias::new(column), value);
            assigned += 1;
        }

        if assigned == 0 {
            return Err(DbError::StatementBuild(
                "update requires at least one field".to_string(),
            ));
        }
        Ok(update)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes the row with the given id. Returns affected rows.
    pub async fn delete(&self, ctx: &DbContext, id: i64) -> DbResult<u64> {
        let mut delete = self.templates.delete();
        delete.and_where(self.templates.id_eq(id));

        executor::execute(&self.client, ctx, Statement::build(&delete)).await
    }

    /// Deletes every row matching `predicate`. Returns affected rows.
    pub async fn delete_collection(
        &self,
        ctx: &DbContext,
        predicate: impl IntoCondition,
    ) -> DbResult<u64> {
        let mut delete = self.templates.delete();
        delete.cond_where(predicate);

        executor::execute(&self.client, ctx, Statement::build(&delete)).await
    }

    // =========================================================================
    // Conversion and relation loading
    // =========================================================================

    fn convert(&self, row: &SqliteRow) -> DbResult<T> {
        (self.converter)(row).map_err(DbError::conversion)
    }

    fn convert_all(&self, rows: &[SqliteRow]) -> DbResult<Vec<T>> {
        rows.iter().map(|row| self.convert(row)).collect()
    }

    async fn load_relations(&self, ctx: &DbContext, parents: &mut [T]) -> DbResult<()> {
        if self.relations.is_empty() || parents.is_empty() {
            return Ok(());
        }

        let index = ParentIndex::build(parents);
        if !index.duplicates().is_empty() {
            warn!(
                table = self.templates.table(),
                duplicates = ?index.duplicates(),
                "Duplicate parent ids in batch, children go to the first occurrence"
            );
        }

        for relation in &self.relations {
            let stats = relation.load(ctx, parents, &index).await?;
            debug!(
                table = self.templates.table(),
                foreign_key = relation.foreign_key(),
                parents = index.len(),
                attached = stats.attached,
                orphaned = stats.orphaned,
                "Relation loaded"
            );
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
