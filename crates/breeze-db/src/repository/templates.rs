//! # Statement Templates
//!
//! The four base statements a repository specializes per call. Templates are
//! immutable once built: every accessor hands out a fresh clone.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TableTemplates                                                         │
//! │                                                                         │
//! │  insert  INSERT INTO "parents" ("name")          + VALUES, RETURNING   │
//! │  select  SELECT "id", "name" FROM "parents"      + WHERE               │
//! │  update  UPDATE "parents"                        + SET, WHERE          │
//! │  delete  DELETE FROM "parents"                   + WHERE               │
//! │                                                                         │
//! │  id column  "id"        qualifier  alias or table name                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Select conditions are qualified (`"p"."id"`) so they stay unambiguous in
//! templates that join other tables. Update and delete conditions are not.

use breeze_core::{validate_identifier, validate_identifiers, CoreError, DEFAULT_ID_COLUMN};
use sea_query::{
    Alias, DeleteStatement, Expr, InsertStatement, Query, SelectStatement, SimpleExpr,
    UpdateStatement,
};

use crate::error::DbResult;

/// Immutable insert/select/update/delete templates for one table.
#[derive(Debug, Clone)]
pub struct TableTemplates {
    table: String,
    alias: Option<String>,
    id_column: String,
    insert: InsertStatement,
    select: SelectStatement,
    update: UpdateStatement,
    delete: DeleteStatement,
    /// Set when the select template was generated by `for_table`, so that
    /// `with_alias` can regenerate its FROM clause.
    generated_columns: Option<Vec<String>>,
}

impl TableTemplates {
    /// Wraps caller-built statements.
    ///
    /// Use this when the select template joins or filters. If the select
    /// names its table with an alias, pass the same alias to
    /// [`with_alias`](Self::with_alias).
    pub fn new(
        table: &str,
        insert: InsertStatement,
        select: SelectStatement,
        update: UpdateStatement,
        delete: DeleteStatement,
    ) -> DbResult<Self> {
        validate_identifier("table", table).map_err(CoreError::from)?;

        Ok(TableTemplates {
            table: table.to_string(),
            alias: None,
            id_column: DEFAULT_ID_COLUMN.to_string(),
            insert,
            select,
            update,
            delete,
            generated_columns: None,
        })
    }

    /// Generates plain single-table templates.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let templates = TableTemplates::for_table(
    ///     "child1",
    ///     &["type", "parent_id"],
    ///     &["id", "type", "parent_id"],
    /// )?;
    /// ```
    pub fn for_table(
        table: &str,
        insert_columns: &[&str],
        select_columns: &[&str],
    ) -> DbResult<Self> {
        validate_identifier("table", table).map_err(CoreError::from)?;
        validate_identifiers("column", insert_columns.iter().copied()).map_err(CoreError::from)?;
        validate_identifiers("column", select_columns.iter().copied()).map_err(CoreError::from)?;

        let insert = Query::insert()
            .into_table(Alias::new(table))
            .columns(insert_columns.iter().map(|column| Alias::new(*column)))
            .to_owned();
        let update = Query::update().table(Alias::new(table)).to_owned();
        let delete = Query::delete().from_table(Alias::new(table)).to_owned();

        let columns: Vec<String> = select_columns.iter().map(|c| c.to_string()).collect();
        let select = generated_select(table, None, &columns);

        Ok(TableTemplates {
            table: table.to_string(),
            alias: None,
            id_column: DEFAULT_ID_COLUMN.to_string(),
            insert,
            select,
            update,
            delete,
            generated_columns: Some(columns),
        })
    }

    /// Sets the alias that qualifies select conditions.
    pub fn with_alias(mut self, alias: &str) -> DbResult<Self> {
        validate_identifier("alias", alias).map_err(CoreError::from)?;

        if let Some(columns) = &self.generated_columns {
            self.select = generated_select(&self.table, Some(alias), columns);
        }
        self.alias = Some(alias.to_string());
        Ok(self)
    }

    /// Overrides the primary-key column (default `id`).
    pub fn with_id_column(mut self, column: &str) -> DbResult<Self> {
        validate_identifier("column", column).map_err(CoreError::from)?;
        self.id_column = column.to_string();
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn insert(&self) -> InsertStatement {
        self.insert.clone()
    }

    pub fn select(&self) -> SelectStatement {
        self.select.clone()
    }

    pub fn update(&self) -> UpdateStatement {
        self.update.clone()
    }

    pub fn delete(&self) -> DeleteStatement {
        self.delete.clone()
    }

    /// A select-side column reference, qualified by alias or table name.
    ///
    /// ## Example
    /// ```rust,ignore
    /// repo.get_by(&ctx, repo.templates().column("id").ne(0)).await?;
    /// ```
    pub fn column(&self, name: &str) -> Expr {
        let qualifier = self.alias.as_deref().unwrap_or(&self.table);
        Expr::col((Alias::new(qualifier), Alias::new(name)))
    }

    /// `<qualifier>.<id> = id`, for select templates.
    pub fn select_id_eq(&self, id: i64) -> SimpleExpr {
        self.column(&self.id_column).eq(id)
    }

    /// `<id> = id`, for update and delete templates.
    pub fn id_eq(&self, id: i64) -> SimpleExpr {
        Expr::col(Alias::new(self.id_column.as_str())).eq(id)
    }
}

fn generated_select(table: &str, alias: Option<&str>, columns: &[String]) -> SelectStatement {
    let mut select = Query::select();
    let qualifier = alias.unwrap_or(table);
    for column in columns {
        select.column((Alias::new(qualifier), Alias::new(column.as_str())));
    }
    match alias {
        Some(alias) => select.from_as(Alias::new(table), Alias::new(alias)),
        None => select.from(Alias::new(table)),
    };
    select
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use sea_query::SqliteQueryBuilder;

    fn parents() -> TableTemplates {
        TableTemplates::for_table("parents", &["name"], &["id", "name"]).unwrap()
    }

    #[test]
    fn test_generated_templates() {
        let templates = parents();

        assert_eq!(
            templates.select().to_string(SqliteQueryBuilder),
            r#"SELECT "parents"."id", "parents"."name" FROM "parents""#
        );
        assert_eq!(
            templates
                .insert()
                .values_panic(["PARENT".into()])
                .to_string(SqliteQueryBuilder),
            r#"INSERT INTO "parents" ("name") VALUES ('PARENT')"#
        );
    }

    #[test]
    fn test_alias_qualifies_select_only() {
        let templates = parents().with_alias("p").unwrap();
        assert_eq!(templates.alias(), Some("p"));
        assert_eq!(parents().alias(), None);

        let select = templates
            .select()
            .and_where(templates.select_id_eq(3))
            .to_string(SqliteQueryBuilder);
        assert_eq!(
            select,
            r#"SELECT "p"."id", "p"."name" FROM "parents" AS "p" WHERE "p"."id" = 3"#
        );

        let delete = templates
            .delete()
            .and_where(templates.id_eq(3))
            .to_string(SqliteQueryBuilder);
        assert_eq!(delete, r#"DELETE FROM "parents" WHERE "id" = 3"#);
    }

    #[test]
    fn test_accessors_return_clones() {
        let templates = parents();

        let mut select = templates.select();
        select.and_where(templates.select_id_eq(1));

        assert_eq!(
            templates.select().to_string(SqliteQueryBuilder),
            r#"SELECT "parents"."id", "parents"."name" FROM "parents""#
        );
    }

    #[test]
    fn test_custom_id_column() {
        let templates = parents().with_id_column("parent_key").unwrap();
        assert_eq!(templates.id_column(), "parent_key");
        assert_eq!(
            templates
                .update()
                .value(Alias::new("name"), "x")
                .and_where(templates.id_eq(9))
                .to_string(SqliteQueryBuilder),
            r#"UPDATE "parents" SET "name" = 'x' WHERE "parent_key" = 9"#
        );
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        assert!(matches!(
            TableTemplates::for_table("bad table", &["name"], &["id"]),
            Err(DbError::Validation(_))
        ));
        assert!(TableTemplates::for_table("parents", &["name;--"], &["id"]).is_err());
        assert!(parents().with_alias("").is_err());
        assert!(parents().with_id_column("1id").is_err());
    }
}
