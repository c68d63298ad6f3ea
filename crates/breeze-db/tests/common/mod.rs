//! Shared fixtures: a parent table with two child tables (the first with
//! tags of its own), the entities that map them, and fully wired
//! repositories over an in-memory database.

#![allow(dead_code)]

use breeze_db::sea_query::Value;
use breeze_db::{
    from_row, DbClient, DbConfig, DbContext, DbResult, Entity, Relation, Repository,
    TableTemplates,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

pub const SCHEMA: &str = r#"
CREATE TABLE parents (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE TABLE child1 (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    type      TEXT NOT NULL,
    parent_id INTEGER NOT NULL REFERENCES parents(id)
);
CREATE TABLE child2 (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    size      REAL NOT NULL,
    parent_id INTEGER NOT NULL REFERENCES parents(id)
);
CREATE TABLE tags (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    label    TEXT NOT NULL,
    child_id INTEGER NOT NULL REFERENCES child1(id)
);
"#;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Parent {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Children1")]
    #[sqlx(skip)]
    pub children1: Vec<Child1>,
    #[serde(rename = "Children2")]
    #[sqlx(skip)]
    pub children2: Vec<Child2>,
}

impl Entity for Parent {
    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Child1 {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    #[serde(rename = "PARENT_ID")]
    pub parent_id: i64,
    #[serde(rename = "Tags", skip_serializing_if = "Vec::is_empty")]
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

impl Entity for Child1 {
    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Child2 {
    #[serde(rename = "ID")]
    pub id: i64,
    pub size: f64,
    #[serde(rename = "PARENT_ID")]
    pub parent_id: i64,
}

impl Entity for Child2 {
    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub label: String,
    pub child_id: i64,
}

impl Entity for Tag {
    fn id(&self) -> i64 {
        self.id
    }
}

pub struct Fixture {
    pub client: DbClient,
    pub parents: Repository<Parent>,
    /// Loads its tags; parents loaded through `parents` don't.
    pub child1: Repository<Child1>,
    pub child2: Repository<Child2>,
    pub tags: Repository<Tag>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .try_init();
}

/// Fresh in-memory database with the schema and all repositories.
pub async fn setup() -> Fixture {
    init_tracing();

    let client = DbClient::new(DbConfig::in_memory()).await.unwrap();
    sqlx::raw_sql(SCHEMA).execute(client.pool()).await.unwrap();

    let tags = Repository::new(
        client.clone(),
        TableTemplates::for_table("tags", &["label", "child_id"], &["id", "label", "child_id"])
            .unwrap(),
        from_row::<Tag>,
    );
    let child1 = Repository::new(
        client.clone(),
        TableTemplates::for_table("child1", &["type", "parent_id"], &["id", "type", "parent_id"])
            .unwrap(),
        from_row::<Child1>,
    )
    .with_relation(
        Relation::new(
            "child_id",
            tags.clone(),
            |tag: &Tag| tag.child_id,
            |child: &mut Child1, tag| child.tags.push(tag),
        )
        .unwrap(),
    );
    let child2 = Repository::new(
        client.clone(),
        TableTemplates::for_table("child2", &["size", "parent_id"], &["id", "size", "parent_id"])
            .unwrap(),
        from_row::<Child2>,
    );

    let parents = Repository::new(
        client.clone(),
        TableTemplates::for_table("parents", &["name"], &["id", "name"])
            .unwrap()
            .with_alias("p")
            .unwrap(),
        from_row::<Parent>,
    )
    .with_relation(
        Relation::new(
            "parent_id",
            child1.clone(),
            |child: &Child1| child.parent_id,
            |parent: &mut Parent, child| parent.children1.push(child),
        )
        .unwrap(),
    )
    .with_relation(
        Relation::new(
            "parent_id",
            child2.clone(),
            |child: &Child2| child.parent_id,
            |parent: &mut Parent, child| parent.children2.push(child),
        )
        .unwrap(),
    );

    Fixture {
        client,
        parents,
        child1,
        child2,
        tags,
    }
}

impl Fixture {
    /// Inserts a parent with two type-A and two type-B children.
    pub async fn create_family(&self, ctx: &DbContext, name: &str) -> DbResult<i64> {
        let parent_id = self.parents.create(ctx, [name]).await?;

        for kind in ["TYPE1", "TYPE2"] {
            self.child1
                .create(ctx, [Value::from(kind), Value::from(parent_id)])
                .await?;
        }
        for size in [0.5, 0.7] {
            self.child2
                .create(ctx, [Value::from(size), Value::from(parent_id)])
                .await?;
        }

        Ok(parent_id)
    }
}
