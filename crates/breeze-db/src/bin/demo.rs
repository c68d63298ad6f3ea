//! # Parent/Children Demo
//!
//! Creates a parent with two kinds of children inside one transaction, then
//! reads the graph back through the generic repository and prints it as JSON.
//!
//! ## Usage
//! ```bash
//! # Private in-memory database
//! cargo run -p breeze-db --bin demo
//!
//! # File database
//! cargo run -p breeze-db --bin demo -- --db sqlite://demo.db
//!
//! # Or through the environment
//! DATABASE_URL=sqlite://demo.db cargo run -p breeze-db --bin demo
//! ```

use std::env;

use breeze_db::sea_query::Value;
use breeze_db::{
    from_row, DbClient, DbConfig, DbContext, DbError, Entity, Relation, Repository,
    TableTemplates, TxOptions,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS parents (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS child1 (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    type      TEXT NOT NULL,
    parent_id INTEGER NOT NULL REFERENCES parents(id)
);
CREATE TABLE IF NOT EXISTS child2 (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    size      REAL NOT NULL,
    parent_id INTEGER NOT NULL REFERENCES parents(id)
);
"#;

#[derive(Debug, Serialize, sqlx::FromRow)]
struct Parent {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Children1")]
    #[sqlx(skip)]
    children1: Vec<Child1>,
    #[serde(rename = "Children2")]
    #[sqlx(skip)]
    children2: Vec<Child2>,
}

impl Entity for Parent {
    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct Child1 {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    kind: String,
    #[serde(rename = "PARENT_ID")]
    parent_id: i64,
}

impl Entity for Child1 {
    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct Child2 {
    #[serde(rename = "ID")]
    id: i64,
    size: f64,
    #[serde(rename = "PARENT_ID")]
    parent_id: i64,
}

impl Entity for Child2 {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Builds the parent repository with both child relations attached.
fn repositories(
    client: &DbClient,
) -> Result<(Repository<Parent>, Repository<Child1>, Repository<Child2>), DbError> {
    let child1 = Repository::new(
        client.clone(),
        TableTemplates::for_table("child1", &["type", "parent_id"], &["id", "type", "parent_id"])?,
        from_row::<Child1>,
    );
    let child2 = Repository::new(
        client.clone(),
        TableTemplates::for_table("child2", &["size", "parent_id"], &["id", "size", "parent_id"])?,
        from_row::<Child2>,
    );

    let parents = Repository::new(
        client.clone(),
        TableTemplates::for_table("parents", &["name"], &["id", "name"])?.with_alias("p")?,
        from_row::<Parent>,
    )
    .with_relation(Relation::new(
        "parent_id",
        child1.clone(),
        |child: &Child1| child.parent_id,
        |parent: &mut Parent, child| parent.children1.push(child),
    )?)
    .with_relation(Relation::new(
        "parent_id",
        child2.clone(),
        |child: &Child2| child.parent_id,
        |parent: &mut Parent, child| parent.children2.push(child),
    )?);

    Ok((parents, child1, child2))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut url: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    url = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("breeze-data demo");
                println!();
                println!("Usage: demo [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <URL>    Connection string (default: $DATABASE_URL or in-memory)");
                println!("  -h, --help        Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = match url {
        Some(url) => DbConfig::new(url),
        None if env::var("DATABASE_URL").is_ok() => DbConfig::from_env()?,
        None => DbConfig::in_memory(),
    };

    let client = DbClient::new(config).await?;
    sqlx::raw_sql(SCHEMA).execute(client.pool()).await?;

    let (parents, child1, child2) = repositories(&client)?;
    let ctx = DbContext::new();

    let parent_id = client
        .run_transaction(&ctx, TxOptions::default(), |tx_ctx| {
            let (parents, child1, child2) = (&parents, &child1, &child2);
            async move {
                let parent_id = parents.create(&tx_ctx, ["PARENT"]).await?;

                for kind in ["TYPE1", "TYPE2"] {
                    child1
                        .create(&tx_ctx, [Value::from(kind), Value::from(parent_id)])
                        .await?;
                }
                for size in [0.5, 0.7] {
                    child2
                        .create(&tx_ctx, [Value::from(size), Value::from(parent_id)])
                        .await?;
                }

                Ok(parent_id)
            }
        })
        .await?;

    info!(parent_id, "Parent graph committed");

    let parent = parents
        .get_by_id(&ctx, parent_id)
        .await?
        .ok_or_else(|| DbError::not_found("Parent", parent_id.to_string()))?;

    println!("{}", serde_json::to_string_pretty(&parent)?);
    println!(
        "statements executed: {}, parents in table: {}",
        client.statements_executed(),
        parents.count(&ctx).await?
    );

    client.close().await;
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,breeze_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
