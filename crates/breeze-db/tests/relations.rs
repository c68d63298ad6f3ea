//! Eager one-to-many loading.

mod common;

use breeze_db::sea_query::Value;
use breeze_db::{DbContext, DbResult, TxOptions};
use common::{setup, Child1, Child2};
use serde_json::json;

fn expected_family() -> serde_json::Value {
    json!({
        "ID": 1,
        "Name": "PARENT",
        "Children1": [
            {"ID": 1, "type": "TYPE1", "PARENT_ID": 1},
            {"ID": 2, "type": "TYPE2", "PARENT_ID": 1}
        ],
        "Children2": [
            {"ID": 1, "size": 0.5, "PARENT_ID": 1},
            {"ID": 2, "size": 0.7, "PARENT_ID": 1}
        ]
    })
}

#[tokio::test]
async fn test_parent_with_two_kinds_of_children() {
    let fx = setup().await;
    let ctx = DbContext::new();

    let id = fx
        .client
        .run_transaction(&ctx, TxOptions::default(), |tx_ctx| {
            let fx = &fx;
            async move { fx.create_family(&tx_ctx, "PARENT").await }
        })
        .await
        .unwrap();
    assert_eq!(id, 1);

    let parent = fx.parents.get_by_id(&ctx, id).await.unwrap().unwrap();
    assert_eq!(
        parent.children1,
        vec![
            Child1 {
                id: 1,
                kind: "TYPE1".to_string(),
                parent_id: 1,
                tags: Vec::new(),
            },
            Child1 {
                id: 2,
                kind: "TYPE2".to_string(),
                parent_id: 1,
                tags: Vec::new(),
            },
        ]
    );
    assert_eq!(
        parent.children2,
        vec![
            Child2 {
                id: 1,
                size: 0.5,
                parent_id: 1
            },
            Child2 {
                id: 2,
                size: 0.7,
                parent_id: 1
            },
        ]
    );
    assert_eq!(serde_json::to_value(&parent).unwrap(), expected_family());
}

#[tokio::test]
async fn test_get_all_and_get_by_load_relations() {
    let fx = setup().await;
    let ctx = DbContext::new();
    fx.create_family(&ctx, "PARENT").await.unwrap();

    let all = fx.parents.get_all(&ctx).await.unwrap();
    assert_eq!(serde_json::to_value(&all).unwrap(), json!([expected_family()]));

    let some = fx
        .parents
        .get_by(&ctx, fx.parents.templates().column("id").ne(0))
        .await
        .unwrap();
    assert_eq!(serde_json::to_value(&some).unwrap(), json!([expected_family()]));
}

#[tokio::test]
async fn test_one_query_per_relation_for_a_batch() {
    let fx = setup().await;
    let ctx = DbContext::new();

    fx.client
        .run_transaction(&ctx, TxOptions::default(), |tx_ctx| {
            let fx = &fx;
            async move {
                for n in 0..100 {
                    let id = fx.parents.create(&tx_ctx, [format!("P{n}")]).await?;
                    fx.child1
                        .create(&tx_ctx, [Value::from("TYPE1"), Value::from(id)])
                        .await?;
                    fx.child2
                        .create(&tx_ctx, [Value::from(1.5), Value::from(id)])
                        .await?;
                }
                DbResult::Ok(())
            }
        })
        .await
        .unwrap();

    let before = fx.client.statements_executed();
    let parents = fx.parents.get_all(&ctx).await.unwrap();
    let issued = fx.client.statements_executed() - before;

    // One select for the parents, then one per relation
    assert_eq!(issued, 3);
    assert_eq!(parents.len(), 100);
    assert!(parents
        .iter()
        .all(|p| p.children1.len() == 1 && p.children2.len() == 1));
    assert!(parents
        .iter()
        .all(|p| p.children1[0].parent_id == p.id && p.children2[0].parent_id == p.id));
}

#[tokio::test]
async fn test_no_relation_queries_for_empty_results() {
    let fx = setup().await;
    let ctx = DbContext::new();

    let before = fx.client.statements_executed();
    assert!(fx.parents.get_all(&ctx).await.unwrap().is_empty());
    assert!(fx.parents.get_by_id(&ctx, 1).await.unwrap().is_none());
    assert_eq!(fx.client.statements_executed() - before, 2);
}

#[tokio::test]
async fn test_children_only_reach_their_own_parent() {
    let fx = setup().await;
    let ctx = DbContext::new();

    let lonely = fx.parents.create(&ctx, ["LONELY"]).await.unwrap();
    let family = fx.create_family(&ctx, "FAMILY").await.unwrap();

    let lonely_parent = fx.parents.get_by_id(&ctx, lonely).await.unwrap().unwrap();
    assert!(lonely_parent.children1.is_empty());
    assert!(lonely_parent.children2.is_empty());

    let filtered = fx
        .parents
        .get_by(&ctx, fx.parents.templates().column("id").eq(family))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].children1.len(), 2);
    assert_eq!(filtered[0].children2.len(), 2);
}

#[tokio::test]
async fn test_relations_load_one_level_only() {
    let fx = setup().await;
    let ctx = DbContext::new();
    let id = fx.create_family(&ctx, "PARENT").await.unwrap();

    let children = fx.child1.get_all(&ctx).await.unwrap();
    for child in &children {
        fx.tags
            .create(&ctx, [Value::from("urgent"), Value::from(child.id)])
            .await
            .unwrap();
    }

    // Through the child repository, its own relation loads
    let tagged = fx.child1.get_all(&ctx).await.unwrap();
    assert!(tagged.iter().all(|child| child.tags.len() == 1));

    // Through the parent repository, only the parent's relations do
    let before = fx.client.statements_executed();
    let parent = fx.parents.get_by_id(&ctx, id).await.unwrap().unwrap();
    assert_eq!(fx.client.statements_executed() - before, 1 + 2);

    assert_eq!(parent.children1.len(), 2);
    assert!(parent.children1.iter().all(|child| child.tags.is_empty()));
    assert_eq!(serde_json::to_value(&parent).unwrap(), expected_family());
}
