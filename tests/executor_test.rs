use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlrest::client::render_params;
use sqlrest::prelude::*;
use std::sync::Mutex;

/// Records every request and answers with no rows.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<TableQuery>>,
}

impl Recorder {
    fn queries(&self) -> Vec<TableQuery> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableApi for Recorder {
    async fn execute(&self, query: &TableQuery) -> QueryResult {
        self.seen.lock().unwrap().push(query.clone());
        QueryResult::ok(vec![])
    }
}

fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

fn users() -> MemoryClient {
    MemoryClient::new().with_table(
        "users",
        vec![
            row(json!({"id": 1, "name": "bob", "age": 40})),
            row(json!({"id": 2, "name": "ann", "age": 25})),
            row(json!({"id": 3, "name": "cat", "age": 33})),
        ],
    )
}

#[tokio::test]
async fn test_insert_then_select_round_trip() {
    let executor = SqlExecutor::new(MemoryClient::new().with_table("t", vec![]));

    let inserted = executor
        .execute_sql("INSERT INTO t (a, b) VALUES (1, 'x')")
        .await;
    assert!(inserted.is_ok(), "{:?}", inserted.error);
    assert_eq!(inserted.data, Some(vec![row(json!({"a": 1, "b": "x"}))]));

    executor
        .execute_sql("INSERT INTO t (a, b) VALUES (2, 'y')")
        .await;

    let selected = executor.execute_sql("SELECT a,b FROM t WHERE a = 1").await;
    assert_eq!(selected.error, None);
    assert_eq!(selected.data, Some(vec![row(json!({"a": 1, "b": "x"}))]));
}

#[tokio::test]
async fn test_bulk_insert_then_paged_select() {
    let executor = SqlExecutor::new(MemoryClient::new().with_table("t", vec![]));

    let inserted = executor
        .execute_sql("INSERT INTO t (n, label) VALUES (3, 'c'), (1, 'a'), (2, 'b')")
        .await;
    assert_eq!(inserted.data.map(|rows| rows.len()), Some(3));

    let page = executor
        .execute_sql("SELECT label FROM t ORDER BY n LIMIT 1, 1")
        .await;
    assert_eq!(page.data, Some(vec![row(json!({"label": "b"}))]));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let client = users();
    let executor = SqlExecutor::new(&client);

    let first = executor.execute_sql("DELETE FROM users WHERE id = 1").await;
    let second = executor.execute_sql("DELETE FROM users WHERE id = 1").await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(first.data, None);
    assert_eq!(second.data, None);
    assert_eq!(client.rows("users").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_returns_changed_rows() {
    let client = users();
    let executor = SqlExecutor::new(&client);

    let result = executor
        .execute_sql("UPDATE users SET name = 'bea', age = 26 WHERE id = 2")
        .await;
    assert_eq!(
        result.data,
        Some(vec![row(json!({"id": 2, "name": "bea", "age": 26}))])
    );
}

#[tokio::test]
async fn test_bounded_mutations_are_refused() {
    let client = MemoryClient::new().with_table(
        "users",
        vec![
            row(json!({"id": 1, "name": "bob", "age": 40})),
            row(json!({"id": 2, "name": "bob", "age": 41})),
        ],
    );
    let executor = SqlExecutor::new(&client);

    let result = executor
        .execute_sql("UPDATE users SET age = 99 WHERE name = 'bob' LIMIT 1")
        .await;
    assert_eq!(result.data, None);
    assert!(result.error.is_some());

    for sql in [
        "REPLACE INTO users (id, name) VALUES (1, 'zed')",
        "INSERT IGNORE INTO users (id, name) VALUES (3, 'zed')",
    ] {
        let result = executor.execute_sql(sql).await;
        assert!(result.error.is_some(), "expected an error for {:?}", sql);
    }

    let rows = client.rows("users").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["age"] != 99 && r["name"] == "bob"));
}

#[tokio::test]
async fn test_never_throws() {
    let executor = SqlExecutor::new(users());
    let inputs = [
        "",
        ";",
        "SELECT",
        "SELECT * FROM",
        "DROP TABLE users",
        "INSERT INTO users (id) VALUES",
        "UPDATE users SET",
        "DELETE FROM users WHERE (",
        "SELECT * FROM users; SELECT * FROM users",
        "SELECT * FROM users WHERE id IN (SELECT id FROM users)",
        "SELECT COUNT(*) FROM users",
        "💥",
        "SELECT * FROM `users` WHERE name = 'it''s'",
    ];

    for sql in inputs {
        let result = executor.execute_sql(sql).await;
        assert!(
            !(result.data.is_some() && result.error.is_some()),
            "data and error both set for {:?}",
            sql
        );
        if sql.is_empty() || sql == "DROP TABLE users" {
            assert!(result.error.is_some(), "expected an error for {:?}", sql);
        }
    }
}

#[tokio::test]
async fn test_classifier_priority() {
    let recorder = Recorder::default();
    let executor = SqlExecutor::new(&recorder);

    executor
        .execute_sql("DELETE FROM notes WHERE body = 'select'")
        .await;
    executor
        .execute_sql("UPDATE notes SET body = 'insert' WHERE id = 4")
        .await;

    let queries = recorder.queries();
    assert_eq!(queries[0].operation, Operation::Delete);
    assert!(matches!(queries[1].operation, Operation::Update(_)));

    let plan = executor
        .plan("DELETE FROM notes WHERE body = 'select'")
        .unwrap();
    assert_eq!(plan.route, Route::Simple);
}

#[tokio::test]
async fn test_or_rendering() {
    let recorder = Recorder::default();
    let executor = SqlExecutor::new(&recorder);

    let result = executor
        .execute_sql("SELECT * FROM t WHERE col1 = 'a' OR col2 = 'b'")
        .await;
    assert!(result.is_ok());

    let queries = recorder.queries();
    let [Filter::Or(disjunction)] = queries[0].filters.as_slice() else {
        panic!("expected one disjunction, got {:?}", queries[0].filters);
    };
    assert_eq!(disjunction.to_filter_string(), "col1.eq.a,col2.eq.b");
    let params = render_params(&queries[0]);
    assert!(params.contains(&("or".to_string(), "(col1.eq.a,col2.eq.b)".to_string())));
}

#[tokio::test]
async fn test_default_order_is_ascending() {
    let recorder = Recorder::default();
    let executor = SqlExecutor::new(&recorder);

    executor
        .execute_sql("SELECT * FROM t ORDER BY created_at")
        .await;
    executor
        .execute_sql("SELECT * FROM t WHERE x = 1 ORDER BY created_at LIMIT 5")
        .await;

    for query in recorder.queries() {
        assert_eq!(query.order, vec![OrderBy::asc("created_at")]);
    }
}

#[tokio::test]
async fn test_insert_arity_mismatch_is_400() {
    let recorder = Recorder::default();
    let executor = SqlExecutor::new(&recorder);

    let result = executor
        .execute_sql("INSERT INTO t (a, b) VALUES (1)")
        .await;
    assert_eq!(result.data, None);
    assert_eq!(result.status_code(), Some(400));
    assert!(recorder.queries().is_empty());
}

#[tokio::test]
async fn test_unsupported_operator_is_an_error_result() {
    let recorder = Recorder::default();
    let executor = SqlExecutor::new(&recorder);

    let result = executor
        .execute_sql("SELECT * FROM t WHERE id % 2 = 0")
        .await;
    let error = result.error.expect("expected an error result");
    assert!(error.message.contains('%'), "{}", error.message);
    assert_eq!(error.status_code, None);
    assert!(recorder.queries().is_empty());
}

#[tokio::test]
async fn test_fallback_select_runs_unfiltered() {
    let executor = SqlExecutor::new(users());

    let result = executor
        .execute_sql("SELECT * FROM users WHERE name = 'bob")
        .await;
    assert!(result.is_ok());
    assert_eq!(result.data.map(|rows| rows.len()), Some(3));
}

#[tokio::test]
async fn test_fallback_update_with_broken_where_touches_nothing() {
    let client = users();
    let executor = SqlExecutor::new(&client);

    let result = executor
        .execute_sql("UPDATE users SET name = 'x WHERE id = 1")
        .await;
    assert_eq!(result.status_code(), Some(400));
    let rows = client.rows("users").await.unwrap();
    assert!(rows.iter().all(|r| r["name"] != "x"));
}

#[tokio::test]
async fn test_allowlist_is_403() {
    let executor = SqlExecutor::new(users()).with_allowed_tables(["users"]);

    assert!(executor.execute_sql("SELECT * FROM users").await.is_ok());
    let denied = executor.execute_sql("SELECT * FROM secrets").await;
    assert_eq!(denied.status_code(), Some(403));
}

#[tokio::test]
async fn test_where_operators_against_memory() {
    let executor = SqlExecutor::new(users());

    let result = executor
        .execute_sql(
            "SELECT name FROM users WHERE age >= 30 AND name LIKE '%a%' OR name IN ('bob') ORDER BY name DESC",
        )
        .await;
    // AND under OR is rejected rather than reinterpreted
    assert!(result.error.is_some());

    let result = executor
        .execute_sql("SELECT name FROM users WHERE age >= 30 AND (name LIKE '%a%' OR id IN (1)) ORDER BY name DESC")
        .await;
    assert_eq!(
        result.data,
        Some(vec![row(json!({"name": "cat"})), row(json!({"name": "bob"}))])
    );
}

#[tokio::test]
async fn test_crate_level_execute_sql() {
    let client = users();
    let result = sqlrest::execute_sql(&client, "SELECT id FROM users WHERE name = 'ann'").await;
    assert_eq!(result.data, Some(vec![row(json!({"id": 2}))]));
}
